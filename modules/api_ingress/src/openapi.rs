use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityRequirement, SecurityScheme};
use utoipa::openapi::OpenApi;
use utoipa::Modify;

pub const SECURITY_SCHEME: &str = "ApiKey";

/// Declares the `X-API-KEY` header scheme and requires it on every operation.
pub struct ApiKeySecurityAddon;

impl Modify for ApiKeySecurityAddon {
    fn modify(&self, openapi: &mut OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            SECURITY_SCHEME,
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "X-API-KEY",
                "API key; `?apikey=` is also accepted for development",
            ))),
        );
        openapi.security = Some(vec![SecurityRequirement::new(
            SECURITY_SCHEME,
            Vec::<String>::new(),
        )]);
    }
}
