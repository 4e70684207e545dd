//! Extractors that reject with the JSON error bodies of `AppError`.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use api_ingress::{AppError, FieldErrors};

use crate::api::rest::dto::NamedBody;
use crate::config::NameRules;

/// JSON body that must pass its `validator` rules and the `NameRules`
/// installed as a request extension (defaults when absent).
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + NamedBody,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let rules = req
            .extensions()
            .get::<NameRules>()
            .copied()
            .unwrap_or_default();

        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            let mut details = FieldErrors::new();
            details.insert("body".to_string(), vec![rejection.body_text()]);
            AppError::validation(details)
        })?;

        let mut details = match value.validate() {
            Ok(()) => FieldErrors::new(),
            Err(errs) => field_errors(&errs),
        };
        if let Some(message) = rules.check(value.name()) {
            details.entry("name".to_string()).or_default().push(message);
        }
        if !details.is_empty() {
            return Err(AppError::validation(details));
        }

        Ok(Self(value))
    }
}

pub fn field_errors(errs: &ValidationErrors) -> FieldErrors {
    errs.field_errors()
        .into_iter()
        .map(|(field, violations)| {
            let messages = violations
                .iter()
                .map(|v| match &v.message {
                    Some(message) => message.to_string(),
                    None => v.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Numeric `{id}` path segment.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub i64);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                let mut details = FieldErrors::new();
                details.insert("id".to_string(), vec![rejection.body_text()]);
                AppError::validation(details)
            })?;
        Ok(Self(id))
    }
}
