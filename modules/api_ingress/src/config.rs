use serde::{Deserialize, Serialize};

/// HTTP ingress configuration (`modules.api_ingress` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiIngressConfig {
    /// Listen address; empty means "use server.host:server.port".
    #[serde(default)]
    pub bind_addr: String,
    /// Shared secret expected in `X-API-KEY` (or `?apikey=`). Empty rejects every protected call.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enable_docs: bool,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Path prefixes (whole segments) reachable without the API key.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: String::new(),
            api_key: String::new(),
            enable_docs: true,
            cors_enabled: true,
            public_paths: default_public_paths(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_public_paths() -> Vec<String> {
    ["/health", "/healthz", "/docs", "/openapi.json", "/swagger"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_uses_defaults() {
        let cfg: ApiIngressConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(cfg.bind_addr.is_empty());
        assert!(cfg.api_key.is_empty());
        assert!(cfg.enable_docs);
        assert!(cfg.cors_enabled);
        assert!(cfg.public_paths.iter().any(|p| p == "/health"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<ApiIngressConfig, _> =
            serde_json::from_value(serde_json::json!({ "apikey": "typo" }));
        assert!(res.is_err());
    }
}
