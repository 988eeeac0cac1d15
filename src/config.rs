//! Proxy server configuration.

use crate::error::{EnhanceError, Result};
use crate::model::{GeminiModel, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use std::net::SocketAddr;
use std::time::Duration;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Default request body limit. Gemini caps inline data at 20 MB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Settings for the enhancement proxy.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Server-held credential. `None` makes every request fail with a
    /// configuration error.
    pub api_key: Option<String>,
    /// Upstream model.
    pub model: GeminiModel,
    /// Upstream API base URL.
    pub upstream_url: String,
    /// Maximum accepted request body.
    pub max_body_bytes: usize,
    /// Upstream request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("upstream_url", &self.upstream_url)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            api_key: None,
            model: GeminiModel::default(),
            upstream_url: DEFAULT_BASE_URL.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Reads configuration from the process environment.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `API_KEY`, then `GOOGLE_API_KEY` | upstream credential |
    /// | `PHOTOENHANCE_BIND` | listen address |
    /// | `PHOTOENHANCE_MODEL` | `flash` or `pro` |
    /// | `PHOTOENHANCE_UPSTREAM_URL` | API base URL |
    /// | `PHOTOENHANCE_MAX_BODY_BYTES` | body limit |
    /// | `PHOTOENHANCE_TIMEOUT_SECS` | upstream timeout |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.api_key = get("API_KEY").or_else(|| get("GOOGLE_API_KEY"));

        if let Some(bind) = get("PHOTOENHANCE_BIND") {
            config.bind = bind.trim().parse().map_err(|_| {
                EnhanceError::Config(format!("PHOTOENHANCE_BIND is not a socket address: {bind}"))
            })?;
        }
        if let Some(model) = get("PHOTOENHANCE_MODEL") {
            config.model = GeminiModel::parse(&model).ok_or_else(|| {
                EnhanceError::Config(format!(
                    "PHOTOENHANCE_MODEL must be flash or pro, got {model}"
                ))
            })?;
        }
        if let Some(url) = get("PHOTOENHANCE_UPSTREAM_URL") {
            config.upstream_url = url.trim().to_string();
        }
        if let Some(limit) = get("PHOTOENHANCE_MAX_BODY_BYTES") {
            config.max_body_bytes = limit.trim().parse().map_err(|_| {
                EnhanceError::Config(format!(
                    "PHOTOENHANCE_MAX_BODY_BYTES is not a number: {limit}"
                ))
            })?;
        }
        if let Some(secs) = get("PHOTOENHANCE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                EnhanceError::Config(format!("PHOTOENHANCE_TIMEOUT_SECS is not a number: {secs}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert!(config.api_key.is_none());
        assert_eq!(config.model, GeminiModel::NanoBanana);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_api_key_fallback_order() {
        let keys = [("API_KEY", "a"), ("GOOGLE_API_KEY", "g")];
        let config = ServerConfig::from_lookup(lookup(&keys)).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("a"));

        let keys = [("API_KEY", " "), ("GOOGLE_API_KEY", "g")];
        let config = ServerConfig::from_lookup(lookup(&keys)).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("g"));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PHOTOENHANCE_BIND", "0.0.0.0:8080"),
            ("PHOTOENHANCE_MODEL", "pro"),
            ("PHOTOENHANCE_TIMEOUT_SECS", "30"),
            ("PHOTOENHANCE_MAX_BODY_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.model, GeminiModel::NanoBananaPro);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err =
            ServerConfig::from_lookup(lookup(&[("PHOTOENHANCE_MODEL", "imagen")])).unwrap_err();
        assert!(matches!(err, EnhanceError::Config(_)));
        let err =
            ServerConfig::from_lookup(lookup(&[("PHOTOENHANCE_BIND", "nowhere")])).unwrap_err();
        assert!(matches!(err, EnhanceError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ServerConfig {
            api_key: Some("secret-value".into()),
            ..ServerConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-value"));
        assert!(debug.contains("<redacted>"));
    }
}
