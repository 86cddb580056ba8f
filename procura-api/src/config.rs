//! API Configuration Module
//!
//! Server settings loaded from `PROCURA_*` environment variables with
//! defaults suitable for local development in demo mode.

use procura_core::{ConfigError, ProcuraResult};
use procura_storage::{CacheConfig, RevalidationPlan, StorageMode};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Server
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    // ========================================================================
    // Data source
    // ========================================================================
    /// Demo mode reads the flat JSON store; remote mode proxies a peer.
    pub mode: StorageMode,
    /// Path of the flat JSON store used in demo mode.
    pub data_path: PathBuf,
    /// Base URL of the remote peer (required in remote mode).
    pub remote_url: Option<String>,
    /// Timeout for requests to the remote peer and the page renderer.
    pub request_timeout: Duration,

    // ========================================================================
    // Cache
    // ========================================================================
    pub cache: CacheConfig,

    // ========================================================================
    // Page revalidation
    // ========================================================================
    /// Endpoint of the page renderer's revalidation hook. Unset disables
    /// page revalidation.
    pub revalidate_url: Option<String>,
    pub revalidation: RevalidationPlan,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            mode: StorageMode::Demo,
            data_path: PathBuf::from("data/procura.json"),
            remote_url: None,
            request_timeout: Duration::from_secs(10),
            cache: CacheConfig::default(),
            revalidate_url: None,
            revalidation: RevalidationPlan::default(),
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PROCURA_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `PROCURA_API_PORT`: Port (default: 3000)
    /// - `PROCURA_DEMO_MODE`: "true"/"false" (default: true)
    /// - `PROCURA_DATA_PATH`: Flat JSON store path (default: data/procura.json)
    /// - `PROCURA_REMOTE_URL`: Remote peer base URL
    /// - `PROCURA_REQUEST_TIMEOUT_SECS`: Outbound request timeout (default: 10)
    /// - `PROCURA_SCHEMA_TTL_SECS`, `PROCURA_COMPANY_TTL_SECS`,
    ///   `PROCURA_RESOURCE_TTL_SECS`: Cache TTLs (defaults: 300, 300, 30)
    /// - `PROCURA_REVALIDATE_URL`: Page revalidation hook
    /// - `PROCURA_REVALIDATE_PREFIX`: Dynamic page prefix (default: /resource)
    /// - `PROCURA_REVALIDATE_BASE`: Catch-all page (default: /)
    /// - `PROCURA_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `PROCURA_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `PROCURA_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    pub fn from_env() -> ProcuraResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> ProcuraResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_host = lookup("PROCURA_API_BIND").unwrap_or(defaults.bind_host);
        let port = match lookup("PORT").or_else(|| lookup("PROCURA_API_PORT")) {
            Some(raw) => parse_value("PROCURA_API_PORT", &raw)?,
            None => defaults.port,
        };

        let demo = lookup("PROCURA_DEMO_MODE")
            .map(|s| s.to_lowercase() != "false" && s != "0")
            .unwrap_or(true);
        let mode = if demo {
            StorageMode::Demo
        } else {
            StorageMode::Remote
        };

        let data_path = lookup("PROCURA_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_path);
        let remote_url = lookup("PROCURA_REMOTE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let secs = |key: &str, default: Duration| -> ProcuraResult<Duration> {
            match lookup(key) {
                Some(raw) => Ok(Duration::from_secs(parse_value(key, &raw)?)),
                None => Ok(default),
            }
        };
        let request_timeout = secs("PROCURA_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?;
        let cache = CacheConfig::new()
            .with_schema_ttl(secs("PROCURA_SCHEMA_TTL_SECS", defaults.cache.schema_ttl)?)
            .with_company_ttl(secs("PROCURA_COMPANY_TTL_SECS", defaults.cache.company_ttl)?)
            .with_resource_ttl(secs("PROCURA_RESOURCE_TTL_SECS", defaults.cache.resource_ttl)?);

        let revalidate_url = lookup("PROCURA_REVALIDATE_URL").filter(|s| !s.is_empty());
        let revalidation = RevalidationPlan {
            page_prefix: lookup("PROCURA_REVALIDATE_PREFIX")
                .unwrap_or(defaults.revalidation.page_prefix),
            base_path: lookup("PROCURA_REVALIDATE_BASE").unwrap_or(defaults.revalidation.base_path),
        };

        let cors_origins = lookup("PROCURA_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let cors_allow_credentials = lookup("PROCURA_CORS_ALLOW_CREDENTIALS")
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);
        let cors_max_age_secs = lookup("PROCURA_CORS_MAX_AGE_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let config = Self {
            bind_host,
            port,
            mode,
            data_path,
            remote_url,
            request_timeout,
            cache,
            revalidate_url,
            revalidation,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ProcuraResult<()> {
        if self.mode == StorageMode::Remote && self.remote_url.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "PROCURA_REMOTE_URL".to_string(),
            }
            .into());
        }
        if let Some(url) = &self.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: "PROCURA_REMOTE_URL".to_string(),
                    value: url.clone(),
                    reason: "must start with http:// or https://".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> ProcuraResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue {
                field: "PROCURA_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, raw: &str) -> ProcuraResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::ProcuraError;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() -> ProcuraResult<()> {
        let config = ApiConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config.mode, StorageMode::Demo);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache.resource_ttl, Duration::from_secs(30));
        assert!(config.revalidate_url.is_none());
        assert!(!config.is_production());
        Ok(())
    }

    #[test]
    fn test_remote_mode_requires_url() {
        let result = ApiConfig::from_lookup(lookup(&[("PROCURA_DEMO_MODE", "false")]));
        assert!(matches!(
            result,
            Err(ProcuraError::Config(ConfigError::MissingRequired { .. }))
        ));
    }

    #[test]
    fn test_overrides() -> ProcuraResult<()> {
        let config = ApiConfig::from_lookup(lookup(&[
            ("PROCURA_DEMO_MODE", "false"),
            ("PROCURA_REMOTE_URL", "https://erp.example.com/api/"),
            ("PROCURA_SCHEMA_TTL_SECS", "60"),
            ("PORT", "8080"),
            ("PROCURA_CORS_ORIGINS", "https://a.example.com, https://b.example.com"),
        ]))?;
        assert_eq!(config.mode, StorageMode::Remote);
        assert_eq!(config.remote_url.as_deref(), Some("https://erp.example.com/api"));
        assert_eq!(config.cache.schema_ttl, Duration::from_secs(60));
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.bind_addr()?.port(), 8080);
        Ok(())
    }

    #[test]
    fn test_invalid_number() {
        let result = ApiConfig::from_lookup(lookup(&[("PROCURA_RESOURCE_TTL_SECS", "soon")]));
        assert!(matches!(
            result,
            Err(ProcuraError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
