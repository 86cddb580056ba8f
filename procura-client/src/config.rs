//! Configuration loading for the Procura client.
//!
//! Loaded from TOML. Every top-level field is required except `company_id`
//! and `strategies`; an empty strategy list means every read passes through.
//!
//! ```toml
//! api_base_url = "http://localhost:3000"
//! request_timeout_ms = 10000
//! store_path = "cache/client-store.json"
//!
//! [[strategies]]
//! pattern = "/schema/*"
//! strategy = { kind = "persistent_ttl", ttl_secs = 300 }
//!
//! [[strategies]]
//! pattern = "/resource/*"
//! strategy = { kind = "delta_merge", ttl_secs = 30 }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Opaque scope token sent as `x-company-id`.
    pub company_id: Option<String>,
    pub request_timeout_ms: u64,
    pub store_path: PathBuf,
    #[serde(default)]
    pub strategies: Vec<StrategyRule>,
}

/// One endpoint pattern and the strategy its reads use. First match wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyRule {
    pub pattern: String,
    pub strategy: StrategyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum StrategyKind {
    PassThrough,
    PersistentTtl { ttl_secs: u64 },
    DeltaMerge { ttl_secs: u64 },
}

impl StrategyKind {
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::PassThrough => None,
            Self::PersistentTtl { ttl_secs } | Self::DeltaMerge { ttl_secs } => {
                Some(Duration::from_secs(*ttl_secs))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or PROCURA_CLIENT_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(invalid("api_base_url", "must start with http:// or https://"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(invalid("store_path", "must not be empty"));
        }
        if let Some(company) = &self.company_id {
            if company.trim().is_empty() {
                return Err(invalid("company_id", "must not be blank when set"));
            }
        }
        for (i, rule) in self.strategies.iter().enumerate() {
            if !rule.pattern.starts_with('/') {
                return Err(invalid(
                    &format!("strategies[{}].pattern", i),
                    "must start with '/'",
                ));
            }
            if rule.strategy.ttl() == Some(Duration::ZERO) {
                return Err(invalid(&format!("strategies[{}].strategy.ttl_secs", i), "must be > 0"));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("PROCURA_CLIENT_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
api_base_url = "http://localhost:3000"
company_id = "acme"
request_timeout_ms = 5000
store_path = "cache/client.json"

[[strategies]]
pattern = "/schema/*"
strategy = { kind = "persistent_ttl", ttl_secs = 300 }

[[strategies]]
pattern = "/resource/**"
strategy = { kind = "delta_merge", ttl_secs = 30 }

[[strategies]]
pattern = "/relations"
strategy = { kind = "pass_through" }
"#;

    #[test]
    fn test_parse_valid_config() -> Result<(), ConfigError> {
        let config = ClientConfig::from_toml(VALID)?;
        assert_eq!(config.company_id.as_deref(), Some("acme"));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.strategies.len(), 3);
        assert_eq!(
            config.strategies[0].strategy,
            StrategyKind::PersistentTtl { ttl_secs: 300 }
        );
        assert_eq!(config.strategies[2].strategy.ttl(), None);
        Ok(())
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let toml = format!("{}\nretries = 3\n", VALID.trim_start());
        // The extra key lands in the last [[strategies]] table.
        assert!(matches!(ClientConfig::from_toml(&toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_errors() {
        let bad_url = VALID.replace("http://localhost:3000", "localhost:3000");
        assert!(matches!(
            ClientConfig::from_toml(&bad_url),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "api_base_url"
        ));

        let zero_ttl = VALID.replace("ttl_secs = 30 }", "ttl_secs = 0 }");
        assert!(matches!(
            ClientConfig::from_toml(&zero_ttl),
            Err(ConfigError::InvalidValue { ref field, .. }) if field.starts_with("strategies[1]")
        ));

        let relative = VALID.replace("\"/relations\"", "\"relations\"");
        assert!(ClientConfig::from_toml(&relative).is_err());
    }
}
