//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the raw fallback signing key. Read only by
/// the loader; the value never appears in config files or logs.
pub const SIGNER_KEY_ENV_VAR: &str = "REFUND_GATEWAY_SIGNER_KEY";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// Secrets are overlaid from the environment after parsing, so the raw
/// signing key can never be committed alongside the config file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment-sourced secrets onto a parsed configuration.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Ok(key) = std::env::var(SIGNER_KEY_ENV_VAR) {
        if !key.is_empty() {
            config.signer.raw_signer_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_config() {
        let dir = std::env::temp_dir();
        let path = dir.join("refund_gateway_test_config.toml");
        fs::write(
            &path,
            r#"
environment = "development"

[signer]
use_custody = true
custody_key_id = "merchant-refunds-1"

[rpc]
base_rpc_urls = "http://localhost:8545"
ethereum_rpc_urls = "http://localhost:8546,http://localhost:8547"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.signer.custody_key_id.as_deref(), Some("merchant-refunds-1"));
        assert_eq!(config.rpc.rpc_timeout_secs, 10);

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = std::env::temp_dir();
        let path = dir.join("refund_gateway_bad_config.toml");
        // custody enabled but no key id
        fs::write(
            &path,
            r#"
[signer]
use_custody = true

[rpc]
base_rpc_urls = "http://localhost:8545"
ethereum_rpc_urls = "http://localhost:8546"
"#,
        )
        .unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        fs::remove_file(&path).unwrap_or_default();
    }
}
