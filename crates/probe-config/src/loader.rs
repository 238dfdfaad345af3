//! Configuration loader (file + env merge).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use thiserror::Error;

use probe_types::DiagnosticError;

use crate::schema::ProbeConfig;

/// Environment variable prefix; nested keys use `__` (e.g. `PROBE_SERVER__PROGRAM`).
pub const ENV_PREFIX: &str = "PROBE_";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to load or merge configuration.
    #[error("configuration error: {0}")]
    Load(String),
    /// The merged configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl DiagnosticError for ConfigError {
    fn hint(&self) -> Option<String> {
        match self {
            Self::Load(_) => {
                Some("The config file or a PROBE_* variable could not be parsed.".into())
            }
            Self::Invalid(_) => None,
        }
    }

    fn fix(&self) -> Option<String> {
        Some("Check the [server], [timing], [client], [invoke] and [logging] tables.".into())
    }
}

/// Loads configuration by merging layers:
/// 1. Default values
/// 2. Config file (if given)
/// 3. Environment variables (`PROBE_` prefix)
pub fn load_config(config_path: Option<&str>) -> Result<ProbeConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ProbeConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: ProbeConfig = figment
        .extract()
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}
