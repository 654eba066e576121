use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "AV1BATCH_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Prefix of environment overrides. Nested keys are separated by `__`,
/// e.g. `AV1BATCH_SERVER__PORT` or `AV1BATCH_PIPELINE__EVENT_BUFFER`.
const ENV_PREFIX: &str = "AV1BATCH_";

/// Configuration file path: `AV1BATCH_CONFIG` or `config.toml`
pub fn config_path_from_env() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
