use super::{types::Config, ConfigError};
use crate::command::check_output_name;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Encoder path is not empty
/// - Event buffer is not 0
/// - Default output name is a bare file name
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.encoder.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "encoder.path cannot be empty".to_string(),
        ));
    }

    if config.pipeline.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.event_buffer cannot be 0".to_string(),
        ));
    }

    if let Some(name) = &config.defaults.output_name {
        check_output_name(name)
            .map_err(|e| ConfigError::ValidationError(format!("defaults.output_name: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_encoder_path_fails() {
        let mut config = Config::default();
        config.encoder.path = PathBuf::new();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("encoder.path"));
    }

    #[test]
    fn test_validate_zero_event_buffer_fails() {
        let mut config = Config::default();
        config.pipeline.event_buffer = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("event_buffer"));
    }

    #[test]
    fn test_validate_output_name_outside_folder_fails() {
        let mut config = Config::default();
        config.defaults.output_name = Some("../escape".to_string());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("defaults.output_name"));

        config.defaults.output_name = Some("Archive".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
