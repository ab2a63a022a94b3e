//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Config validation failed: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = ConfigError::NotFound("postforge.toml".to_string());
        assert!(err.to_string().contains("postforge.toml"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::InvalidValue {
            field: "gate.allowed_sources".to_string(),
            message: "unknown source 'cron-job'".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("gate.allowed_sources"));
        assert!(display.contains("cron-job"));
    }

    #[test]
    fn test_env_var_not_set_error() {
        let err = ConfigError::EnvVarNotSet("POSTFORGE_WEBHOOK_SECRET".to_string());
        assert!(err.to_string().contains("POSTFORGE_WEBHOOK_SECRET"));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::from(io_err);
        assert!(err.to_string().contains("file not found"));
    }
}
