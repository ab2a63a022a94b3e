//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a file if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "env".to_string(),
            message: e.to_string(),
        })?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.postforge/jobs.db`).
    pub fn expand_path(path: &Path) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
    }

    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("postforge")
            .join("postforge.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StoreBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scheduler.failure_threshold, 3);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [server]
            host = "0.0.0.0"
            port = 3000

            [scheduler]
            failure_threshold = 5
            run_timeout_secs = 45

            [store]
            backend = "memory"

            [generation]
            endpoint = "https://gen.internal/v1/generate"

            [gate]
            allowed_sources = ["scheduler", "webhook"]
            webhook_secret = "s3cret"

            [logging]
            level = "debug"
            json = true
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.scheduler.failure_threshold, 5);
        assert_eq!(config.scheduler.run_timeout_secs, 45);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.gate.allowed_sources, vec!["scheduler", "webhook"]);
        assert_eq!(config.gate.webhook_secret.as_deref(), Some("s3cret"));
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "port = 5000").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/postforge.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_nonexistent_file() {
        let config =
            ConfigLoader::load_or_default(Path::new("/nonexistent/path/postforge.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-only variable with a unique name.
        unsafe {
            std::env::set_var("POSTFORGE_TEST_SECRET", "from-env");
        }
        let content = "[gate]\nwebhook_secret = \"${POSTFORGE_TEST_SECRET}\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.gate.webhook_secret.as_deref(), Some("from-env"));
        unsafe {
            std::env::remove_var("POSTFORGE_TEST_SECRET");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${POSTFORGE_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path(Path::new("~/jobs.db"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("jobs.db"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        let expanded = ConfigLoader::expand_path(Path::new("/var/lib/postforge/jobs.db"));
        assert_eq!(expanded, PathBuf::from("/var/lib/postforge/jobs.db"));
    }
}
