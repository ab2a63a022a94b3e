//! Configuration validation.

use crate::schema::{Config, StoreBackend};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Join all errors into a single line for reporting.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_scheduler(config, &mut result);
        Self::validate_store(config, &mut result);
        Self::validate_generation(config, &mut result);
        Self::validate_gate(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let scheduler = &config.scheduler;

        if scheduler.failure_threshold == 0 {
            result.add_error(ValidationError::new(
                "scheduler.failure_threshold",
                "failure_threshold must be at least 1",
            ));
        }

        if scheduler.run_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "scheduler.run_timeout_secs",
                "run_timeout_secs must be greater than 0",
            ));
        }

        if scheduler.drain_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "scheduler.drain_timeout_secs",
                "drain_timeout_secs must be greater than 0",
            ));
        }

        if scheduler.run_timeout_secs > 1800 {
            result.add_warning(ValidationWarning::new(
                "scheduler.run_timeout_secs",
                "run_timeout_secs is above 30 minutes, stuck generations will hold their job",
            ));
        }
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        match config.store.backend {
            StoreBackend::Sqlite if config.store.path.is_none() => {
                result.add_error(ValidationError::new(
                    "store.path",
                    "sqlite backend requires a database path",
                ));
            }
            StoreBackend::Memory => {
                result.add_warning(ValidationWarning::new(
                    "store.backend",
                    "memory backend loses every job on restart",
                ));
            }
            _ => {}
        }
    }

    fn validate_generation(config: &Config, result: &mut ValidationResult) {
        let endpoint = &config.generation.endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            result.add_error(ValidationError::new(
                "generation.endpoint",
                "endpoint must start with http:// or https://",
            ));
        }
    }

    fn validate_gate(config: &Config, result: &mut ValidationResult) {
        let gate = &config.gate;
        let allows = |name: &str| gate.allowed_sources.iter().any(|s| s == name);

        if gate.allowed_sources.is_empty() {
            result.add_error(ValidationError::new(
                "gate.allowed_sources",
                "at least one trigger source must be allowed",
            ));
            return;
        }

        if !allows("scheduler") {
            result.add_warning(ValidationWarning::new(
                "gate.allowed_sources",
                "scheduler source is not allowed, armed timers will never generate",
            ));
        }

        if allows("interactive") && gate.control_token.is_none() {
            result.add_warning(ValidationWarning::new(
                "gate.control_token",
                "interactive triggers are allowed but no control token is set, they will all be denied",
            ));
        }

        if allows("webhook") && gate.webhook_secret.is_none() {
            result.add_warning(ValidationWarning::new(
                "gate.webhook_secret",
                "webhook triggers are allowed but no secret is set, they will all be denied",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
