//! Configuration validation.
//!
//! Ensures configuration values are present and within valid ranges
//! before the scanner is wired up.

use std::str::FromStr;
use thiserror::Error;

use crate::config::{Config, ObservabilityConfig, ScannerConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Maximum number of concurrent symbol fetches.
pub const MAX_CONCURRENCY: usize = 16;

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.scanner.validate() {
            errors.push(e);
        }

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if self.network.bind.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "network.bind".into(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load (with environment overrides) and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ScannerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "scanner.port".into(),
            });
        }

        if self.cache_ttl_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "scanner.cache_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.min_bars < 2 {
            return Err(ValidationError::InvalidValue {
                field: "scanner.min_bars".into(),
                reason: "at least 2 bars are needed for a previous close".into(),
            });
        }

        if self.atr_period == 0 {
            return Err(ValidationError::InvalidValue {
                field: "scanner.atr_period".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.volume_window == 0 {
            return Err(ValidationError::InvalidValue {
                field: "scanner.volume_window".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY {
            return Err(ValidationError::InvalidValue {
                field: "scanner.max_concurrency".into(),
                reason: format!("must be between 1 and {MAX_CONCURRENCY}"),
            });
        }

        if self.market_suffix.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidValue {
                field: "scanner.market_suffix".into(),
                reason: "must not contain whitespace".into(),
            });
        }

        if let Err(e) = url::Url::parse(&self.provider_base_url) {
            return Err(ValidationError::InvalidValue {
                field: "scanner.provider_base_url".into(),
                reason: e.to_string(),
            });
        }

        if self.auto_refresh_secs == Some(0) {
            return Err(ValidationError::InvalidValue {
                field: "scanner.auto_refresh_secs".into(),
                reason: "must be greater than 0 when set".into(),
            });
        }

        if let Some(universe) = &self.universe {
            if universe.iter().all(|s| s.trim().is_empty()) {
                return Err(ValidationError::InvalidValue {
                    field: "scanner.universe".into(),
                    reason: "must contain at least one symbol when set".into(),
                });
            }
        }

        Ok(())
    }
}

/// Log levels accepted by the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        if LogLevel::from_str(&self.log_level).is_err() {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!(
                    "'{}' is not one of trace, debug, info, warn, error",
                    self.log_level
                ),
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("'{}' is not one of json, pretty", self.log_format),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test_case(|c: &mut ScannerConfig| c.cache_ttl_secs = 0, "scanner.cache_ttl_secs" ; "zero ttl")]
    #[test_case(|c: &mut ScannerConfig| c.min_bars = 1, "scanner.min_bars" ; "too few bars")]
    #[test_case(|c: &mut ScannerConfig| c.atr_period = 0, "scanner.atr_period" ; "zero atr period")]
    #[test_case(|c: &mut ScannerConfig| c.volume_window = 0, "scanner.volume_window" ; "zero volume window")]
    #[test_case(|c: &mut ScannerConfig| c.max_concurrency = 17, "scanner.max_concurrency" ; "too many workers")]
    #[test_case(|c: &mut ScannerConfig| c.market_suffix = ". NS".into(), "scanner.market_suffix" ; "suffix whitespace")]
    #[test_case(|c: &mut ScannerConfig| c.provider_base_url = "not a url".into(), "scanner.provider_base_url" ; "bad url")]
    #[test_case(|c: &mut ScannerConfig| c.auto_refresh_secs = Some(0), "scanner.auto_refresh_secs" ; "zero refresh")]
    #[test_case(|c: &mut ScannerConfig| c.universe = Some(vec![" ".into()]), "scanner.universe" ; "blank universe")]
    fn test_invalid_scanner_values(mutate: fn(&mut ScannerConfig), expected_field: &str) {
        let mut config = ScannerConfig::default();
        mutate(&mut config);

        match config.validate() {
            Err(ValidationError::InvalidValue { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected InvalidValue for {expected_field}, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = ScannerConfig::default();
        config.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidPort { port: 0, .. })
        ));
    }

    #[test]
    fn test_observability_validation() {
        let mut config = ObservabilityConfig::default();
        config.log_level = "WARNING".into();
        assert!(config.validate().is_ok());

        config.log_level = "loud".into();
        assert!(config.validate().is_err());

        config.log_level = "info".into();
        config.log_format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiple_errors_are_collected() {
        let mut config = Config::default();
        config.scanner.cache_ttl_secs = 0;
        config.observability.log_format = "xml".into();

        assert!(matches!(config.validate(), Err(ValidationError::Multiple(errs)) if errs.len() == 2));
    }
}
