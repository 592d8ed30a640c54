//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

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

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Overlay deployment environment variables on top of `config`.
///
/// `lookup` is `std::env::var` in production; empty values count as unset.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let (Some(host), Some(port)) = (get("WRITER_HOST"), get("WRITER_PORT")) {
        config.sink.url = Some(format!("http://{}:{}/log", host, port));
    }
    if let Some(port) = get("PROMETHEUS_METRICS_PORT") {
        config.observability.metrics_address = format!("0.0.0.0:{}", port);
    }
    if let Some(addr) = get("INGEST_ADDRESS") {
        config.ingest.bind_address = addr;
    }
}

/// Load the file (or defaults), apply environment overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => GateConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_writer_location_from_env() {
        let vars = env(&[("WRITER_HOST", "writer"), ("WRITER_PORT", "8081")]);
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned());
        assert_eq!(config.sink.url.as_deref(), Some("http://writer:8081/log"));
    }

    #[test]
    fn test_partial_writer_location_ignored() {
        let vars = env(&[("WRITER_HOST", "writer"), ("WRITER_PORT", "")]);
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned());
        assert!(config.sink.url.is_none());
    }

    #[test]
    fn test_metrics_port_from_env() {
        let vars = env(&[("PROMETHEUS_METRICS_PORT", "2112")]);
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned());
        assert_eq!(config.observability.metrics_address, "0.0.0.0:2112");
    }

    #[test]
    fn test_missing_file() {
        let err = read_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![
            ValidationError {
                field: "sink.url",
                reason: "must be set".to_string(),
            },
            ValidationError {
                field: "retries.max_attempts",
                reason: "must be at least 1".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: sink.url: must be set, retries.max_attempts: must be at least 1"
        );
    }
}
