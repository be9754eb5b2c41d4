//! Configuration
//!
//! One serde document covering the store, the distributed tier, the
//! optimizer, and logging. Every section has defaults, so an empty file is a
//! valid configuration. Environment variables prefixed `SEMANTIC_CACHE_`
//! override file values.

use crate::cache::backend::{BackendKind, DistributedConfig};
use crate::cache::store::CacheConfig;
use crate::error::{Error, Result};
use crate::optimizer::OptimizerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "SEMANTIC_CACHE_";

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Extra filter directives, e.g. `semantic_cache::cache=debug`
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directives: Vec::new(),
        }
    }
}

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// Complete semantic cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticCacheConfig {
    pub cache: CacheConfig,
    pub distributed: DistributedConfig,
    pub optimizer: OptimizerConfig,
    pub logging: LoggingConfig,
}

impl SemanticCacheConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_yaml_str(&content)?;
        debug!(path = %path.as_ref().display(), "Loaded configuration file");
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load from an optional file, apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SEMANTIC_CACHE_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}{}", ENV_PREFIX, suffix);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((name, value)) = var("MAX_SIZE") {
            self.cache.max_size = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("DEFAULT_TTL_SECS") {
            self.cache.default_ttl_secs = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("MAX_TTL_SECS") {
            self.cache.max_ttl_secs = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("MAX_VALUE_BYTES") {
            self.cache.max_value_bytes = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("EVENT_RETENTION_SECS") {
            self.cache.event_retention_secs = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("MAINTENANCE_INTERVAL_SECS") {
            self.cache.maintenance_interval_secs = parse_var(&name, &value)?;
        }
        if let Some((name, value)) = var("WARM_CONCURRENCY") {
            self.cache.warm.max_concurrent = parse_var(&name, &value)?;
        }

        if let Some((name, value)) = var("BACKEND") {
            self.distributed.backend = parse_backend(&name, &value)?;
        }
        if let Some((_, value)) = var("DISTRIBUTED_ENDPOINT") {
            self.distributed.endpoint = value;
        }
        if let Some((name, value)) = var("DISTRIBUTED_TIMEOUT_MS") {
            self.distributed.timeout_ms = parse_var(&name, &value)?;
        }

        if let Some((_, value)) = var("LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some((name, value)) = var("LOG_JSON") {
            self.logging.json = parse_var(&name, &value)?;
        }

        Ok(())
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.optimizer.validate()?;

        if self.distributed.backend == BackendKind::Http {
            if self.distributed.timeout_ms == 0 {
                return Err(Error::Configuration(
                    "distributed.timeout_ms must be positive".into(),
                ));
            }
            if self.distributed.endpoint.trim().is_empty() {
                return Err(Error::Configuration(
                    "distributed.endpoint is required for the http backend".into(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid {}={:?}: {}", name, value, e)))
}

fn parse_backend(name: &str, value: &str) -> Result<BackendKind> {
    match value.trim().to_lowercase().as_str() {
        "none" | "" => Ok(BackendKind::None),
        "memory" => Ok(BackendKind::Memory),
        "http" => Ok(BackendKind::Http),
        other => Err(Error::Configuration(format!(
            "Invalid {}={:?}: expected none, memory or http",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SemanticCacheConfig::default();
        assert_eq!(config.cache.max_size, 10_000);
        assert_eq!(config.cache.default_ttl_secs, 3600);
        assert_eq!(config.cache.max_ttl_secs, 604_800);
        assert_eq!(config.cache.max_value_bytes, 8 * 1024 * 1024);
        assert_eq!(config.cache.event_retention_secs, 86_400);
        assert_eq!(config.distributed.backend, BackendKind::None);
        assert_eq!(config.distributed.timeout_ms, 200);
        assert_eq!(config.optimizer.min_gap_samples, 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
cache:
  max_size: 500
  warm:
    max_concurrent: 2
distributed:
  backend: memory
optimizer:
  hot_key_multiple: 3.0
"#;
        let config = SemanticCacheConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cache.max_size, 500);
        assert_eq!(config.cache.default_ttl_secs, 3600);
        assert_eq!(config.cache.warm.max_concurrent, 2);
        assert_eq!(config.cache.warm.timeout_secs, 30);
        assert_eq!(config.distributed.backend, BackendKind::Memory);
        assert_eq!(config.optimizer.hot_key_multiple, 3.0);
        assert_eq!(config.optimizer.benchmark_seed, 42);
    }

    #[test]
    fn test_empty_and_invalid_yaml() {
        assert!(SemanticCacheConfig::from_yaml_str("").is_ok());
        let err = SemanticCacheConfig::from_yaml_str("cache: [1, 2").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_yaml_file_round_trip() {
        let mut config = SemanticCacheConfig::default();
        config.cache.max_size = 42;
        config.logging.json = true;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_yaml_string().unwrap().as_bytes()).unwrap();

        let loaded = SemanticCacheConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(loaded.cache.max_size, 42);
        assert!(loaded.logging.json);
    }

    #[test]
    fn test_missing_file() {
        let err = SemanticCacheConfig::from_yaml_file("/nonexistent/semantic-cache.yaml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SEMANTIC_CACHE_MAX_SIZE", "250"),
            ("SEMANTIC_CACHE_DEFAULT_TTL_SECS", "120"),
            ("SEMANTIC_CACHE_BACKEND", "HTTP"),
            ("SEMANTIC_CACHE_DISTRIBUTED_ENDPOINT", "http://10.0.0.5:8080/kv"),
            ("SEMANTIC_CACHE_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = SemanticCacheConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.cache.max_size, 250);
        assert_eq!(config.cache.default_ttl_secs, 120);
        assert_eq!(config.distributed.backend, BackendKind::Http);
        assert_eq!(config.distributed.endpoint, "http://10.0.0.5:8080/kv");
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_override() {
        let mut config = SemanticCacheConfig::default();
        let err = config
            .apply_overrides(|name| (name == "SEMANTIC_CACHE_MAX_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("SEMANTIC_CACHE_MAX_SIZE"));

        let err = config
            .apply_overrides(|name| (name == "SEMANTIC_CACHE_BACKEND").then(|| "redis".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = SemanticCacheConfig::default();
        config.cache.max_size = 0;
        assert!(config.validate().is_err());

        let mut config = SemanticCacheConfig::default();
        config.distributed.backend = BackendKind::Http;
        config.distributed.timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
