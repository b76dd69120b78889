//! Configuration management for modcat
//!
//! Handles configuration loading and validation for the scanner, the
//! invocation engine and logging.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::module::registry::targets::parse_version;

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Platform family of the running host
    #[serde(default = "default_host_family")]
    pub host_family: String,

    /// Host runtime version, `major[.minor]`
    #[serde(default = "default_host_version")]
    pub host_version: String,

    /// Families that run on any host, most preferred first
    #[serde(default = "default_fallback_families")]
    pub fallback_families: Vec<String>,

    /// Restrict scanning to these target folders (case-insensitive); None = all
    #[serde(default)]
    pub allowed_targets: Option<Vec<String>>,
}

fn default_host_family() -> String {
    "host".to_string()
}

fn default_host_version() -> String {
    "1.0".to_string()
}

fn default_fallback_families() -> Vec<String> {
    vec!["portable".to_string(), "any".to_string()]
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            host_family: default_host_family(),
            host_version: default_host_version(),
            fallback_families: default_fallback_families(),
            allowed_targets: None,
        }
    }
}

/// Invocation engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum nearby-name suggestions attached to a not-found error
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    /// Largest edit distance still considered a nearby name
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,

    /// Catalog member names listed when no nearby name exists
    #[serde(default = "default_fallback_hint_count")]
    pub fallback_hint_count: usize,
}

fn default_max_suggestions() -> usize {
    5
}

fn default_max_edit_distance() -> usize {
    3
}

fn default_fallback_hint_count() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_suggestions: default_max_suggestions(),
            max_edit_distance: default_max_edit_distance(),
            fallback_hint_count: default_fallback_hint_count(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter, e.g. "info" or "modcat=debug" (RUST_LOG takes precedence)
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl CatalogConfig {
    /// Load configuration from a `.toml` or `.json` file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: CatalogConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: CatalogConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let scanner = &self.scanner;
        if scanner.host_family.trim().is_empty() {
            bail!("scanner.host_family must not be empty");
        }
        if parse_version(&scanner.host_version).is_none() {
            bail!(
                "scanner.host_version must look like major[.minor], got {:?}",
                scanner.host_version
            );
        }
        if scanner.fallback_families.iter().any(|f| f.trim().is_empty()) {
            bail!("scanner.fallback_families must not contain empty entries");
        }
        if let Some(allowed) = &scanner.allowed_targets {
            if allowed.iter().any(|t| t.trim().is_empty()) {
                bail!("scanner.allowed_targets must not contain empty entries");
            }
        }
        if self.engine.max_suggestions == 0 {
            bail!("engine.max_suggestions must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.scanner.host_family, "host");
        assert_eq!(config.scanner.fallback_families, vec!["portable", "any"]);
        assert_eq!(config.engine.max_suggestions, 5);
        assert_eq!(config.engine.max_edit_distance, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = CatalogConfig::from_toml_str(
            r#"
[scanner]
host_version = "2.1"
allowed_targets = ["host2.0"]

[logging]
filter = "modcat=debug"
"#,
        )
        .unwrap();
        assert_eq!(config.scanner.host_version, "2.1");
        assert_eq!(config.scanner.host_family, "host");
        assert_eq!(config.scanner.allowed_targets, Some(vec!["host2.0".to_string()]));
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(
            config.logging.unwrap().filter.as_deref(),
            Some("modcat=debug")
        );
    }

    #[test]
    fn test_rejects_bad_host_version() {
        let err = CatalogConfig::from_toml_str("[scanner]\nhost_version = \"latest\"\n").unwrap_err();
        assert!(err.to_string().contains("host_version"));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modcat.json");
        let mut config = CatalogConfig::default();
        config.engine.fallback_hint_count = 3;
        config.to_json_file(&path).unwrap();

        let loaded = CatalogConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
