//! Kernel configuration.
//!
//! Read-only after startup. Loaded from a properties-style text and/or
//! environment variables:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `source.priorities.<name>` | resolver priority for a source (float, default 1.0) |
//! | `overrides.<from>-><to>` | manual source winner for an edge |
//! | `snapshot.dir` | directory for graph exports |
//! | `ingestion.adapters` | comma list of adapters to initialize |
//!
//! Environment variables `SNAPSHOT_DIR` and `INGESTION_ADAPTERS` override
//! the file-level values.

use std::path::PathBuf;

use crate::resolver::ResolverConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Cannot read configuration {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A priority value failed to parse as a float.
    #[error("Invalid priority for {key}: {value}")]
    InvalidPriority {
        /// Offending key.
        key: String,
        /// Offending value.
        value: String,
    },
}

/// Process-wide kernel configuration.
#[derive(Debug, Clone, Default)]
pub struct KernelConfig {
    /// Resolver priorities and overrides.
    pub resolver: ResolverConfig,
    /// Where graph exports land, if exporting is enabled.
    pub snapshot_dir: Option<PathBuf>,
    /// Adapters to initialize at startup (empty = all).
    pub adapters: Vec<String>,
}

impl KernelConfig {
    /// Empty configuration: all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse properties-style configuration text.
    ///
    /// Unknown keys are ignored with a warning so one file can carry
    /// settings for several tools.
    pub fn from_properties(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            if let Some(source) = key.strip_prefix("source.priorities.") {
                let priority: f64 =
                    value.parse().map_err(|_| ConfigError::InvalidPriority {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
                config.resolver.add_priority(source, priority);
            } else if let Some(edge) = key.strip_prefix("overrides.") {
                config.resolver.add_override_key(edge, value);
            } else if key == "snapshot.dir" {
                config.snapshot_dir = Some(PathBuf::from(value));
            } else if key == "ingestion.adapters" {
                config.adapters = value
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
            } else {
                tracing::warn!(key = %key, "ignoring unknown configuration key");
            }
        }

        Ok(config)
    }

    /// Load a properties file from disk.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
        let mut config = Self::from_properties(&text)?;
        config.apply_env();
        Ok(config)
    }

    /// Configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("SNAPSHOT_DIR") {
            if !dir.is_empty() {
                self.snapshot_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(adapters) = std::env::var("INGESTION_ADAPTERS") {
            if !adapters.is_empty() {
                self.adapters = adapters
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
            }
        }
    }
}
