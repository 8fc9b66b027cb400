//! Service configuration
//!
//! Loaded from TOML or YAML, chosen by file extension. Every field has a
//! default, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use storymap_compose::ComposeOptions;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML document is invalid
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML document is invalid
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Extension is neither TOML nor YAML
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of range
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why the value is rejected
        reason: String,
    },
}

/// storymap service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ServiceConfig {
    /// Maximum entries per cache (composed configurations, story structures)
    pub cache_capacity: u64,
    /// Route of the story index page, appended to the request origin
    pub story_index_route: String,
    /// Feature id that switches a step to the 3D viewpoint
    pub three_d_feature: String,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let compose = ComposeOptions::default();
        Self {
            cache_capacity: 10_000,
            story_index_route: compose.story_index_route,
            three_d_feature: compose.three_d_feature,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// With story index route
    #[inline]
    #[must_use]
    pub fn with_story_index_route(mut self, route: impl Into<String>) -> Self {
        self.story_index_route = route.into();
        self
    }

    /// With 3D feature id
    #[inline]
    #[must_use]
    pub fn with_three_d_feature(mut self, id: impl Into<String>) -> Self {
        self.three_d_feature = id.into();
        self
    }

    /// With default log level
    #[inline]
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns [`ConfigError`] for invalid documents or values.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(document)?.validated()
    }

    /// Parse a YAML document
    ///
    /// # Errors
    /// Returns [`ConfigError`] for invalid documents or values.
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str::<Self>(document)?.validated()
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file can not be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&document)?,
            Some("yaml" | "yml") => Self::from_yaml_str(&document)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        tracing::debug!(path = %path.display(), "loaded service configuration");
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    ///
    /// # Errors
    /// See [`ServiceConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Composer options derived from this configuration
    #[must_use]
    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions::default()
            .with_story_index_route(self.story_index_route.clone())
            .with_three_d_feature(self.three_d_feature.clone())
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.story_index_route.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "story_index_route",
                reason: format!("'{}' must start with '/'", self.story_index_route),
            });
        }
        if self.three_d_feature.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "three_d_feature",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}
