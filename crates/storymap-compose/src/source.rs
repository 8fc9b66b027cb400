//! Read-only collaborators of the composer
//!
//! Each lookup distinguishes absence (`Ok(None)`) from failure
//! (`Err(LookupError)`); callers decide whether absence is an error.

use crate::error::LookupError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use storymap_model::{InstanceId, LayerCatalogEntry, SettingsDocument, StepId, StoryId};

/// Layer id -> canonical layer definition
pub trait LayerCatalog: Send + Sync {
    /// Look up one catalog entry
    ///
    /// # Errors
    /// Returns [`LookupError`] when the catalog can not be read.
    fn get(&self, id: &str) -> Result<Option<LayerCatalogEntry>, LookupError>;
}

/// Story and step id -> persisted map settings
pub trait SettingsStore: Send + Sync {
    /// Story-scope settings
    ///
    /// # Errors
    /// Returns [`LookupError`] when the store can not be read.
    fn story_settings(&self, story: StoryId) -> Result<Option<SettingsDocument>, LookupError>;

    /// Step-scope settings
    ///
    /// # Errors
    /// Returns [`LookupError`] when the store can not be read.
    fn step_settings(&self, step: StepId) -> Result<Option<SettingsDocument>, LookupError>;
}

/// Instance id -> instance default configuration
pub trait InstanceStore: Send + Sync {
    /// Look up one instance
    ///
    /// # Errors
    /// Returns [`LookupError`] when the store can not be read.
    fn instance(&self, id: &InstanceId) -> Result<Option<MapInstance>, LookupError>;
}

/// Shared default configuration of a map instance
///
/// `script` is the default script augmentation, `structured` the default
/// structured map configuration (`layerTree`, `menu.tools`, `mapView`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapInstance {
    /// Instance id
    pub id: InstanceId,
    /// Default script augmentation
    pub script: Map<String, JsonValue>,
    /// Default structured configuration
    pub structured: Map<String, JsonValue>,
}

impl MapInstance {
    /// Instance with empty defaults
    pub fn new(id: impl Into<InstanceId>) -> Self {
        Self {
            id: id.into(),
            script: Map::new(),
            structured: Map::new(),
        }
    }

    /// Set the default script augmentation
    #[must_use]
    pub fn with_script(mut self, script: Map<String, JsonValue>) -> Self {
        self.script = script;
        self
    }

    /// Set the default structured configuration
    #[must_use]
    pub fn with_structured(mut self, structured: Map<String, JsonValue>) -> Self {
        self.structured = structured;
        self
    }
}
