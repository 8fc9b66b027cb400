//! Composition output
//!
//! [`ComposedConfig`] carries everything the caller needs to render a map
//! widget and to cache the result.

use crate::composer::STORY_INDEX_TOOL;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeSet;
use storymap_model::{Fingerprint, LayerCatalogEntry};

/// Key/value pairs exposed to the widget's client-side script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptAugmentation(pub Map<String, JsonValue>);

impl ScriptAugmentation {
    /// Start from an instance default
    #[inline]
    #[must_use]
    pub fn new(values: Map<String, JsonValue>) -> Self {
        Self(values)
    }

    /// Set one value
    pub fn set(&mut self, key: impl Into<String>, value: JsonValue) {
        self.0.insert(key.into(), value);
    }

    /// Read one value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Render as a script statement: `const Config = {...};`
    #[must_use]
    pub fn render(&self) -> String {
        format!("const Config = {};", JsonValue::Object(self.0.clone()))
    }
}

/// Structured map configuration (`layerTree`, `menu`, `mapView`, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredConfig(pub Map<String, JsonValue>);

impl StructuredConfig {
    /// Start from an instance default
    #[inline]
    #[must_use]
    pub fn new(values: Map<String, JsonValue>) -> Self {
        Self(values)
    }

    /// Object at a key path, created (or replaced, when not an object) on the way
    pub fn object_at_mut(&mut self, path: &[&str]) -> &mut Map<String, JsonValue> {
        let mut current = &mut self.0;
        for key in path {
            let slot = current
                .entry((*key).to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !slot.is_object() {
                *slot = JsonValue::Object(Map::new());
            }
            current = match slot {
                JsonValue::Object(map) => map,
                _ => unreachable!("slot was just made an object"),
            };
        }
        current
    }

    /// Value at a key path
    #[must_use]
    pub fn pointer(&self, path: &[&str]) -> Option<&JsonValue> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |value, key| value.get(*key))
    }

    /// Top-level value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }
}

/// Result of one composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedConfig {
    /// Values for the client-side script
    pub script_augmentation: ScriptAugmentation,
    /// Structured map configuration
    pub structured_config: StructuredConfig,
    /// Catalog definitions of every layer in use, URLs carrying passthrough parameters
    pub layer_definitions: Vec<LayerCatalogEntry>,
    /// Cache key derived from instance, story and step
    pub cache_key: String,
    /// Invalidation tags
    pub cache_tags: BTreeSet<String>,
    /// Content fingerprint, usable as an ETag
    pub fingerprint: Fingerprint,
}

impl ComposedConfig {
    /// Cache tags as a list
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        self.cache_tags.iter().cloned().collect()
    }

    /// `url` of the story index tool
    #[must_use]
    pub fn story_index_url(&self) -> Option<&str> {
        self.structured_config
            .pointer(&["menu", "tools", STORY_INDEX_TOOL, "url"])
            .and_then(JsonValue::as_str)
    }

    /// Point the story index tool at another URL and refresh the fingerprint
    pub fn set_story_index_url(&mut self, url: impl Into<String>) {
        self.structured_config
            .object_at_mut(&["menu", "tools", STORY_INDEX_TOOL])
            .insert("url".to_string(), JsonValue::from(url.into()));
        self.fingerprint = content_fingerprint(
            &self.script_augmentation,
            &self.structured_config,
            &self.layer_definitions,
        );
    }
}

/// Fingerprint over everything a client renders
#[must_use]
pub fn content_fingerprint(
    script: &ScriptAugmentation,
    structured: &StructuredConfig,
    definitions: &[LayerCatalogEntry],
) -> Fingerprint {
    Fingerprint::of_json(&json!({
        "script": script,
        "structured": structured,
        "layers": definitions,
    }))
}
