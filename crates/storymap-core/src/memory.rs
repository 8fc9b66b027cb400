//! In-memory backend
//!
//! Implements every collaborator the service reads from. Used by the CLI
//! (loaded from a JSON fixture document) and by tests.

use crate::error::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use storymap_compose::{InstanceStore, LayerCatalog, LookupError, MapInstance, SettingsStore};
use storymap_model::{InstanceId, LayerCatalogEntry, SettingsDocument, StepId, StoryId, StoryRecord};
use storymap_story::StoryStore;

/// Serialized form of a [`MemoryBackend`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixtureDocument {
    /// Layer catalog
    pub layers: Vec<LayerCatalogEntry>,
    /// Map instances
    pub instances: Vec<MapInstance>,
    /// Stories with their flat step lists
    pub stories: Vec<StoryRecord>,
    /// Story-scope settings by story id
    pub story_settings: BTreeMap<StoryId, SettingsDocument>,
    /// Step-scope settings by step id
    pub step_settings: BTreeMap<StepId, SettingsDocument>,
}

#[derive(Debug, Default)]
struct Tables {
    layers: HashMap<String, LayerCatalogEntry>,
    instances: HashMap<InstanceId, MapInstance>,
    stories: HashMap<StoryId, StoryRecord>,
    story_settings: HashMap<StoryId, SettingsDocument>,
    step_settings: HashMap<StepId, SettingsDocument>,
}

/// Thread-safe in-memory implementation of all lookups
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    /// Create empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create backend from a fixture document
    #[must_use]
    pub fn from_fixture(fixture: FixtureDocument) -> Self {
        let backend = Self::new();
        for layer in fixture.layers {
            backend.put_layer(layer);
        }
        for instance in fixture.instances {
            backend.put_instance(instance);
        }
        for story in fixture.stories {
            backend.put_story(story);
        }
        for (id, settings) in fixture.story_settings {
            backend.put_story_settings(id, settings);
        }
        for (id, settings) in fixture.step_settings {
            backend.put_step_settings(id, settings);
        }
        backend
    }

    /// Parse a JSON fixture document
    ///
    /// # Errors
    /// Returns [`StoryMapError::Fixture`](crate::StoryMapError::Fixture) for
    /// invalid documents.
    pub fn from_fixture_json(document: &str) -> Result<Self> {
        let fixture: FixtureDocument = serde_json::from_str(document)?;
        Ok(Self::from_fixture(fixture))
    }

    /// Read and parse a JSON fixture file
    ///
    /// # Errors
    /// Returns an error when the file can not be read or parsed.
    pub fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| {
            crate::config::ConfigError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;
        Self::from_fixture_json(&document)
    }

    /// Insert or replace a catalog entry
    pub fn put_layer(&self, layer: LayerCatalogEntry) {
        self.tables.write().layers.insert(layer.id.clone(), layer);
    }

    /// Remove a catalog entry
    pub fn remove_layer(&self, id: &str) -> Option<LayerCatalogEntry> {
        self.tables.write().layers.remove(id)
    }

    /// Insert or replace an instance
    pub fn put_instance(&self, instance: MapInstance) {
        self.tables
            .write()
            .instances
            .insert(instance.id.clone(), instance);
    }

    /// Insert or replace a story
    pub fn put_story(&self, story: StoryRecord) {
        self.tables.write().stories.insert(story.id, story);
    }

    /// Insert or replace story-scope settings
    pub fn put_story_settings(&self, story: StoryId, settings: SettingsDocument) {
        self.tables.write().story_settings.insert(story, settings);
    }

    /// Insert or replace step-scope settings
    pub fn put_step_settings(&self, step: StepId, settings: SettingsDocument) {
        self.tables.write().step_settings.insert(step, settings);
    }
}

impl LayerCatalog for MemoryBackend {
    fn get(&self, id: &str) -> std::result::Result<Option<LayerCatalogEntry>, LookupError> {
        Ok(self.tables.read().layers.get(id).cloned())
    }
}

impl SettingsStore for MemoryBackend {
    fn story_settings(&self, story: StoryId) -> std::result::Result<Option<SettingsDocument>, LookupError> {
        Ok(self.tables.read().story_settings.get(&story).cloned())
    }

    fn step_settings(&self, step: StepId) -> std::result::Result<Option<SettingsDocument>, LookupError> {
        Ok(self.tables.read().step_settings.get(&step).cloned())
    }
}

impl InstanceStore for MemoryBackend {
    fn instance(&self, id: &InstanceId) -> std::result::Result<Option<MapInstance>, LookupError> {
        Ok(self.tables.read().instances.get(id).cloned())
    }
}

impl StoryStore for MemoryBackend {
    fn story(&self, id: StoryId) -> std::result::Result<Option<StoryRecord>, LookupError> {
        Ok(self.tables.read().stories.get(&id).cloned())
    }
}
