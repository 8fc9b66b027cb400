//! Persisted map settings documents
//!
//! The same document shape is stored for a story and for each of its steps.
//! At story scope `tools` lists the available tools and `features` the
//! enabled feature plugins; at step scope `active_tool` names the one active
//! tool and `features` the activated subset.

use crate::layer::{LayerOverride, LayerRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Tool id meaning "no active tool"
pub const NO_TOOL: &str = "none";

/// Stored layer selection for one channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Selected layers, in render order
    pub selected: Vec<LayerRef>,
    /// Layers initially visible
    pub visible: Vec<LayerRef>,
    /// Per-layer overrides keyed by layer key
    pub overrides: IndexMap<String, LayerOverride>,
}

/// Tool id -> tool configuration, in menu order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolSelection(pub IndexMap<String, JsonValue>);

impl ToolSelection {
    /// Empty selection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool with its configuration
    #[must_use]
    pub fn with_tool(mut self, id: impl Into<String>, config: JsonValue) -> Self {
        self.0.insert(id.into(), config);
        self
    }

    /// Tool configuration
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&JsonValue> {
        self.0.get(id)
    }

    /// Iterate in menu order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    /// Number of tools
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no tool is selected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Set of feature plugin ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSelection(pub BTreeSet<String>);

impl FeatureSelection {
    /// Whether a feature is selected
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Iterate feature ids
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureSelection {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Raw viewpoint fields as stored; both 2D and 3D fields may be present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewpointSettings {
    /// 2D map center
    pub center: Option<[f64; 2]>,
    /// 2D zoom level
    pub zoom_level: Option<i32>,
    /// 3D camera position
    pub camera_position: Option<[f64; 3]>,
    /// 3D camera heading (radians)
    pub heading: Option<f64>,
    /// 3D camera pitch (radians)
    pub pitch: Option<f64>,
}

impl ViewpointSettings {
    /// 2D viewpoint, when center and zoom are both stored
    #[must_use]
    pub fn two_d(&self) -> Option<ViewpointConfig> {
        Some(ViewpointConfig::TwoD {
            center: self.center?,
            zoom_level: self.zoom_level?,
        })
    }

    /// 3D viewpoint, when a camera position is stored
    #[must_use]
    pub fn three_d(&self) -> Option<ViewpointConfig> {
        Some(ViewpointConfig::ThreeD {
            camera_position: self.camera_position?,
            heading: self.heading.unwrap_or_default(),
            pitch: self.pitch.unwrap_or_default(),
        })
    }
}

/// The single active viewpoint of a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum ViewpointConfig {
    /// Flat map view
    #[serde(rename = "2D", rename_all = "camelCase")]
    TwoD {
        /// Map center
        center: [f64; 2],
        /// Zoom level
        zoom_level: i32,
    },
    /// Globe view
    #[serde(rename = "3D", rename_all = "camelCase")]
    ThreeD {
        /// Camera position
        camera_position: [f64; 3],
        /// Heading (radians)
        heading: f64,
        /// Pitch (radians)
        pitch: f64,
    },
}

impl ViewpointConfig {
    /// Pick the viewpoint variant for `three_d` and read it from the step
    /// first, then from the story
    ///
    /// Fields of the other variant are never consulted, so a step with 3D
    /// active can not fall back to story-level 2D defaults.
    #[must_use]
    pub fn select(
        three_d: bool,
        step: Option<&ViewpointSettings>,
        story: Option<&ViewpointSettings>,
    ) -> Option<Self> {
        let read = |settings: &ViewpointSettings| {
            if three_d {
                settings.three_d()
            } else {
                settings.two_d()
            }
        };
        step.and_then(read).or_else(|| story.and_then(read))
    }

    /// Whether this is the 3D variant
    #[inline]
    #[must_use]
    pub fn is_3d(&self) -> bool {
        matches!(self, Self::ThreeD { .. })
    }
}

/// Persisted map settings for a story or a story step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsDocument {
    /// Background channel
    pub background: ChannelSettings,
    /// Foreground channel
    pub foreground: ChannelSettings,
    /// Available tools (story scope)
    pub tools: ToolSelection,
    /// Active tool (step scope)
    pub active_tool: Option<String>,
    /// Enabled (story) or activated (step) feature plugins
    pub features: FeatureSelection,
    /// Viewpoint fields
    pub viewpoint: ViewpointSettings,
}

impl SettingsDocument {
    /// Active tool id, `None` for an unset, blank or `"none"` tool
    #[must_use]
    pub fn active_tool(&self) -> Option<&str> {
        self.active_tool
            .as_deref()
            .map(str::trim)
            .filter(|tool| !tool.is_empty() && *tool != NO_TOOL)
    }

    /// Channel settings by channel
    #[inline]
    #[must_use]
    pub fn channel(&self, channel: crate::Channel) -> &ChannelSettings {
        match channel {
            crate::Channel::Background => &self.background,
            crate::Channel::Foreground => &self.foreground,
        }
    }
}
