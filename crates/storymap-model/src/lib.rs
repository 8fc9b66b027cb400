//! storymap data model
//!
//! Typed representation of everything the composer and the story builder
//! read from their collaborators:
//!
//! - [`LayerCatalogEntry`]: canonical layer definitions
//! - [`SettingsDocument`]: persisted story / story-step map settings
//! - [`LayerChannel`]: a resolved background or foreground layer group
//! - [`ViewpointConfig`]: the single active 2D or 3D viewpoint of a step
//! - [`StoryRecord`]: story metadata with its flat step list
//!
//! # Example
//!
//! ```rust
//! use storymap_model::{Channel, LayerChannel, LayerRef};
//!
//! let selected = vec![LayerRef::single("100"), LayerRef::single("200")];
//! let visible = vec![LayerRef::single("100"), LayerRef::single("999")];
//! let channel = LayerChannel::new(Channel::Background, selected, visible, Default::default());
//!
//! // "999" is not selected, so it can never be visible
//! assert!(channel.is_visible(&LayerRef::single("100")));
//! assert!(!channel.is_visible(&LayerRef::single("999")));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod ids;
pub mod json;
pub mod layer;
pub mod settings;
pub mod story;

pub use error::ModelError;
pub use ids::{InstanceId, StepId, StoryId};
pub use json::{canonical_json, shallow_merge, Fingerprint};
pub use layer::{Channel, LayerCatalogEntry, LayerChannel, LayerOverride, LayerRef};
pub use settings::{
    ChannelSettings, FeatureSelection, SettingsDocument, ToolSelection, ViewpointConfig,
    ViewpointSettings, NO_TOOL,
};
pub use story::{StepRecord, StoryRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
