//! Map widget configuration composer
//!
//! Builds the configuration of an interactive map widget from:
//! - [`MapInstance`]: the shared instance default
//! - [`SettingsStore`]: persisted per-story and per-step settings
//! - [`QueryParams`]: ad-hoc request parameters
//!
//! then lets registered [`MapFeaturePlugin`]s adjust the result, and derives
//! the cache key and invalidation tags of the output.
//!
//! # Example
//!
//! ```rust
//! use storymap_compose::{QueryParams, RequestContext};
//!
//! let query = QueryParams::parse("preview=1&BackgroundLayer=100/200&Tools=draw");
//! let context = RequestContext::from_query(&query).unwrap();
//! assert!(context.is_ad_hoc());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod composer;
pub mod error;
pub mod feature;
pub mod keys;
pub mod output;
pub mod request;
pub mod resolver;
pub mod source;

pub use composer::{ComposeOptions, Composer, STORY_INDEX_TOOL, STORY_NAVIGATOR_TOOL};
pub use error::{ComposeError, ComposeResult, LookupError};
pub use feature::{FeatureDescriptor, FeatureRegistry, MapFeaturePlugin, PluginRequest};
pub use output::{content_fingerprint, ComposedConfig, ScriptAugmentation, StructuredConfig};
pub use request::{AdHocSelection, QueryParams, RequestContext, RequestInfo};
pub use resolver::LayerResolver;
pub use source::{InstanceStore, LayerCatalog, MapInstance, SettingsStore};
