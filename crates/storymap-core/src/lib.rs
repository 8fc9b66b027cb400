//! storymap service
//!
//! Facade over composition and story structures:
//!
//! - [`StoryMapService::compose_map_configuration`]: cached map configuration
//!   for an instance, story and step
//! - [`StoryMapService::resolve_layer_definitions`]: catalog definitions with
//!   passthrough parameters
//! - [`StoryMapService::build_story_structure`]: cached story step tree
//! - [`StoryMapService::invalidate`]: tag-based invalidation of both caches
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use storymap_compose::{FeatureRegistry, MapInstance, QueryParams, RequestInfo};
//! use storymap_core::{Backends, MemoryBackend, ServiceConfig, StoryMapService};
//! use storymap_model::InstanceId;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! backend.put_instance(MapInstance::new("main"));
//!
//! let service = StoryMapService::new(
//!     ServiceConfig::default(),
//!     Backends::shared(backend),
//!     FeatureRegistry::new(),
//! );
//! let request = RequestInfo::new("https", "maps.example", QueryParams::parse("preview=1"));
//! let composed = service
//!     .compose_map_configuration(&InstanceId::new("main"), &request)
//!     .unwrap();
//! assert_eq!(composed.cache_key, "main");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod memory;
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use error::{Result, StoryMapError};
pub use memory::{FixtureDocument, MemoryBackend};
pub use service::{Backends, CacheSummary, ServiceStats, StoryMapService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
