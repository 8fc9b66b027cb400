//! Story structure for guided map narratives
//!
//! - [`build_tree`]: flat, parent-referenced step list to nested forest
//! - [`StoryBuilder`]: story metadata, per-step map data and the step tree
//!
//! # Example
//!
//! ```rust
//! use storymap_model::StepId;
//! use storymap_story::{build_tree, FlatStep, StoryStepNode};
//!
//! let steps = vec![
//!     FlatStep::new(None, StoryStepNode::new(StepId(1), "Start")),
//!     FlatStep::new(Some(StepId(1)), StoryStepNode::new(StepId(2), "Bridge")),
//! ];
//! let tree = build_tree(steps).unwrap();
//! assert_eq!(tree[0].children[0].depth, 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod structure;
pub mod tree;

pub use error::{StoryError, StoryResult};
pub use structure::{StoryBuilder, StoryStore, StoryStructure};
pub use tree::{build_tree, FlatStep, StoryStepNode};
