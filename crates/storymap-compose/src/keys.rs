//! Cache keys and invalidation tags
//!
//! Keys: `<instance>`, `<instance>:story-<story>`, `<instance>:story-<story>:step-<step>`.
//! Tags: `instance:<instance>`, `<instance>:layer:<layer>`, `node:<story>`,
//! `story_step:<step>`.

use storymap_model::{InstanceId, StepId, StoryId};

/// Cache key of a composed configuration
#[must_use]
pub fn config_cache_key(instance: &InstanceId, story: Option<StoryId>, step: Option<StepId>) -> String {
    let mut key = instance.to_string();
    if let Some(story) = story {
        key.push_str(&format!(":story-{story}"));
        if let Some(step) = step {
            key.push_str(&format!(":step-{step}"));
        }
    }
    key
}

/// Cache key of a story structure
#[inline]
#[must_use]
pub fn story_structure_key(story: StoryId) -> String {
    format!("story-structure:{story}")
}

/// Tag of everything derived from an instance default
#[inline]
#[must_use]
pub fn instance_tag(instance: &InstanceId) -> String {
    format!("instance:{instance}")
}

/// Tag of everything using a catalog layer within an instance
#[inline]
#[must_use]
pub fn layer_tag(instance: &InstanceId, layer_id: &str) -> String {
    format!("{instance}:layer:{layer_id}")
}

/// Tag of everything derived from a story
#[inline]
#[must_use]
pub fn story_tag(story: StoryId) -> String {
    format!("node:{story}")
}

/// Tag of everything derived from a story step
#[inline]
#[must_use]
pub fn step_tag(step: StepId) -> String {
    format!("story_step:{step}")
}
