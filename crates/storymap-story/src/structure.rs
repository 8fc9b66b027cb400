//! Public story structure
//!
//! [`StoryBuilder`] loads a story, its map settings and the settings of
//! every step, derives the per-step rendering data and assembles the step
//! tree.

use crate::error::StoryResult;
use crate::tree::{build_tree, FlatStep, StoryStepNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use storymap_compose::{keys, LookupError, SettingsStore};
use storymap_model::{
    Channel, LayerChannel, SettingsDocument, StepRecord, StoryId, StoryRecord, ViewpointConfig,
};

/// Story id -> story metadata with its flat step list
pub trait StoryStore: Send + Sync {
    /// Look up one story
    ///
    /// # Errors
    /// Returns [`LookupError`] when the store can not be read.
    fn story(&self, id: StoryId) -> Result<Option<StoryRecord>, LookupError>;
}

/// Story metadata plus its step tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryStructure {
    /// Story id
    pub id: StoryId,
    /// Title
    pub title: String,
    /// Author display name
    pub author: Option<String>,
    /// Teaser text
    pub description: Option<String>,
    /// Cover image URL
    pub cover_image: Option<String>,
    /// Top-level steps in weight order
    pub steps: Vec<StoryStepNode>,
}

impl StoryStructure {
    /// Invalidation tags: the story and every step in it
    #[must_use]
    pub fn cache_tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        tags.insert(keys::story_tag(self.id));
        for root in &self.steps {
            root.walk(&mut |node| {
                tags.insert(keys::step_tag(node.id));
            });
        }
        tags
    }

    /// Number of steps at all depths
    #[must_use]
    pub fn step_count(&self) -> usize {
        let mut count = 0;
        for root in &self.steps {
            root.walk(&mut |_| count += 1);
        }
        count
    }
}

/// Builds [`StoryStructure`]s
pub struct StoryBuilder {
    stories: Arc<dyn StoryStore>,
    settings: Arc<dyn SettingsStore>,
    three_d_feature: String,
}

impl fmt::Debug for StoryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoryBuilder")
            .field("three_d_feature", &self.three_d_feature)
            .finish_non_exhaustive()
    }
}

impl StoryBuilder {
    /// Create builder over its collaborators
    pub fn new(
        stories: Arc<dyn StoryStore>,
        settings: Arc<dyn SettingsStore>,
        three_d_feature: impl Into<String>,
    ) -> Self {
        Self {
            stories,
            settings,
            three_d_feature: three_d_feature.into(),
        }
    }

    /// Build the public structure of a story
    ///
    /// Steps are ordered by weight (ties keep storage order) before the tree
    /// is built.
    ///
    /// # Errors
    /// - [`StoryError::Lookup`](crate::StoryError::Lookup) when the story,
    ///   its settings or a step's settings are absent or unreadable
    /// - [`StoryError::OrphanedNode`](crate::StoryError::OrphanedNode) and
    ///   [`StoryError::DuplicateStep`](crate::StoryError::DuplicateStep) for
    ///   inconsistent step lists
    pub fn build_story_structure(&self, story_id: StoryId) -> StoryResult<StoryStructure> {
        let story = LookupError::require(self.stories.story(story_id)?, "story", story_id)?;
        let story_settings = LookupError::require(
            self.settings.story_settings(story_id)?,
            "story settings",
            story_id,
        )?;

        let mut steps = story.steps;
        steps.sort_by_key(|step| step.weight);

        let flat = steps
            .into_iter()
            .map(|step| self.flat_step(step, &story_settings))
            .collect::<StoryResult<Vec<_>>>()?;
        let tree = build_tree(flat)?;

        let structure = StoryStructure {
            id: story.id,
            title: story.title,
            author: story.author,
            description: story.description,
            cover_image: story.cover_image,
            steps: tree,
        };
        tracing::info!(
            story = %story_id,
            steps = structure.step_count(),
            "built story structure"
        );
        Ok(structure)
    }

    fn flat_step(&self, step: StepRecord, story_settings: &SettingsDocument) -> StoryResult<FlatStep> {
        let settings = LookupError::require(
            self.settings.step_settings(step.id)?,
            "step settings",
            step.id,
        )?;

        let visible_layer_ids = Channel::ALL
            .iter()
            .flat_map(|&channel| {
                LayerChannel::from_settings(channel, story_settings.channel(channel))
                    .with_visible(settings.channel(channel).visible.iter().cloned())
                    .visible_keys()
            })
            .collect();

        let is_3d = settings.features.contains(&self.three_d_feature);
        let viewpoint = ViewpointConfig::select(
            is_3d,
            Some(&settings.viewpoint),
            Some(&story_settings.viewpoint),
        );

        let parent = step.parent();
        let node = StoryStepNode {
            id: step.id,
            title: step.title,
            title_image: step.title_image,
            title_image_alt: step.title_image_alt,
            content_ref: step.content_ref,
            visible_layer_ids,
            active_tool: settings.active_tool().map(str::to_string),
            viewpoint,
            is_3d,
            depth: 0,
            children: Vec::new(),
        };
        Ok(FlatStep::new(parent, node))
    }
}
