//! Story structure errors

use storymap_compose::LookupError;
use storymap_model::StepId;

/// Story structure errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoryError {
    /// A step references a parent that was not placed before it
    #[error("step {step} references parent {parent}, which does not precede it")]
    OrphanedNode {
        /// Offending step
        step: StepId,
        /// Missing parent
        parent: StepId,
    },

    /// The same step id occurs twice in one story
    #[error("step {step} occurs more than once")]
    DuplicateStep {
        /// Repeated step id
        step: StepId,
    },

    /// Collaborator lookup failed
    #[error("lookup failed: {0}")]
    Lookup(#[from] LookupError),
}

impl StoryError {
    /// Whether the stored story itself is inconsistent
    #[inline]
    #[must_use]
    pub fn is_corrupt_story(&self) -> bool {
        matches!(self, Self::OrphanedNode { .. } | Self::DuplicateStep { .. })
    }
}

/// Result type alias for story operations
pub type StoryResult<T> = Result<T, StoryError>;
