//! Error types for the storymap service
//!
//! Aggregates the errors of every layer below the facade:
//! - Request and composition failures ([`ComposeError`])
//! - Story structure failures ([`StoryError`])
//! - Configuration and fixture loading

use crate::config::ConfigError;
use storymap_compose::{ComposeError, LookupError};
use storymap_story::StoryError;

/// Main storymap error type
#[derive(Debug, thiserror::Error)]
pub enum StoryMapError {
    /// Configuration composition failed
    #[error("composition failed: {0}")]
    Compose(#[from] ComposeError),

    /// Story structure could not be built
    #[error("story structure failed: {0}")]
    Story(#[from] StoryError),

    /// Service configuration is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fixture document is invalid
    #[error("invalid fixture document: {0}")]
    Fixture(#[from] serde_json::Error),
}

impl StoryMapError {
    /// Whether the caller sent a bad request
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Compose(e) if e.is_client_error())
    }

    /// Whether a required document was missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Compose(e) => e.is_not_found(),
            Self::Story(StoryError::Lookup(LookupError::NotFound { .. })) => true,
            _ => false,
        }
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, StoryMapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use storymap_model::StepId;

    #[test]
    fn classification() {
        let err: StoryMapError = ComposeError::malformed("neither mode").into();
        assert!(err.is_client_error());
        assert!(!err.is_not_found());

        let err: StoryMapError = StoryError::from(LookupError::not_found("story", 3)).into();
        assert!(err.is_not_found());
        assert!(!err.is_client_error());

        let err: StoryMapError = StoryError::OrphanedNode {
            step: StepId(2),
            parent: StepId(1),
        }
        .into();
        assert!(!err.is_client_error());
        assert_eq!(
            err.to_string(),
            "story structure failed: step 2 references parent 1, which does not precede it"
        );
    }
}
