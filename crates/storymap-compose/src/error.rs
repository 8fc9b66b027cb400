//! Error types for configuration composition
//!
//! Provides error handling for:
//! - Request parsing (mode resolution, layer tokens, story references)
//! - Collaborator lookups (catalog, settings, instances)
//! - Stored data that can not be applied (layer patches)

use storymap_model::InstanceId;

/// Collaborator lookup failures
///
/// Lookups are never retried; the failure is fatal for the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// Requested document does not exist
    #[error("{what} '{id}' not found")]
    NotFound {
        /// Document family (story settings, step settings, instance, ...)
        what: &'static str,
        /// Requested id
        id: String,
    },

    /// Collaborator could not be reached or failed
    #[error("{what} lookup unavailable: {reason}")]
    Unavailable {
        /// Document family
        what: &'static str,
        /// Collaborator message
        reason: String,
    },
}

impl LookupError {
    /// Create not-found error
    pub fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Create unavailable error
    pub fn unavailable(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            what,
            reason: reason.into(),
        }
    }

    /// Turn an absent lookup result into [`LookupError::NotFound`]
    ///
    /// # Errors
    /// Returns `NotFound` when `found` is `None`.
    pub fn require<T>(found: Option<T>, what: &'static str, id: impl ToString) -> Result<T, Self> {
        found.ok_or_else(|| Self::not_found(what, id))
    }
}

/// Composition errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    /// Request resolves to neither ad-hoc nor persisted mode, or a reserved
    /// parameter can not be parsed
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Collaborator lookup failed
    #[error("lookup failed: {0}")]
    Lookup(#[from] LookupError),

    /// Stored JSON patch for a layer is not an object
    #[error("invalid JSON patch for layer {layer} in instance {instance}: {reason}")]
    InvalidLayerPatch {
        /// Instance being composed
        instance: InstanceId,
        /// Layer key
        layer: String,
        /// Decoder message
        reason: String,
    },
}

impl ComposeError {
    /// Create malformed request error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Whether the caller sent a bad request
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedRequest(_))
    }

    /// Whether a required document was missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Lookup(LookupError::NotFound { .. }))
    }
}

/// Result type alias for composition operations
pub type ComposeResult<T> = Result<T, ComposeError>;
