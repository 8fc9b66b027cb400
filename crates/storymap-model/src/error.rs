//! Error types for the data model

/// Errors raised while parsing model values from external input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Identifier is not a valid numeric id
    #[error("invalid {kind} id: '{value}'")]
    InvalidId {
        /// Which id family failed to parse
        kind: &'static str,
        /// Offending input
        value: String,
    },

    /// Layer token could not be decoded
    #[error("invalid layer token '{token}': {reason}")]
    InvalidLayerToken {
        /// Offending token text
        token: String,
        /// Decoder message
        reason: String,
    },
}

impl ModelError {
    /// Create invalid id error
    pub fn invalid_id(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidId {
            kind,
            value: value.into(),
        }
    }

    /// Create invalid layer token error
    pub fn invalid_layer_token(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLayerToken {
            token: token.into(),
            reason: reason.into(),
        }
    }
}
