//! Error types for mapper operations.
//!
//! Codec and query failures have their own enums so they can be matched on
//! without going through [`MapperError`]; both convert into it with `?`.

use dynamap_model::StoreError;

/// Errors produced while packing or unpacking a compact value.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A value does not match the structure the field shape expects.
    #[error("field '{field}' expected {expected}, found {found}")]
    ShapeMismatch {
        /// The field being packed or unpacked.
        field: String,
        /// What the shape requires.
        expected: &'static str,
        /// What the value actually was.
        found: String,
    },
    /// The compact text could not be parsed.
    #[error("malformed compact value at offset {offset}: {message}")]
    Malformed {
        /// Character offset of the failure.
        offset: usize,
        /// Explanation.
        message: String,
    },
    /// A back-reference points past the values seen so far.
    #[error("unresolved back-reference ^{index} ({seen} values seen)")]
    UnresolvedReference {
        /// The referenced index.
        index: usize,
        /// How many values were registered when the reference was read.
        seen: usize,
    },
}

/// Errors produced while rendering query conditions.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// An operator was given operands it cannot render.
    #[error("invalid operand for {operator} on '{field}': {message}")]
    InvalidOperand {
        /// The operator being rendered.
        operator: String,
        /// The condition's attribute.
        field: String,
        /// Explanation.
        message: String,
    },
}

/// Errors returned by [`Mapper`](crate::mapper::Mapper) and the registry.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// The model is not registered, registered twice, or used in a way its
    /// metadata does not allow.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A required key attribute could not be resolved.
    #[error("key error: {0}")]
    Key(String),
    /// Compact value encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A query condition could not be rendered.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A record could not be converted to or from the model type.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The transport reported a failure.
    #[error(transparent)]
    Transport(#[from] StoreError),
}

impl MapperError {
    /// Build a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a key error.
    #[must_use]
    pub fn key(message: impl Into<String>) -> Self {
        Self::Key(message.into())
    }

    /// Returns `true` unless the transport reported the failure.
    ///
    /// Local errors raised while preparing a request mean the store was never
    /// called; codec and serialization errors can also come from decoding a
    /// response the store did return.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}
