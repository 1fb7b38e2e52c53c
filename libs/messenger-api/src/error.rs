use std::fmt;

use serde::Serialize;

use crate::message::MessageId;

/// Candidate field a validation rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Content,
    SequenceNumber,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Content => "content",
            Field::SequenceNumber => "sequenceNumber",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate was rejected before any side effect. Client-caused:
/// resubmitting a corrected candidate always recovers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

/// Message store failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Identifier collision. Ids are server-generated, so this signals a
    /// broken uniqueness invariant rather than bad input.
    #[error("message {0} already stored")]
    Conflict(MessageId),

    /// Storage unreachable, failed, or timed out. Transient.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Whether the caller may retry the same operation later.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    /// Add context to the error, preserving the variant.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        match self {
            StoreError::Unavailable(msg) => StoreError::Unavailable(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::unavailable(e.to_string())
    }
}

/// Outcome of a failed submission: "fix your input" versus "retry later".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
