use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ════════════════════════════════════════════════════════════════
//  MessageId
// ════════════════════════════════════════════════════════════════

/// Opaque, server-assigned message identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ════════════════════════════════════════════════════════════════
//  Message
// ════════════════════════════════════════════════════════════════

/// An accepted message. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    /// Acceptance time in Unix epoch milliseconds (server clock).
    pub created_at: i64,
    /// Producer-supplied ordering hint. Opaque to the store.
    pub sequence_number: i64,
}

impl Message {
    /// Finalize a validated candidate with its server-assigned id and
    /// acceptance timestamp. Any caller-supplied `created_at` is discarded.
    pub fn accept(candidate: MessageCandidate, id: MessageId, created_at: i64) -> Self {
        Self {
            id,
            content: candidate.content,
            created_at,
            sequence_number: candidate.sequence_number,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  MessageCandidate
// ════════════════════════════════════════════════════════════════

/// A message as submitted by a producer, before validation.
///
/// Missing fields deserialize to their defaults so that the validation
/// policy, not the decoder, reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCandidate {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sequence_number: i64,
    /// Advisory only, never used for ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl MessageCandidate {
    pub fn new(content: impl Into<String>, sequence_number: i64) -> Self {
        Self {
            content: content.into(),
            sequence_number,
            created_at: None,
        }
    }
}
