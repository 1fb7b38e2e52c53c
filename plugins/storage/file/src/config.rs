use messenger_api::{Message, MessageId};

// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

fn default_sync_writes() -> bool {
    true
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct FileStoreConfig {
    /// Directory holding one `YYYY-MM-DD.jsonl` file per UTC day.
    pub data_dir: String,
    /// `sync_data` after every insert. Off trades durability for latency.
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

impl FileStoreConfig {
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sync_writes: default_sync_writes(),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  On-disk record format
// ════════════════════════════════════════════════════════════════

/// One line of a day file. Field names are the canonical persisted
/// column names.
#[derive(serde::Serialize, serde::Deserialize)]
pub(crate) struct DiskMessage {
    pub id: MessageId,
    pub content: String,
    pub created_at: i64,
    pub sequence_number: i64,
}

impl From<&Message> for DiskMessage {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id,
            content: m.content.clone(),
            created_at: m.created_at,
            sequence_number: m.sequence_number,
        }
    }
}

impl From<DiskMessage> for Message {
    fn from(d: DiskMessage) -> Self {
        Self {
            id: d.id,
            content: d.content,
            created_at: d.created_at,
            sequence_number: d.sequence_number,
        }
    }
}
