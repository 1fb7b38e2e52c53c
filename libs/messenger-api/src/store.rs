use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::message::Message;
use crate::util::window_start_ms;

// ════════════════════════════════════════════════════════════════
//  Message Store
// ════════════════════════════════════════════════════════════════

/// Durable, time-ordered message persistence.
///
/// Implementations must make a successful `insert` visible to every
/// query issued after it returns. Messages are never updated or deleted.
/// Range predicates apply to `created_at`, never to `sequence_number`.
pub trait MessageStore: Send + Sync {
    /// Prepare the backend (directories, indexes). Called once before use.
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Append a message. Fails with `Conflict` if its id is already stored.
    fn insert(&self, message: &Message) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Every message with `created_at >= since_ms`, ascending by `created_at`,
    /// ties in insertion order. Empty when nothing matches.
    fn query_since(&self, since_ms: i64) -> Pin<Box<dyn Future<Output = Result<Vec<Message>, StoreError>> + Send + '_>>;

    /// Same as `query_since(now - window)`.
    fn query_within_last(
        &self,
        window: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Message>, StoreError>> + Send + '_>> {
        self.query_since(window_start_ms(window))
    }

    /// Flush buffered writes.
    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// Builds a `MessageStore` from a JSON config string (`"{}"` = defaults).
pub trait StoreFactory: Send + Sync {
    fn create(&self, config_json: &str) -> Result<Arc<dyn MessageStore>, serde_json::Error>;
}
