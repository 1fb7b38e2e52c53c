use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::RwLock;

use messenger_api::{Message, MessageId, MessageStore, StoreError, StoreFactory};

// ═══════════════════════════════════════════════════════════════
//  MemoryStoreConfig
// ═══════════════════════════════════════════════════════════════

fn default_initial_capacity() -> usize {
    1024
}

#[derive(Debug, serde::Deserialize)]
pub struct MemoryStoreConfig {
    /// Preallocated slots. Not a limit: nothing is ever evicted.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct Inner {
    /// Sorted by `created_at`; equal timestamps keep insertion order.
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

/// In-process message store. Not durable across restarts; meant for
/// tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                messages: Vec::with_capacity(capacity),
                ids: HashSet::with_capacity(capacity),
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl MessageStore for MemoryStore {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn insert(&self, message: &Message) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let message = message.clone();
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            if !inner.ids.insert(message.id) {
                return Err(StoreError::Conflict(message.id));
            }
            // Upper bound: after every message with the same timestamp.
            let pos = inner
                .messages
                .partition_point(|m| m.created_at <= message.created_at);
            inner.messages.insert(pos, message);
            Ok(())
        })
    }

    fn query_since(&self, since_ms: i64) -> Pin<Box<dyn Future<Output = Result<Vec<Message>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let start = inner.messages.partition_point(|m| m.created_at < since_ms);
            Ok(inner.messages[start..].to_vec())
        })
    }

    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStoreFactory
// ═══════════════════════════════════════════════════════════════

pub struct MemoryStoreFactory;

impl StoreFactory for MemoryStoreFactory {
    fn create(&self, config_json: &str) -> Result<Arc<dyn MessageStore>, serde_json::Error> {
        let config: MemoryStoreConfig = if config_json == "{}" {
            MemoryStoreConfig::default()
        } else {
            serde_json::from_str(config_json)?
        };
        Ok(Arc::new(MemoryStore::with_capacity(config.initial_capacity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn msg(content: &str, created_at: i64) -> Message {
        Message {
            id: MessageId::generate(),
            content: content.into(),
            created_at,
            sequence_number: 0,
        }
    }

    #[tokio::test]
    async fn query_since_is_inclusive_and_ordered() {
        let store = MemoryStore::new();
        let a = msg("a", 10);
        let b = msg("b", 20);
        let c = msg("c", 30);
        // Out-of-order arrival, as with concurrent submissions.
        store.insert(&b).await.unwrap();
        store.insert(&c).await.unwrap();
        store.insert(&a).await.unwrap();

        assert_eq!(store.query_since(20).await.unwrap(), vec![b.clone(), c.clone()]);
        assert_eq!(store.query_since(0).await.unwrap(), vec![a, b, c]);
        assert!(store.query_since(31).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = MemoryStore::new();
        let first = msg("first", 5);
        let second = msg("second", 5);
        let third = msg("third", 5);
        for m in [&first, &second, &third] {
            store.insert(m).await.unwrap();
        }
        assert_eq!(store.query_since(5).await.unwrap(), vec![first, second, third]);
    }

    #[tokio::test]
    async fn duplicate_id_conflicts_without_writing() {
        let store = MemoryStore::new();
        let m = msg("once", 1);
        store.insert(&m).await.unwrap();

        let mut dup = msg("twice", 2);
        dup.id = m.id;
        assert_eq!(store.insert(&dup).await, Err(StoreError::Conflict(m.id)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn window_query_uses_wall_clock() {
        let store = MemoryStore::new();
        let old = msg("old", messenger_api::now_ms() - 10 * 60_000);
        let fresh = msg("fresh", messenger_api::now_ms());
        store.insert(&old).await.unwrap();
        store.insert(&fresh).await.unwrap();

        let recent = store
            .query_within_last(std::time::Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(recent, vec![fresh]);
    }

    #[test]
    fn factory_accepts_empty_and_explicit_config() {
        assert!(MemoryStoreFactory.create("{}").is_ok());
        assert!(MemoryStoreFactory.create(r#"{"initial_capacity": 8}"#).is_ok());
        assert!(MemoryStoreFactory.create(r#"{"initial_capacity": "lots"}"#).is_err());
    }

    proptest! {
        #[test]
        fn query_since_is_monotonic(stamps in proptest::collection::vec(0i64..1_000, 0..64), t1 in 0i64..1_000, t2 in 0i64..1_000) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                for (i, ts) in stamps.iter().enumerate() {
                    store.insert(&msg(&i.to_string(), *ts)).await.unwrap();
                }
                let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
                let wide = store.query_since(lo).await.unwrap();
                let narrow = store.query_since(hi).await.unwrap();
                assert!(narrow.iter().all(|m| wide.contains(m)));
                assert!(wide.windows(2).all(|w| w[0].created_at <= w[1].created_at));
                assert_eq!(wide.len(), stamps.iter().filter(|ts| **ts >= lo).count());
            });
        }
    }
}
