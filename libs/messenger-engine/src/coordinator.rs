use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use messenger_api::{
    Message, MessageCandidate, MessageId, MessagePublisher, MessageStore, StoreError, SubmitError,
};

use crate::clock::AcceptanceClock;
use crate::config::EngineConfig;
use crate::policy::ValidationPolicy;

/// Validate → persist → broadcast, one logical unit per submission, plus
/// the time-window read path.
///
/// Holds no lock across submissions: concurrent `submit` and reads run in
/// parallel and the store orders what they persist.
pub struct Coordinator {
    store: Arc<dyn MessageStore>,
    publisher: Arc<dyn MessagePublisher>,
    policy: ValidationPolicy,
    clock: AcceptanceClock,
    store_timeout: Duration,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("policy", &self.policy)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        publisher: Arc<dyn MessagePublisher>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            policy: ValidationPolicy::new(config.max_content_len),
            clock: AcceptanceClock::new(),
            store_timeout: config.store_timeout(),
        }
    }

    /// Replace the acceptance clock.
    pub fn with_clock(mut self, clock: AcceptanceClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Initialize the underlying store.
    pub async fn init(&self) -> Result<(), StoreError> {
        self.bounded("init", self.store.init()).await
    }

    /// Accept a candidate.
    ///
    /// Returns the finalized message once it is durably stored. Validation
    /// and store failures abort with no side effect beyond what the store
    /// itself performed; nothing is broadcast. Broadcast is fire-and-forget
    /// and never fails the submission.
    pub async fn submit(&self, candidate: MessageCandidate) -> Result<Message, SubmitError> {
        if let Err(e) = self.policy.validate(&candidate) {
            tracing::debug!(field = %e.field, reason = %e.reason, "candidate rejected");
            return Err(e.into());
        }

        let message = Message::accept(candidate, MessageId::generate(), self.clock.stamp());

        if let Err(e) = self.bounded("insert", self.store.insert(&message)).await {
            match &e {
                StoreError::Conflict(id) => {
                    tracing::error!(id = %id, "generated message id collided with a stored one");
                }
                StoreError::Unavailable(reason) => {
                    tracing::error!(id = %message.id, reason = %reason, "failed to persist message");
                }
            }
            return Err(e.into());
        }

        tracing::debug!(
            id = %message.id,
            created_at = message.created_at,
            sequence_number = message.sequence_number,
            "message persisted"
        );

        self.publisher.publish(&message);
        Ok(message)
    }

    /// Every message created at or after `since_ms`, oldest first.
    pub async fn get_since(&self, since_ms: i64) -> Result<Vec<Message>, StoreError> {
        self.bounded("query_since", self.store.query_since(since_ms)).await
    }

    /// Every message created within the trailing `window`, oldest first.
    pub async fn get_within_last(&self, window: Duration) -> Result<Vec<Message>, StoreError> {
        self.bounded("query_within_last", self.store.query_within_last(window)).await
    }

    /// Flush the store (shutdown path).
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.bounded("flush", self.store.flush()).await
    }

    /// Run a store call under the configured timeout.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result.map_err(|e| e.with_context(op)),
            Err(_) => Err(StoreError::unavailable(format!(
                "{op}: timed out after {}ms",
                self.store_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use messenger_api::Field;
    use messenger_storage_memory::MemoryStore;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<Message>>,
    }

    impl MessagePublisher for RecordingPublisher {
        fn publish(&self, message: &Message) {
            self.published.lock().unwrap().push(message.clone());
        }
    }

    /// Store whose writes always fail or hang.
    enum BrokenStore {
        Failing,
        Hanging,
        Colliding,
    }

    impl MessageStore for BrokenStore {
        fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn insert(&self, message: &Message) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            let id = message.id;
            Box::pin(async move {
                match self {
                    BrokenStore::Failing => Err(StoreError::unavailable("connection refused")),
                    BrokenStore::Hanging => std::future::pending().await,
                    BrokenStore::Colliding => Err(StoreError::Conflict(id)),
                }
            })
        }

        fn query_since(&self, _since_ms: i64) -> Pin<Box<dyn Future<Output = Result<Vec<Message>, StoreError>> + Send + '_>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn coordinator(store: Arc<dyn MessageStore>) -> (Coordinator, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let config = EngineConfig { max_content_len: 16, store_timeout_ms: 50 };
        (Coordinator::new(store, publisher.clone(), &config), publisher)
    }

    #[tokio::test]
    async fn accepted_message_is_stored_then_broadcast() {
        let store = Arc::new(MemoryStore::new());
        let (coord, publisher) = coordinator(store.clone());

        let msg = coord.submit(MessageCandidate::new("hi", 1)).await.unwrap();

        assert_eq!(msg.content, "hi");
        assert_eq!(msg.sequence_number, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(*publisher.published.lock().unwrap(), vec![msg]);
    }

    #[tokio::test]
    async fn invalid_candidate_has_no_side_effects() {
        let store = Arc::new(MemoryStore::new());
        let (coord, publisher) = coordinator(store.clone());

        let err = coord.submit(MessageCandidate::new("", 0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ref v) if v.field == Field::Content));

        let err = coord.submit(MessageCandidate::new("ok", -3)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ref v) if v.field == Field::SequenceNumber));

        let err = coord.submit(MessageCandidate::new("x".repeat(17), 0)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ref v) if v.field == Field::Content));

        assert_eq!(store.len().await, 0);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_fails_submission_and_skips_broadcast() {
        let (coord, publisher) = coordinator(Arc::new(BrokenStore::Failing));

        let err = coord.submit(MessageCandidate::new("hi", 1)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Store(StoreError::Unavailable(ref m)) if m.starts_with("insert: ")));
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn id_conflict_is_surfaced() {
        let (coord, publisher) = coordinator(Arc::new(BrokenStore::Colliding));

        let err = coord.submit(MessageCandidate::new("hi", 1)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Store(StoreError::Conflict(_))));
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_store_times_out_as_unavailable() {
        let (coord, publisher) = coordinator(Arc::new(BrokenStore::Hanging));

        let err = coord.submit(MessageCandidate::new("hi", 1)).await.unwrap_err();
        assert!(matches!(err, SubmitError::Store(StoreError::Unavailable(ref m)) if m.contains("timed out")));
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn timestamps_come_from_the_acceptance_clock() {
        let store = Arc::new(MemoryStore::new());
        let ticks = Arc::new(AtomicUsize::new(0));
        let src = ticks.clone();
        // Clock that runs backwards: 1000, 999, 998, ...
        let clock = AcceptanceClock::with_source(move || 1_000 - src.fetch_add(1, Ordering::SeqCst) as i64);
        let (coord, _) = coordinator(store.clone());
        let coord = coord.with_clock(clock);

        let mut candidate = MessageCandidate::new("a", 0);
        candidate.created_at = Some(5);
        let a = coord.submit(candidate).await.unwrap();
        let b = coord.submit(MessageCandidate::new("b", 0)).await.unwrap();

        assert_eq!(a.created_at, 1_000);
        assert_eq!(b.created_at, 1_000);
        let all = coord.get_since(0).await.unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[tokio::test]
    async fn broadcast_is_not_required_for_acceptance() {
        struct NoListeners;
        impl MessagePublisher for NoListeners {
            fn publish(&self, _message: &Message) {}
        }

        let store = Arc::new(MemoryStore::new());
        let coord = Coordinator::new(store.clone(), Arc::new(NoListeners), &EngineConfig::default());
        let msg = coord.submit(MessageCandidate::new("quiet", 0)).await.unwrap();
        assert_eq!(coord.get_within_last(Duration::from_secs(60)).await.unwrap(), vec![msg]);
    }
}
