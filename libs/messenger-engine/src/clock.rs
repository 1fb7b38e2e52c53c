use std::sync::atomic::{AtomicI64, Ordering};

use messenger_api::now_ms;

/// Acceptance-time clock for one coordinator.
///
/// Stamps never go backwards, even if the wall clock does: a stamp taken
/// after another stamp returned is always `>=` it.
pub struct AcceptanceClock {
    last: AtomicI64,
    source: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl std::fmt::Debug for AcceptanceClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptanceClock")
            .field("last", &self.last.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for AcceptanceClock {
    fn default() -> Self {
        Self::with_source(now_ms)
    }
}

impl AcceptanceClock {
    /// Wall-clock backed (Unix ms).
    pub fn new() -> Self {
        Self::default()
    }

    /// Backed by an arbitrary millisecond source.
    pub fn with_source(source: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            last: AtomicI64::new(i64::MIN),
            source: Box::new(source),
        }
    }

    /// Next acceptance timestamp.
    pub fn stamp(&self) -> i64 {
        let now = (self.source)();
        let prev = self.last.fetch_max(now, Ordering::AcqRel);
        prev.max(now)
    }
}
