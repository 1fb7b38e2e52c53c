use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use messenger_api::{
    Message, MessagePublisher, MessageSubscriber, MessageSubscription, OverflowPolicy,
    SubscriptionId,
};

// ═══════════════════════════════════════════════════════════════
//  Subscriber
// ═══════════════════════════════════════════════════════════════

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::Sender<Message>,
    overflow: OverflowPolicy,
}

// ═══════════════════════════════════════════════════════════════
//  LiveSubscription
// ═══════════════════════════════════════════════════════════════

/// Receiving end of one live subscription.
pub struct LiveSubscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<Message>,
}

impl MessageSubscription for LiveSubscription {
    fn id(&self) -> SubscriptionId {
        self.id
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Message>> + Send + '_>> {
        Box::pin(async { self.rx.recv().await })
    }
}

// ═══════════════════════════════════════════════════════════════
//  LiveChannel
// ═══════════════════════════════════════════════════════════════

/// In-process live broadcast: one bounded mpsc channel per subscriber.
///
/// Keeps no history. A subscriber only sees messages published after it
/// subscribed.
pub struct LiveChannel {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Default for LiveChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveChannel {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Concrete-typed variant of [`MessageSubscriber::subscribe`].
    pub fn open(&self, buffer: usize, overflow: OverflowPolicy) -> LiveSubscription {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscriber { id, tx, overflow });
        tracing::debug!(subscription = %id, buffer, ?overflow, "subscriber added");
        LiveSubscription { id, rx }
    }

    /// Currently registered subscribers (closed ones linger until the next publish).
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        match self.subscribers.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("live channel subscriber lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl MessagePublisher for LiveChannel {
    fn publish(&self, message: &Message) {
        self.lock().retain(|sub| deliver(sub, message));
    }
}

/// Hand one message to one subscriber. Returns `false` once the
/// subscriber's receiver is gone so the caller can prune it.
fn deliver(sub: &Subscriber, message: &Message) -> bool {
    if sub.tx.is_closed() {
        tracing::debug!(subscription = %sub.id, message = %message.id, "pruning closed subscriber");
        return false;
    }
    match sub.overflow {
        OverflowPolicy::Drop => match sub.tx.try_send(message.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(subscription = %sub.id, message = %message.id, "subscriber channel full, dropping");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(subscription = %sub.id, message = %message.id, "pruning closed subscriber");
                false
            }
        },
        OverflowPolicy::BackPressure => {
            let tx = sub.tx.clone();
            let msg = message.clone();
            let subscription = sub.id;
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        let message = msg.id;
                        if tx.send(msg).await.is_err() {
                            tracing::warn!(%subscription, %message, "subscriber closed during backpressure send");
                        }
                    });
                }
                // Outside a runtime there is nothing to wait on.
                Err(_) => {
                    if tx.try_send(msg).is_err() {
                        tracing::warn!(%subscription, message = %message.id, "no runtime for backpressure send, dropping");
                    }
                }
            }
            true
        }
    }
}

impl MessageSubscriber for LiveChannel {
    fn subscribe(&self, buffer: usize, overflow: OverflowPolicy) -> Box<dyn MessageSubscription> {
        Box::new(self.open(buffer, overflow))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock();
        match subs.iter().position(|s| s.id == id) {
            Some(pos) => {
                subs.swap_remove(pos);
                tracing::debug!(subscription = %id, "subscriber removed");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messenger_api::MessageId;

    fn message(content: &str, ts: i64) -> Message {
        Message {
            id: MessageId::generate(),
            content: content.into(),
            created_at: ts,
            sequence_number: 0,
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_subscriber() {
        let channel = LiveChannel::new();
        let mut a = channel.open(8, OverflowPolicy::Drop);
        let mut b = channel.open(8, OverflowPolicy::BackPressure);

        let msg = message("hi", 1);
        channel.publish(&msg);

        assert_eq!(a.recv().await, Some(msg.clone()));
        assert_eq!(b.recv().await, Some(msg));
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_history() {
        let channel = LiveChannel::new();
        channel.publish(&message("early", 1));

        let mut late = channel.open(8, OverflowPolicy::Drop);
        let msg = message("later", 2);
        channel.publish(&msg);

        assert_eq!(late.recv().await, Some(msg));
    }

    #[tokio::test]
    async fn full_drop_subscriber_loses_messages_without_blocking() {
        let channel = LiveChannel::new();
        let mut sub = channel.open(1, OverflowPolicy::Drop);

        let first = message("one", 1);
        channel.publish(&first);
        channel.publish(&message("two", 2));

        assert_eq!(sub.recv().await, Some(first));
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_ends_the_stream() {
        let channel = LiveChannel::new();
        let mut sub = channel.subscribe(4, OverflowPolicy::Drop);
        assert_eq!(channel.subscriber_count(), 1);

        assert!(channel.unsubscribe(sub.id()));
        assert!(!channel.unsubscribe(sub.id()));
        assert_eq!(channel.subscriber_count(), 0);

        channel.publish(&message("gone", 1));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned_on_publish() {
        let channel = LiveChannel::new();
        let keep = channel.open(4, OverflowPolicy::Drop);
        drop(channel.open(4, OverflowPolicy::Drop));
        drop(channel.open(4, OverflowPolicy::BackPressure));
        assert_eq!(channel.subscriber_count(), 3);

        channel.publish(&message("x", 1));
        assert_eq!(channel.subscriber_count(), 1);
        drop(keep);
    }

    #[tokio::test]
    async fn full_subscriber_stays_registered_and_keeps_order() {
        let channel = LiveChannel::new();
        let mut first = channel.open(1, OverflowPolicy::Drop);
        let mut second = channel.open(4, OverflowPolicy::Drop);

        let a = message("a", 1);
        let b = message("b", 2);
        channel.publish(&a);
        channel.publish(&b);
        assert_eq!(channel.subscriber_count(), 2);

        assert_eq!(first.recv().await, Some(a.clone()));
        assert_eq!(second.recv().await, Some(a));
        assert_eq!(second.recv().await, Some(b));
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        LiveChannel::new().publish(&message("nobody", 1));
    }
}
