use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::message::Message;

// ════════════════════════════════════════════════════════════════
//  Overflow Policy
// ════════════════════════════════════════════════════════════════

/// What to do when a subscriber's bounded buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// try_send(): drop the message for this subscriber and log it.
    Drop,
    /// Deliver from a background task once space frees up. The publisher
    /// never waits.
    #[serde(alias = "backpressure")]
    BackPressure,
}

// ════════════════════════════════════════════════════════════════
//  Subscriptions
// ════════════════════════════════════════════════════════════════

/// Handle identifying one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A live feed of messages published after the subscription was opened.
/// No history is replayed.
pub trait MessageSubscription: Send {
    fn id(&self) -> SubscriptionId;

    /// Next published message. `None` = unsubscribed or channel gone.
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Message>> + Send + '_>>;
}

/// Best-effort fan-out of accepted messages to every live subscriber.
///
/// `publish` must not wait on delivery: it is fire-and-forget and its
/// failures are never reported back.
pub trait MessagePublisher: Send + Sync {
    fn publish(&self, message: &Message);
}

/// Manages the set of live subscribers.
pub trait MessageSubscriber: Send + Sync {
    /// Open a subscription with a bounded buffer of `buffer` messages.
    fn subscribe(&self, buffer: usize, overflow: OverflowPolicy) -> Box<dyn MessageSubscription>;

    /// Close a subscription. Returns `false` if it was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
