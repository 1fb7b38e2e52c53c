pub mod error;
pub mod live;
pub mod message;
pub mod store;
pub mod util;

pub use error::{Field, StoreError, SubmitError, ValidationError};
pub use live::{
    MessagePublisher, MessageSubscriber, MessageSubscription, OverflowPolicy, SubscriptionId,
};
pub use message::{Message, MessageCandidate, MessageId};
pub use store::{MessageStore, StoreFactory};
pub use util::{date_from_ms, now_ms, window_start_ms};
