pub mod channel;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod policy;

pub use channel::{LiveChannel, LiveSubscription};
pub use clock::AcceptanceClock;
pub use config::EngineConfig;
pub use coordinator::Coordinator;
pub use error::EngineError;
pub use policy::ValidationPolicy;
