use std::time::Duration;

pub mod decimals;
pub mod discovery;
pub mod harvest;
pub mod observer;
pub mod orchestrator;
pub mod pairs;
pub mod resolve;
pub mod volume;

pub use observer::{IndexerObserver, LogObserver};
pub use orchestrator::Orchestrator;

/// Base delay of every retry ladder; doubles per attempt.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
