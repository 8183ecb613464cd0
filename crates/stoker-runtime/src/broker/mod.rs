//! Broker implementations.

mod memory;

pub use memory::{JobState, JobStats, MemoryBroker};
