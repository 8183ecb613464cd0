//! Testing utilities for Stoker applications.
//!
//! [`RecordingBroker`] stands in for a live broker: it records every put and
//! worker action and hands puts back out on reserve, so a dispatcher and a
//! worker can be exercised together in a plain unit test.
//!
//! # Example
//!
//! ```ignore
//! use stoker::prelude::*;
//! use stoker::testing::RecordingBroker;
//!
//! #[tokio::test]
//! async fn test_enqueue_lands_on_class_queue() {
//!     let broker = Arc::new(RecordingBroker::new());
//!     let mut registry = JobRegistry::new();
//!     registry.register::<TestPlainJob>();
//!     let dispatcher = JobDispatcher::new(
//!         Arc::new(StokerConfig::default()),
//!         broker.clone(),
//!         Arc::new(registry),
//!     );
//!
//!     dispatcher.enqueue::<TestPlainJob>((), EnqueueOptions::new()).await.unwrap();
//!     assert_job_enqueued!(broker, "test-plain");
//! }
//! ```

pub mod assertions;
pub mod recording_broker;

pub use recording_broker::{BrokerAction, PutJob, RecordingBroker};
