//! Stoker - background jobs on a beanstalkd-style work queue.
//!
//! Producers enqueue jobs by class name with positional arguments; workers
//! watch a set of tubes, reserve jobs one at a time and dispatch them to the
//! registered job class.

mod logging;
mod runtime;

// Re-export stoker_core for macro-generated code
#[doc(hidden)]
pub use stoker_core;

pub use stoker_macros::job;

pub use stoker_core::{
    Broker, DeadLetterPolicy, EnqueueOptions, ErrorHook, JobCodec, JobContext, JobFuture, JobId,
    JobInfo, JobPayload, LoggingConfig, Priority, QueueName, Result, StokerConfig, StokerError,
    StokerJob, TubeInput, TubeSet,
};
pub use stoker_runtime::{
    AsyncProxy, ExecutionResult, JobDispatcher, JobRegistry, MemoryBroker, Worker, WorkerPool,
};

// These macros use #[macro_export] which places them at stoker_core crate root.
#[cfg(feature = "testing")]
pub use stoker_core::{
    assert_err, assert_err_variant, assert_job_enqueued, assert_job_not_enqueued, assert_ok,
    testing,
};

pub use logging::init_tracing;
pub use runtime::prelude;
pub use runtime::{Stoker, StokerBuilder};
