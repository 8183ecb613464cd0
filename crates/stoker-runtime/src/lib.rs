pub mod broker;
pub mod jobs;

pub use broker::{JobState, JobStats, MemoryBroker};
pub use jobs::{
    AsyncProxy, ExecutionResult, JobDispatcher, JobEntry, JobExecutor, JobRegistry, Worker,
    WorkerPool,
};
