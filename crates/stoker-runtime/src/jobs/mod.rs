mod dispatcher;
mod executor;
mod pool;
mod registry;
mod worker;

pub use dispatcher::{AsyncProxy, JobDispatcher};
pub use executor::{ExecutionResult, JobExecutor};
pub use pool::WorkerPool;
pub use registry::{decode_args, BoxedCallHandler, BoxedPerformHandler, JobEntry, JobRegistry};
pub use worker::Worker;
