mod context;
mod options;
mod traits;

pub use context::JobContext;
pub use options::EnqueueOptions;
pub use traits::{JobFuture, JobInfo, Priority, QueueName, StokerJob};
