pub mod broker;
pub mod codec;
pub mod config;
pub mod error;
pub mod job;
pub mod resolve;
pub mod tubes;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use broker::{Broker, JobId, ReservedJob};
pub use codec::{Invocation, JobCodec, JobPayload};
pub use config::{DeadLetterPolicy, ErrorHook, LoggingConfig, StokerConfig};
pub use error::{Result, StokerError};
pub use job::{EnqueueOptions, JobContext, JobFuture, JobInfo, Priority, QueueName, StokerJob};
pub use resolve::{resolve, JobDescriptor};
pub use tubes::{resolve_tubes, TubeInput, TubeSet};
