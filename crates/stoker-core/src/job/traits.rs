use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{Result, StokerError};

use super::context::JobContext;

/// Boxed future returned by job entry points.
pub type JobFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait for Stoker job classes.
pub trait StokerJob: Send + Sync + 'static {
    /// Positional arguments, carried on the wire as an ordered sequence.
    ///
    /// Tuples work well here: `(i64, i64)` encodes as `[7, 9]`. The first
    /// element must not encode as null, since a leading null marks an async
    /// proxy call; dispatchers reject such arguments with `InvalidArgument`.
    type Args: DeserializeOwned + Serialize + Send + Sync + 'static;

    /// Get job metadata.
    fn info() -> JobInfo;

    /// The standard entry point, invoked for directly enqueued jobs.
    fn perform(ctx: &JobContext, args: Self::Args) -> JobFuture<'_>;

    /// Class-level method dispatch, invoked for jobs enqueued through an async proxy.
    ///
    /// Method names are not validated at enqueue time, so the default rejects
    /// everything with `UnknownJobMethod`.
    fn call<'a>(ctx: &'a JobContext, method: &'a str, args: Vec<Value>) -> JobFuture<'a> {
        let _ = (ctx, args);
        let err = StokerError::UnknownJobMethod {
            class: Self::info().name.to_string(),
            method: method.to_string(),
        };
        Box::pin(async move { Err(err) })
    }
}

/// Job metadata declared by a job class.
///
/// Every field other than `name` is optional; anything left unset falls back to
/// the process-wide configuration at enqueue time.
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Canonical class name, used on the wire.
    pub name: &'static str,
    /// Declared queue.
    pub queue: Option<QueueName>,
    /// Declared priority.
    pub priority: Option<Priority>,
    /// Declared time-to-run in seconds.
    pub ttr: Option<u32>,
}

impl JobInfo {
    /// Create job metadata with nothing but a name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            queue: None,
            priority: None,
            ttr: None,
        }
    }

    /// Declare the queue this class lands on.
    pub fn with_queue(mut self, queue: impl Into<QueueName>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Declare the class priority.
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Declare the class time-to-run.
    pub fn with_ttr(mut self, ttr: u32) -> Self {
        self.ttr = Some(ttr);
        self
    }
}

/// A queue name, either literal or computed from the job class.
#[derive(Clone)]
pub enum QueueName {
    /// Used verbatim.
    Fixed(String),
    /// Invoked with the job's metadata at resolution time.
    Computed(Arc<dyn Fn(&JobInfo) -> String + Send + Sync>),
}

impl QueueName {
    /// Build a computed queue name.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&JobInfo) -> String + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Produce the concrete queue name for a job class.
    pub fn resolve(&self, info: &JobInfo) -> String {
        match self {
            Self::Fixed(name) => name.clone(),
            Self::Computed(f) => f(info),
        }
    }
}

impl fmt::Debug for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for QueueName {
    fn from(name: &str) -> Self {
        Self::Fixed(name.to_string())
    }
}

impl From<String> for QueueName {
    fn from(name: String) -> Self {
        Self::Fixed(name)
    }
}

/// A priority, either numeric or a label from the priority table.
///
/// Lower numbers are more urgent, as on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Priority {
    Value(u32),
    Label(String),
}

impl Priority {
    /// Resolve to a numeric priority using the label table.
    pub fn resolve(&self, labels: &HashMap<String, u32>) -> Result<u32> {
        match self {
            Self::Value(pri) => Ok(*pri),
            Self::Label(label) => labels
                .get(label)
                .copied()
                .ok_or_else(|| StokerError::UnknownPriorityLabel(label.clone())),
        }
    }
}

impl From<u32> for Priority {
    fn from(value: u32) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for Priority {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

impl From<String> for Priority {
    fn from(label: String) -> Self {
        Self::Label(label)
    }
}
