use super::traits::{JobInfo, Priority, QueueName};

/// Per-call overrides for an enqueue.
///
/// Anything set here beats the job class declaration, which in turn beats the
/// process-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub queue: Option<QueueName>,
    pub priority: Option<Priority>,
    pub ttr: Option<u32>,
    /// Seconds before the job becomes reservable.
    pub delay: Option<u32>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the queue.
    pub fn queue(mut self, queue: impl Into<QueueName>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Override the queue with a name computed from the job class.
    pub fn queue_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&JobInfo) -> String + Send + Sync + 'static,
    {
        self.queue = Some(QueueName::computed(f));
        self
    }

    /// Override the priority, numeric or labelled.
    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Override the time-to-run.
    pub fn ttr(mut self, ttr: u32) -> Self {
        self.ttr = Some(ttr);
        self
    }

    /// Delay the job.
    pub fn delay(mut self, delay: u32) -> Self {
        self.delay = Some(delay);
        self
    }
}
