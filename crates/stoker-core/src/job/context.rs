/// Context available to job entry points.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Broker-assigned job ID.
    pub job_id: u64,
    /// Job class name from the payload.
    pub class: String,
    /// Tube the job was reserved from.
    pub tube: String,
    /// Priority the job was stored with.
    pub priority: u32,
    /// Time-to-run in seconds.
    pub ttr: u32,
    /// How many times the job has been reserved, this reservation included.
    pub reserves: u32,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(
        job_id: u64,
        class: impl Into<String>,
        tube: impl Into<String>,
        priority: u32,
        ttr: u32,
        reserves: u32,
    ) -> Self {
        Self {
            job_id,
            class: class.into(),
            tube: tube.into(),
            priority,
            ttr,
            reserves,
        }
    }

    /// Check if this is a retry attempt.
    pub fn is_retry(&self) -> bool {
        self.reserves > 1
    }

    /// Number of earlier reservations that did not finish the job.
    pub fn retries(&self) -> u32 {
        self.reserves.saturating_sub(1)
    }
}
