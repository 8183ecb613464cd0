use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use stoker_core::job::{JobContext, JobFuture};
use stoker_core::{
    Broker, DeadLetterPolicy, Invocation, ReservedJob, Result, StokerConfig, StokerError,
};

use tokio::time::timeout;

use super::registry::JobRegistry;

/// Runs reserved jobs and settles each one with exactly one broker action.
pub struct JobExecutor {
    config: Arc<StokerConfig>,
    registry: Arc<JobRegistry>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: Arc<StokerConfig>, registry: Arc<JobRegistry>) -> Self {
        Self { config, registry }
    }

    /// Execute a reserved job.
    ///
    /// Job failures are settled on the broker and reported through the
    /// returned result. An `Err` means the broker action itself failed.
    pub async fn execute(&self, broker: &dyn Broker, job: ReservedJob) -> Result<ExecutionResult> {
        let payload = match self.config.codec.parse(&job.body) {
            Ok(payload) => payload,
            Err(e) => return self.dead_letter(broker, &job, e, None).await,
        };

        let Some(entry) = self.registry.get(&payload.class) else {
            let err = StokerError::UnknownJobClass(payload.class.clone());
            return self.dead_letter(broker, &job, err, None).await;
        };

        let ctx = JobContext::new(
            job.id.0,
            payload.class.clone(),
            job.tube.clone(),
            job.priority,
            job.ttr,
            job.reserves,
        );

        tracing::debug!(
            job_id = %job.id,
            job_class = %ctx.class,
            tube = %job.tube,
            reserves = job.reserves,
            "Processing job"
        );

        let outcome = match payload.invocation() {
            Ok(Invocation::Perform(args)) => {
                run_bounded(job.ttr, (entry.perform)(&ctx, args.to_vec())).await
            }
            Ok(Invocation::Method { name, args }) => {
                run_bounded(job.ttr, (entry.call)(&ctx, name, args.to_vec())).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                broker.delete(job.id).await?;
                tracing::info!(
                    job_id = %job.id,
                    job_class = %ctx.class,
                    "Job completed"
                );
                Ok(ExecutionResult::Completed)
            }
            Err(e) if e.is_unrecoverable_payload() => {
                self.dead_letter(broker, &job, e, Some(&ctx)).await
            }
            Err(e) => self.fail(broker, &job, e, &ctx).await,
        }
    }

    /// Application failure: release for another attempt or bury once retries run out.
    async fn fail(
        &self,
        broker: &dyn Broker,
        job: &ReservedJob,
        error: StokerError,
        ctx: &JobContext,
    ) -> Result<ExecutionResult> {
        self.report(&error, Some(ctx));
        let message = error.to_string();

        if job.reserves <= self.config.max_job_retries {
            let delay = self.config.retry_delay_for(ctx.retries());
            broker.release(job.id, job.priority, delay).await?;
            tracing::warn!(
                job_id = %job.id,
                job_class = %ctx.class,
                error = %message,
                delay,
                "Job failed, will retry"
            );
            Ok(ExecutionResult::Released {
                error: message,
                delay,
            })
        } else {
            broker.bury(job.id, job.priority).await?;
            tracing::warn!(
                job_id = %job.id,
                job_class = %ctx.class,
                error = %message,
                reserves = job.reserves,
                "Job failed permanently, buried"
            );
            Ok(ExecutionResult::Buried { error: message })
        }
    }

    /// A job that can never run as stored: apply the dead letter policy.
    async fn dead_letter(
        &self,
        broker: &dyn Broker,
        job: &ReservedJob,
        error: StokerError,
        ctx: Option<&JobContext>,
    ) -> Result<ExecutionResult> {
        self.report(&error, ctx);
        let message = error.to_string();

        tracing::error!(
            job_id = %job.id,
            tube = %job.tube,
            error = %message,
            policy = ?self.config.dead_letter,
            "Job cannot be dispatched"
        );

        match self.config.dead_letter {
            DeadLetterPolicy::Bury => {
                broker.bury(job.id, job.priority).await?;
                Ok(ExecutionResult::Buried { error: message })
            }
            DeadLetterPolicy::Delete => {
                broker.delete(job.id).await?;
                Ok(ExecutionResult::Discarded { error: message })
            }
        }
    }

    fn report(&self, error: &StokerError, ctx: Option<&JobContext>) {
        if let Some(hook) = &self.config.on_error {
            hook.call(error, ctx);
        }
    }
}

/// Run job code, giving up one second before the reservation expires.
///
/// A panic is turned into a job failure so the worker survives it.
async fn run_bounded(ttr: u32, job: JobFuture<'_>) -> Result<()> {
    let limit = u64::from(ttr.saturating_sub(1).max(1));

    match timeout(Duration::from_secs(limit), AssertUnwindSafe(job).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(StokerError::job(format!(
            "job panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(StokerError::Timeout(limit)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Result of job execution, named after the broker action taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Job succeeded and was deleted.
    Completed,
    /// Job failed and was released for another attempt.
    Released { error: String, delay: u32 },
    /// Job failed for good and was buried.
    Buried { error: String },
    /// Job could not be dispatched and was deleted.
    Discarded { error: String },
}

impl ExecutionResult {
    /// Check if execution was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if the job will run again.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Released { .. })
    }

    /// Error reported by the failed attempt, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed => None,
            Self::Released { error, .. } | Self::Buried { error } | Self::Discarded { error } => {
                Some(error)
            }
        }
    }
}
