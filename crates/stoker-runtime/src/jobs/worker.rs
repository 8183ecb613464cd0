use std::sync::Arc;

use stoker_core::{
    resolve_tubes, Broker, ReservedJob, Result, StokerConfig, TubeInput, TubeSet,
};
use tokio::sync::watch;
use uuid::Uuid;

use super::executor::{ExecutionResult, JobExecutor};
use super::registry::JobRegistry;

/// Background job worker. Reserves and runs one job at a time.
pub struct Worker {
    id: Uuid,
    config: Arc<StokerConfig>,
    tubes: TubeSet,
    watched: Vec<String>,
    executor: JobExecutor,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("tubes", &self.tubes)
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Create a new worker watching `tubes`.
    ///
    /// Fails with `NoTubesConfigured` when neither `tubes` nor the configured
    /// default queues name anything to watch.
    pub fn new(
        config: Arc<StokerConfig>,
        registry: Arc<JobRegistry>,
        tubes: impl Into<TubeInput>,
    ) -> Result<Self> {
        let tubes = resolve_tubes(&config, tubes)?;
        let watched = tubes.expanded(&config);
        let executor = JobExecutor::new(config.clone(), registry);

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            tubes,
            watched,
            executor,
        })
    }

    /// Get worker ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Logical tube names this worker watches.
    pub fn tubes(&self) -> &TubeSet {
        &self.tubes
    }

    /// Broker-side tube names this worker watches.
    pub fn watched_tubes(&self) -> &[String] {
        &self.watched
    }

    /// Reserve and run a single job.
    ///
    /// Returns `Ok(None)` when the reservation timed out. Broker errors,
    /// connection loss included, are returned unretried.
    pub async fn work_one_job(&self, broker: &dyn Broker) -> Result<Option<ExecutionResult>> {
        match self.reserve(broker).await? {
            Some(job) => self.process(broker, job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Run the worker until `shutdown` turns true or its sender goes away.
    ///
    /// Shutdown is only observed while waiting for a reservation; a job that
    /// has been reserved always runs to its broker action. Only a lost broker
    /// connection ends the loop with an error.
    pub async fn run(&self, broker: &dyn Broker, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            worker_id = %self.id,
            tubes = %self.tubes,
            "Worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let reserved = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                reserved = self.reserve(broker) => reserved,
            };

            let outcome = match reserved {
                Ok(Some(job)) => self.process(broker, job).await,
                Ok(None) => continue,
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                if e.is_connection_error() {
                    tracing::error!(worker_id = %self.id, error = %e, "Worker lost broker connection");
                    return Err(e);
                }
                tracing::warn!(worker_id = %self.id, error = %e, "Broker call failed");
            }
        }

        tracing::info!(worker_id = %self.id, "Worker shutting down");
        Ok(())
    }

    async fn reserve(&self, broker: &dyn Broker) -> Result<Option<ReservedJob>> {
        let job = broker
            .reserve(&self.watched, self.config.reserve_timeout())
            .await?;

        if let Some(job) = &job {
            tracing::debug!(
                worker_id = %self.id,
                job_id = %job.id,
                tube = %job.tube,
                "Job reserved"
            );
        }
        Ok(job)
    }

    async fn process(&self, broker: &dyn Broker, job: ReservedJob) -> Result<ExecutionResult> {
        self.executor.execute(broker, job).await
    }
}
