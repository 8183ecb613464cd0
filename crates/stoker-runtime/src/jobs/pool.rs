use std::sync::Arc;

use futures::future::join_all;
use stoker_core::{Broker, Result, StokerConfig, StokerError, TubeInput};
use tokio::sync::watch;

use super::registry::JobRegistry;
use super::worker::Worker;

/// A set of workers sharing one broker and one tube set.
///
/// Each worker runs on its own task and processes one job at a time, so the
/// pool size is the number of jobs in flight.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
}

impl WorkerPool {
    /// Create `size` workers watching `tubes`.
    pub fn new(
        config: Arc<StokerConfig>,
        registry: Arc<JobRegistry>,
        tubes: impl Into<TubeInput>,
        size: usize,
    ) -> Result<Self> {
        if size == 0 {
            return Err(StokerError::InvalidArgument(
                "worker pool size must be at least 1".into(),
            ));
        }

        let tubes = tubes.into();
        let workers = (0..size)
            .map(|_| Worker::new(config.clone(), registry.clone(), tubes.clone()).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { workers })
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// The pool's workers.
    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Run every worker until shutdown.
    ///
    /// Returns the first worker error, after all workers have stopped.
    pub async fn run(&self, broker: Arc<dyn Broker>, shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(workers = self.workers.len(), "Worker pool starting");

        let handles = self.workers.iter().map(|worker| {
            let worker = worker.clone();
            let broker = broker.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker.run(broker.as_ref(), shutdown).await })
        });

        let mut first_error = None;
        for joined in join_all(handles).await {
            let result = joined.map_err(|e| StokerError::job(format!("worker task failed: {}", e)));
            if let Err(e) = result.and_then(|r| r) {
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("Worker pool stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
