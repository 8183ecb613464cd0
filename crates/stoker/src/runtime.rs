//! Stoker runtime facade.
//!
//! Wires one configuration, one job registry and one broker together and hands
//! out dispatchers and workers that share them.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use stoker_core::config::StokerConfig;
use stoker_core::error::{Result, StokerError};
use stoker_core::job::StokerJob;
use stoker_core::{Broker, TubeInput};
use stoker_runtime::jobs::{JobDispatcher, JobRegistry, Worker, WorkerPool};

/// Prelude module for common imports.
pub mod prelude {
    pub use uuid::Uuid;

    // Core types
    pub use stoker_core::codec::{JobCodec, JobPayload};
    pub use stoker_core::config::{DeadLetterPolicy, ErrorHook, StokerConfig};
    pub use stoker_core::error::{Result, StokerError};
    pub use stoker_core::job::{
        EnqueueOptions, JobContext, JobFuture, JobInfo, Priority, QueueName, StokerJob,
    };
    pub use stoker_core::{Broker, JobId, TubeInput};

    // Runtime types
    pub use stoker_runtime::{AsyncProxy, JobDispatcher, MemoryBroker, Worker, WorkerPool};

    pub use crate::{Stoker, StokerBuilder};
}

/// The main Stoker runtime.
pub struct Stoker {
    config: Arc<StokerConfig>,
    job_registry: Arc<JobRegistry>,
    broker: Arc<dyn Broker>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Stoker {
    /// Create a new builder.
    pub fn builder() -> StokerBuilder {
        StokerBuilder::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &StokerConfig {
        &self.config
    }

    /// Get the job registry.
    pub fn job_registry(&self) -> &JobRegistry {
        &self.job_registry
    }

    /// Get the broker.
    pub fn broker(&self) -> Arc<dyn Broker> {
        self.broker.clone()
    }

    /// A dispatcher for enqueueing jobs.
    pub fn dispatcher(&self) -> JobDispatcher {
        JobDispatcher::new(
            self.config.clone(),
            self.broker.clone(),
            self.job_registry.clone(),
        )
    }

    /// A worker watching `tubes`, or the configured default queues.
    pub fn worker(&self, tubes: impl Into<TubeInput>) -> Result<Worker> {
        Worker::new(self.config.clone(), self.job_registry.clone(), tubes)
    }

    /// `size` workers watching `tubes`.
    pub fn worker_pool(&self, tubes: impl Into<TubeInput>, size: usize) -> Result<WorkerPool> {
        WorkerPool::new(self.config.clone(), self.job_registry.clone(), tubes, size)
    }

    /// Receiver that turns true once shutdown is requested.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Request shutdown of every worker started through this runtime.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Run `size` workers until shutdown is requested.
    pub async fn run_workers(&self, tubes: impl Into<TubeInput>, size: usize) -> Result<()> {
        let pool = self.worker_pool(tubes, size)?;
        pool.run(self.broker.clone(), self.shutdown_signal()).await
    }

    /// Run a single worker until Ctrl+C.
    ///
    /// The job in flight when the signal arrives is finished first.
    pub async fn run_worker_until_ctrl_c(&self, tubes: impl Into<TubeInput>) -> anyhow::Result<()> {
        let worker = self.worker(tubes).context("failed to start worker")?;

        tracing::info!(
            worker_id = %worker.id(),
            tubes = %worker.tubes(),
            codec = self.config.codec.name(),
            "Stoker worker starting"
        );

        let shutdown_tx = self.shutdown_tx.clone();
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal");
                shutdown_tx.send_replace(true);
            }
        });

        let result = worker
            .run(self.broker.as_ref(), self.shutdown_signal())
            .await;
        signal.abort();

        result.context("worker stopped with an error")?;
        tracing::info!("Stoker worker stopped");
        Ok(())
    }
}

/// Builder for configuring the Stoker runtime.
pub struct StokerBuilder {
    config: Option<StokerConfig>,
    job_registry: JobRegistry,
    broker: Option<Arc<dyn Broker>>,
}

impl StokerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            job_registry: JobRegistry::new(),
            broker: None,
        }
    }

    /// Set the configuration. Defaults to `StokerConfig::default()`.
    pub fn config(mut self, config: StokerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the broker.
    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Register a job class.
    pub fn register<J: StokerJob>(mut self) -> Self {
        self.job_registry.register::<J>();
        self
    }

    /// Get mutable access to the job registry.
    pub fn job_registry_mut(&mut self) -> &mut JobRegistry {
        &mut self.job_registry
    }

    /// Build the Stoker runtime.
    pub fn build(self) -> Result<Stoker> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let broker = self
            .broker
            .ok_or_else(|| StokerError::Config("Broker is required".to_string()))?;

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Stoker {
            config: Arc::new(config),
            job_registry: Arc::new(self.job_registry),
            broker,
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }
}

impl Default for StokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
