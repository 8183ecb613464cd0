//! A broker double that records every call.
//!
//! Puts are kept in order and can be reserved back, so enqueue and work can be
//! tested end to end without timing concerns: `reserve` never blocks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::broker::{Broker, JobId, ReservedJob};
use crate::codec::{JobCodec, JobPayload};
use crate::error::{Result, StokerError};

/// Record of a put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutJob {
    pub id: JobId,
    pub tube: String,
    pub body: Vec<u8>,
    pub priority: u32,
    pub delay: u32,
    pub ttr: u32,
}

impl PutJob {
    /// Decode the body with a codec.
    pub fn payload(&self, codec: &JobCodec) -> Result<JobPayload> {
        codec.parse(&self.body)
    }
}

/// What a worker did with a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerAction {
    Deleted(JobId),
    Released { id: JobId, priority: u32, delay: u32 },
    Buried { id: JobId, priority: u32 },
}

/// Broker double for dispatcher and worker tests.
///
/// # Example
///
/// ```ignore
/// let broker = RecordingBroker::new();
/// dispatcher.enqueue::<TestJob>((3, 4), EnqueueOptions::new()).await?;
///
/// assert_job_enqueued!(broker, "stoker-jobs", |put| put.priority == 100);
/// ```
pub struct RecordingBroker {
    connected: AtomicBool,
    next_id: AtomicU64,
    puts: RwLock<Vec<PutJob>>,
    ready: RwLock<Vec<PutJob>>,
    reserves: RwLock<Vec<(JobId, u32)>>,
    actions: RwLock<Vec<BrokerAction>>,
}

impl RecordingBroker {
    /// Create a connected broker.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            puts: RwLock::new(Vec::new()),
            ready: RwLock::new(Vec::new()),
            reserves: RwLock::new(Vec::new()),
            actions: RwLock::new(Vec::new()),
        }
    }

    /// Create a broker that fails every call with `ConnectionNotEstablished`.
    pub fn disconnected() -> Self {
        let broker = Self::new();
        broker.set_connected(false);
        broker
    }

    /// Simulate the connection going away or coming back.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Queue a raw body for reservation without recording it as a put.
    pub fn push_raw(&self, tube: &str, body: Vec<u8>) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.ready.write().unwrap().push(PutJob {
            id,
            tube: tube.to_string(),
            body,
            priority: 0,
            delay: 0,
            ttr: 60,
        });
        id
    }

    /// Get all recorded puts.
    pub fn puts(&self) -> Vec<PutJob> {
        self.puts.read().unwrap().clone()
    }

    /// Get puts on a specific tube.
    pub fn puts_on(&self, tube: &str) -> Vec<PutJob> {
        self.puts
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.tube == tube)
            .cloned()
            .collect()
    }

    /// Get all delete/release/bury calls, in order.
    pub fn actions(&self) -> Vec<BrokerAction> {
        self.actions.read().unwrap().clone()
    }

    /// Jobs still waiting to be reserved.
    pub fn ready_count(&self) -> usize {
        self.ready.read().unwrap().len()
    }

    /// Assert that a job was put on a tube.
    pub fn assert_put(&self, tube: &str) {
        let puts = self.puts.read().unwrap();
        let found = puts.iter().any(|p| p.tube == tube);
        assert!(
            found,
            "Expected a job on tube '{}', but there was none. Tubes used: {:?}",
            tube,
            puts.iter().map(|p| &p.tube).collect::<Vec<_>>()
        );
    }

    /// Assert that a job matching the predicate was put on a tube.
    pub fn assert_put_with<F>(&self, tube: &str, predicate: F)
    where
        F: Fn(&PutJob) -> bool,
    {
        let puts = self.puts.read().unwrap();
        let found = puts.iter().any(|p| p.tube == tube && predicate(p));
        assert!(found, "Expected a matching job on tube '{}'", tube);
    }

    /// Assert that no job was put on a tube.
    pub fn assert_not_put(&self, tube: &str) {
        let puts = self.puts.read().unwrap();
        let found = puts.iter().any(|p| p.tube == tube);
        assert!(!found, "Expected no job on tube '{}', but found one", tube);
    }

    /// Assert that a specific number of jobs were put on a tube.
    pub fn assert_put_count(&self, tube: &str, expected: usize) {
        let count = self.puts_on(tube).len();
        assert_eq!(
            count, expected,
            "Expected {} jobs on '{}', but found {}",
            expected, tube, count
        );
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StokerError::ConnectionNotEstablished)
        }
    }

    fn record(&self, action: BrokerAction) -> Result<()> {
        self.check_connected()?;
        self.actions.write().unwrap().push(action);
        Ok(())
    }
}

impl Default for RecordingBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for RecordingBroker {
    fn put<'a>(
        &'a self,
        tube: &'a str,
        body: Vec<u8>,
        priority: u32,
        delay: u32,
        ttr: u32,
    ) -> BoxFuture<'a, Result<JobId>> {
        Box::pin(async move {
            self.check_connected()?;
            let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
            let put = PutJob {
                id,
                tube: tube.to_string(),
                body,
                priority,
                delay,
                ttr,
            };
            self.puts.write().unwrap().push(put.clone());
            self.ready.write().unwrap().push(put);
            Ok(id)
        })
    }

    fn reserve<'a>(
        &'a self,
        tubes: &'a [String],
        _timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<Option<ReservedJob>>> {
        Box::pin(async move {
            self.check_connected()?;
            let mut ready = self.ready.write().unwrap();
            let Some(pos) = ready.iter().position(|p| tubes.contains(&p.tube)) else {
                return Ok(None);
            };
            let job = ready.remove(pos);

            let mut reserves = self.reserves.write().unwrap();
            let count = match reserves.iter_mut().find(|(id, _)| *id == job.id) {
                Some((_, n)) => {
                    *n += 1;
                    *n
                }
                None => {
                    reserves.push((job.id, 1));
                    1
                }
            };

            Ok(Some(ReservedJob {
                id: job.id,
                tube: job.tube,
                body: job.body,
                priority: job.priority,
                ttr: job.ttr,
                reserves: count,
            }))
        })
    }

    fn delete(&self, id: JobId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.record(BrokerAction::Deleted(id)) })
    }

    fn release(&self, id: JobId, priority: u32, delay: u32) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record(BrokerAction::Released {
                id,
                priority,
                delay,
            })?;
            // Released jobs become reservable again straight away; delays are
            // only recorded.
            if let Some(put) = self.puts.read().unwrap().iter().find(|p| p.id == id) {
                let mut again = put.clone();
                again.priority = priority;
                self.ready.write().unwrap().push(again);
            }
            Ok(())
        })
    }

    fn bury(&self, id: JobId, priority: u32) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.record(BrokerAction::Buried { id, priority }) })
    }
}
