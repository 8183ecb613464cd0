//! In-process broker with beanstalkd job semantics.
//!
//! Suitable for development, tests and single-process deployments. Jobs live
//! only as long as the broker value does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use stoker_core::{Broker, JobId, ReservedJob, Result, StokerError};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Externally visible state of a stored job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Ready,
    Delayed,
    Reserved,
    Buried,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Ready,
    Delayed { until: Instant },
    Reserved { deadline: Instant },
    Buried,
}

impl Slot {
    fn state(&self) -> JobState {
        match self {
            Slot::Ready => JobState::Ready,
            Slot::Delayed { .. } => JobState::Delayed,
            Slot::Reserved { .. } => JobState::Reserved,
            Slot::Buried => JobState::Buried,
        }
    }

    fn ready_or_delayed(now: Instant, delay: u32) -> Self {
        if delay == 0 {
            Slot::Ready
        } else {
            Slot::Delayed {
                until: now + Duration::from_secs(u64::from(delay)),
            }
        }
    }
}

#[derive(Debug)]
struct StoredJob {
    id: JobId,
    tube: String,
    body: Vec<u8>,
    priority: u32,
    ttr: u32,
    slot: Slot,
    created_at: DateTime<Utc>,
    reserves: u32,
    timeouts: u32,
    releases: u32,
    buries: u32,
    kicks: u32,
}

/// Counters and state of one job, as reported by `stats_job`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStats {
    pub id: JobId,
    pub tube: String,
    pub state: JobState,
    pub priority: u32,
    pub ttr: u32,
    pub created_at: DateTime<Utc>,
    pub reserves: u32,
    pub timeouts: u32,
    pub releases: u32,
    pub buries: u32,
    pub kicks: u32,
}

/// Outcome of one look at the ready jobs.
enum Attempt {
    Reserved(ReservedJob),
    /// Nothing ready; when something might be.
    Wait(Option<Instant>),
}

#[derive(Debug, Default)]
struct Inner {
    last_id: u64,
    jobs: HashMap<JobId, StoredJob>,
}

impl Inner {
    /// Move delayed jobs whose delay is over and reservations whose ttr ran
    /// out back to ready.
    fn promote(&mut self, now: Instant) {
        for job in self.jobs.values_mut() {
            match job.slot {
                Slot::Delayed { until } if until <= now => job.slot = Slot::Ready,
                Slot::Reserved { deadline } if deadline <= now => {
                    job.slot = Slot::Ready;
                    job.timeouts += 1;
                    tracing::debug!(job_id = %job.id, tube = %job.tube, "Reservation expired");
                }
                _ => {}
            }
        }
    }

    /// Earliest instant at which `promote` would change something.
    fn next_wakeup(&self) -> Option<Instant> {
        self.jobs
            .values()
            .filter_map(|job| match job.slot {
                Slot::Delayed { until } => Some(until),
                Slot::Reserved { deadline } => Some(deadline),
                _ => None,
            })
            .min()
    }

    /// Most urgent ready job across `tubes`: lowest priority, then oldest.
    fn most_urgent(&self, tubes: &[String]) -> Option<JobId> {
        self.jobs
            .values()
            .filter(|job| matches!(job.slot, Slot::Ready) && tubes.contains(&job.tube))
            .min_by_key(|job| (job.priority, job.id))
            .map(|job| job.id)
    }

    /// A job held by a live reservation. Expired reservations no longer count.
    fn reserved_mut(&mut self, id: JobId) -> Result<&mut StoredJob> {
        self.promote(Instant::now());
        match self.jobs.get_mut(&id) {
            Some(job) if matches!(job.slot, Slot::Reserved { .. }) => Ok(job),
            _ => Err(StokerError::JobNotFound(id.0)),
        }
    }

    fn jobs_in(&self, tube: &str, state: JobState) -> Vec<&StoredJob> {
        self.jobs
            .values()
            .filter(|job| job.tube == tube && job.slot.state() == state)
            .collect()
    }
}

/// In-process broker.
///
/// # Example
///
/// ```ignore
/// let broker = Arc::new(MemoryBroker::new());
/// let dispatcher = JobDispatcher::new(config.clone(), broker.clone(), registry.clone());
/// dispatcher.enqueue::<ReportJob>((2024,), EnqueueOptions::new()).await?;
///
/// let worker = Worker::new(config, registry, "reports")?;
/// worker.work_one_job(broker.as_ref()).await?;
/// ```
#[derive(Debug)]
pub struct MemoryBroker {
    inner: Mutex<Inner>,
    connected: AtomicBool,
    notify: Notify,
}

impl MemoryBroker {
    /// Create a new, connected broker.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            connected: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    /// Simulate losing the connection. Blocked reservations fail too.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Restore the connection after `disconnect`.
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Whether calls currently succeed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Move up to `bound` jobs of a tube back to ready.
    ///
    /// Buried jobs are kicked first; delayed jobs are only kicked when the tube
    /// has no buried jobs. Returns how many were kicked.
    pub fn kick(&self, tube: &str, bound: usize) -> Result<usize> {
        let mut inner = self.lock()?;
        inner.promote(Instant::now());

        let mut ids: Vec<JobId> = inner
            .jobs_in(tube, JobState::Buried)
            .into_iter()
            .map(|job| job.id)
            .collect();
        if ids.is_empty() {
            ids = inner
                .jobs_in(tube, JobState::Delayed)
                .into_iter()
                .map(|job| job.id)
                .collect();
        }
        ids.sort();
        ids.truncate(bound);

        for id in &ids {
            if let Some(job) = inner.jobs.get_mut(id) {
                job.slot = Slot::Ready;
                job.kicks += 1;
            }
        }
        drop(inner);

        if !ids.is_empty() {
            self.notify.notify_waiters();
        }
        Ok(ids.len())
    }

    /// Kick a single buried or delayed job.
    pub fn kick_job(&self, id: JobId) -> Result<()> {
        let mut inner = self.lock()?;
        match inner.jobs.get_mut(&id) {
            Some(job) if matches!(job.slot, Slot::Buried | Slot::Delayed { .. }) => {
                job.slot = Slot::Ready;
                job.kicks += 1;
            }
            _ => return Err(StokerError::JobNotFound(id.0)),
        }
        drop(inner);

        self.notify.notify_waiters();
        Ok(())
    }

    /// State and counters of one job.
    pub fn stats_job(&self, id: JobId) -> Result<JobStats> {
        let mut inner = self.lock()?;
        inner.promote(Instant::now());

        let job = inner
            .jobs
            .get(&id)
            .ok_or(StokerError::JobNotFound(id.0))?;
        Ok(JobStats {
            id: job.id,
            tube: job.tube.clone(),
            state: job.slot.state(),
            priority: job.priority,
            ttr: job.ttr,
            created_at: job.created_at,
            reserves: job.reserves,
            timeouts: job.timeouts,
            releases: job.releases,
            buries: job.buries,
            kicks: job.kicks,
        })
    }

    /// Body of a stored job, whatever its state.
    pub fn peek(&self, id: JobId) -> Result<Vec<u8>> {
        let inner = self.lock()?;
        inner
            .jobs
            .get(&id)
            .map(|job| job.body.clone())
            .ok_or(StokerError::JobNotFound(id.0))
    }

    /// Ready jobs of a tube, in reservation order.
    pub fn ready_jobs(&self, tube: &str) -> Result<Vec<JobId>> {
        let mut inner = self.lock()?;
        inner.promote(Instant::now());

        let mut jobs: Vec<(u32, JobId)> = inner
            .jobs_in(tube, JobState::Ready)
            .into_iter()
            .map(|job| (job.priority, job.id))
            .collect();
        jobs.sort();
        Ok(jobs.into_iter().map(|(_, id)| id).collect())
    }

    /// Buried jobs of a tube, oldest first.
    pub fn buried_jobs(&self, tube: &str) -> Result<Vec<JobId>> {
        let inner = self.lock()?;
        let mut ids: Vec<JobId> = inner
            .jobs_in(tube, JobState::Buried)
            .into_iter()
            .map(|job| job.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Number of stored jobs in any state.
    pub fn job_count(&self) -> Result<usize> {
        Ok(self.lock()?.jobs.len())
    }

    fn check_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StokerError::ConnectionNotEstablished)
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StokerError::BrokerUnavailable("memory broker lock poisoned".into()))
    }

    fn try_reserve(&self, tubes: &[String]) -> Result<Attempt> {
        let mut inner = self.lock()?;
        let now = Instant::now();
        inner.promote(now);

        let Some(id) = inner.most_urgent(tubes) else {
            return Ok(Attempt::Wait(inner.next_wakeup()));
        };
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(StokerError::JobNotFound(id.0))?;

        job.slot = Slot::Reserved {
            deadline: now + Duration::from_secs(u64::from(job.ttr.max(1))),
        };
        job.reserves += 1;

        Ok(Attempt::Reserved(ReservedJob {
            id: job.id,
            tube: job.tube.clone(),
            body: job.body.clone(),
            priority: job.priority,
            ttr: job.ttr,
            reserves: job.reserves,
        }))
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for MemoryBroker {
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

            let id = {
                let mut inner = self.lock()?;
                inner.last_id += 1;
                let id = JobId(inner.last_id);
                inner.jobs.insert(
                    id,
                    StoredJob {
                        id,
                        tube: tube.to_string(),
                        body,
                        priority,
                        ttr,
                        slot: Slot::ready_or_delayed(Instant::now(), delay),
                        created_at: Utc::now(),
                        reserves: 0,
                        timeouts: 0,
                        releases: 0,
                        buries: 0,
                        kicks: 0,
                    },
                );
                id
            };

            self.notify.notify_waiters();
            Ok(id)
        })
    }

    fn reserve<'a>(
        &'a self,
        tubes: &'a [String],
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<Option<ReservedJob>>> {
        Box::pin(async move {
            let give_up_at = timeout.map(|t| Instant::now() + t);

            loop {
                self.check_connected()?;
                // Registered before looking so a put in between still wakes us.
                let notified = self.notify.notified();

                let next_wakeup = match self.try_reserve(tubes)? {
                    Attempt::Reserved(job) => return Ok(Some(job)),
                    Attempt::Wait(next_wakeup) => next_wakeup,
                };

                if let Some(give_up_at) = give_up_at {
                    if Instant::now() >= give_up_at {
                        return Ok(None);
                    }
                }

                let wake_at = match (next_wakeup, give_up_at) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };

                match wake_at {
                    Some(at) => {
                        tokio::select! {
                            _ = notified => {}
                            _ = tokio::time::sleep_until(at) => {}
                        }
                    }
                    None => notified.await,
                }
            }
        })
    }

    fn delete(&self, id: JobId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.check_connected()?;
            let mut inner = self.lock()?;
            inner.reserved_mut(id)?;
            inner.jobs.remove(&id);
            Ok(())
        })
    }

    fn release(&self, id: JobId, priority: u32, delay: u32) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.check_connected()?;
            {
                let mut inner = self.lock()?;
                let job = inner.reserved_mut(id)?;
                job.priority = priority;
                job.slot = Slot::ready_or_delayed(Instant::now(), delay);
                job.releases += 1;
            }

            self.notify.notify_waiters();
            Ok(())
        })
    }

    fn bury(&self, id: JobId, priority: u32) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.check_connected()?;
            let mut inner = self.lock()?;
            let job = inner.reserved_mut(id)?;
            job.priority = priority;
            job.slot = Slot::Buried;
            job.buries += 1;
            Ok(())
        })
    }
}
