use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::Result;

/// Broker-assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job held by a worker after a successful reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedJob {
    pub id: JobId,
    /// Broker-side tube name.
    pub tube: String,
    pub body: Vec<u8>,
    pub priority: u32,
    pub ttr: u32,
    /// Reservations so far, this one included.
    pub reserves: u32,
}

/// Trait for the queue broker a dispatcher puts to and a worker reserves from.
///
/// Connection failures surface as `ConnectionNotEstablished` or
/// `BrokerUnavailable`; implementations never retry on their own.
pub trait Broker: Send + Sync {
    /// Store a job. It becomes reservable after `delay` seconds and returns to
    /// the ready queue if a reservation holds it longer than `ttr` seconds.
    fn put<'a>(
        &'a self,
        tube: &'a str,
        body: Vec<u8>,
        priority: u32,
        delay: u32,
        ttr: u32,
    ) -> BoxFuture<'a, Result<JobId>>;

    /// Reserve the most urgent ready job across `tubes`.
    ///
    /// Blocks until one is available or `timeout` elapses, in which case it
    /// returns `None`. A `None` timeout waits indefinitely.
    fn reserve<'a>(
        &'a self,
        tubes: &'a [String],
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<Option<ReservedJob>>>;

    /// Remove a job for good.
    fn delete(&self, id: JobId) -> BoxFuture<'_, Result<()>>;

    /// Put a reserved job back into the ready queue, optionally delayed.
    fn release(&self, id: JobId, priority: u32, delay: u32) -> BoxFuture<'_, Result<()>>;

    /// Park a reserved job until it is kicked.
    fn bury(&self, id: JobId, priority: u32) -> BoxFuture<'_, Result<()>>;
}
