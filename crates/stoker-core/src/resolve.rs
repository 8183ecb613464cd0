//! Job descriptor resolution.
//!
//! Every field is an independent short-circuit chain: per-call option, then the
//! job class declaration, then the process-wide default. The first source that
//! is present wins outright; nothing is merged across sources.

use crate::config::StokerConfig;
use crate::error::Result;
use crate::job::{EnqueueOptions, JobInfo};

/// Effective placement of one enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Logical queue name, before namespace expansion.
    pub queue: String,
    pub priority: u32,
    pub ttr: u32,
    pub delay: u32,
}

/// Resolve where and how a job is enqueued.
pub fn resolve(
    config: &StokerConfig,
    info: &JobInfo,
    options: &EnqueueOptions,
) -> Result<JobDescriptor> {
    Ok(JobDescriptor {
        queue: resolve_queue(config, info, options),
        priority: resolve_priority(config, info, options)?,
        ttr: resolve_ttr(config, info, options),
        delay: resolve_delay(options),
    })
}

pub fn resolve_queue(config: &StokerConfig, info: &JobInfo, options: &EnqueueOptions) -> String {
    options
        .queue
        .as_ref()
        .or(info.queue.as_ref())
        .map(|queue| queue.resolve(info))
        .unwrap_or_else(|| config.primary_queue.clone())
}

pub fn resolve_priority(
    config: &StokerConfig,
    info: &JobInfo,
    options: &EnqueueOptions,
) -> Result<u32> {
    match options.priority.as_ref().or(info.priority.as_ref()) {
        Some(priority) => config.priority_value(priority),
        None => Ok(config.default_priority),
    }
}

pub fn resolve_ttr(config: &StokerConfig, info: &JobInfo, options: &EnqueueOptions) -> u32 {
    options
        .ttr
        .or(info.ttr)
        .unwrap_or(config.default_respond_timeout)
}

pub fn resolve_delay(options: &EnqueueOptions) -> u32 {
    options.delay.unwrap_or(0)
}
