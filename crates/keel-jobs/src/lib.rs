//! Background job queue
//!
//! Handlers enqueue work without waiting for it; workers running outside the
//! request path execute each job with a per-attempt timeout and bounded
//! retries.

mod queue;
mod registry;
mod worker;

use indexmap::IndexMap;
use keel_config::JobsConfig;
use tokio::sync::mpsc;

pub use queue::{EnqueueOptions, JobQueue, TaskId};
pub use registry::{TaskHandler, TaskRegistry};
pub use worker::{JobWorkers, RetryPolicy, WorkerHandle};

/// Job queue errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("unknown job queue '{0}'")]
    UnknownQueue(String),

    #[error("job queue '{0}' is full")]
    QueueFull(String),

    #[error("job queue '{0}' is no longer accepting jobs")]
    Closed(String),

    #[error("job payload could not be serialized: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Create the producer and worker halves for the configured queues
pub fn channel(config: &JobsConfig, registry: TaskRegistry) -> (JobQueue, JobWorkers) {
    let mut senders = IndexMap::with_capacity(config.queues.len());
    let mut receivers = IndexMap::with_capacity(config.queues.len());

    for (name, weight) in &config.queues {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        senders.insert(name.clone(), tx);
        receivers.insert(name.clone(), (*weight, rx));
    }

    let queue = JobQueue::new(senders);
    let workers = JobWorkers::new(queue.clone(), receivers, registry);

    (queue, workers)
}
