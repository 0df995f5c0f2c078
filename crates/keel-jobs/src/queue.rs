use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::JobError;

/// Identifier assigned to every enqueued job
pub type TaskId = Uuid;

/// Delivery options for a single job
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    /// Retries after the first failed attempt
    pub max_retry: u32,
    pub queue: String,
    /// Limit for each attempt
    pub timeout: Duration,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            max_retry: 3,
            queue: "default".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl EnqueueOptions {
    #[must_use]
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    #[must_use]
    pub const fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A job travelling through a queue
#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub id: TaskId,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub options: EnqueueOptions,
    /// Attempts already made
    pub attempts: u32,
}

/// Producer side of the job queues
///
/// Enqueueing never waits: it either hands the job to a queue or fails.
#[derive(Clone)]
pub struct JobQueue {
    senders: Arc<IndexMap<String, mpsc::Sender<Job>>>,
}

impl JobQueue {
    pub(crate) fn new(senders: IndexMap<String, mpsc::Sender<Job>>) -> Self {
        Self {
            senders: Arc::new(senders),
        }
    }

    /// Queue `payload` for the handler registered under `task_type`
    ///
    /// # Errors
    ///
    /// Fails when the payload does not serialize, the queue is unknown or full
    pub fn enqueue(&self, task_type: &str, payload: impl Serialize, options: EnqueueOptions) -> Result<TaskId, JobError> {
        let payload = serde_json::to_value(payload)?;

        let job = Job {
            id: Uuid::new_v4(),
            task_type: task_type.to_string(),
            payload,
            options,
            attempts: 0,
        };
        let id = job.id;

        self.send(job)?;
        tracing::debug!(task_id = %id, task_type, "job enqueued");

        Ok(id)
    }

    pub(crate) fn send(&self, job: Job) -> Result<(), JobError> {
        let sender = self
            .senders
            .get(&job.options.queue)
            .ok_or_else(|| JobError::UnknownQueue(job.options.queue.clone()))?;

        sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => JobError::QueueFull(job.options.queue),
            mpsc::error::TrySendError::Closed(job) => JobError::Closed(job.options.queue),
        })
    }

    /// Configured queue names in priority order
    pub fn queues(&self) -> impl Iterator<Item = &str> {
        self.senders.keys().map(String::as_str)
    }
}
