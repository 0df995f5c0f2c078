use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    JobQueue, TaskRegistry,
    queue::Job,
};

/// Delay between failed attempts: `base * 2^attempt`, capped at `max`
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows `attempt` failed attempts
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Consumer side of the job queues
pub struct JobWorkers {
    queue: JobQueue,
    receivers: IndexMap<String, (u32, mpsc::Receiver<Job>)>,
    registry: Arc<TaskRegistry>,
    retry: RetryPolicy,
}

/// Running workers; await [`WorkerHandle::join`] to drain them
pub struct WorkerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Wait until every worker has finished its current job and exited
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "job worker terminated abnormally");
            }
        }
    }
}

#[derive(Clone)]
struct WorkerContext {
    queue: JobQueue,
    registry: Arc<TaskRegistry>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
}

impl JobWorkers {
    pub(crate) fn new(
        queue: JobQueue,
        receivers: IndexMap<String, (u32, mpsc::Receiver<Job>)>,
        registry: TaskRegistry,
    ) -> Self {
        Self {
            queue,
            receivers,
            registry: Arc::new(registry),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Spawn `weight` workers per queue
    ///
    /// Workers stop taking new jobs once `shutdown` is cancelled; a job that
    /// is already running is allowed to finish.
    pub fn start(self, shutdown: CancellationToken) -> WorkerHandle {
        let context = WorkerContext {
            queue: self.queue,
            registry: self.registry,
            retry: self.retry,
            shutdown,
        };

        let mut tasks = Vec::new();

        for (queue_name, (weight, receiver)) in self.receivers {
            let receiver = Arc::new(Mutex::new(receiver));

            for worker in 0..weight {
                tasks.push(tokio::spawn(run_worker(
                    context.clone(),
                    queue_name.clone(),
                    worker,
                    Arc::clone(&receiver),
                )));
            }

            tracing::info!(queue = %queue_name, workers = weight, "job workers started");
        }

        WorkerHandle { tasks }
    }
}

async fn run_worker(context: WorkerContext, queue: String, worker: u32, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let next = tokio::select! {
            biased;
            () = context.shutdown.cancelled() => None,
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = next else {
            break;
        };

        process(&context, job).await;
    }

    tracing::debug!(queue, worker, "job worker stopped");
}

async fn process(context: &WorkerContext, mut job: Job) {
    let Some(handler) = context.registry.get(&job.task_type) else {
        tracing::warn!(task_id = %job.id, task_type = %job.task_type, "no handler registered, dropping job");
        return;
    };

    job.attempts += 1;

    let failure = match tokio::time::timeout(job.options.timeout, handler.handle(&job.payload)).await {
        Ok(Ok(())) => {
            tracing::debug!(task_id = %job.id, task_type = %job.task_type, attempts = job.attempts, "job completed");
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {:?}", job.options.timeout),
    };

    // attempts counts the first run, max_retry does not
    if job.attempts > job.options.max_retry {
        tracing::error!(
            task_id = %job.id,
            task_type = %job.task_type,
            attempts = job.attempts,
            error = %failure,
            "job failed, retries exhausted"
        );
        return;
    }

    let delay = context.retry.backoff(job.attempts);
    tracing::warn!(
        task_id = %job.id,
        task_type = %job.task_type,
        attempt = job.attempts,
        retry_in = ?delay,
        error = %failure,
        "job failed, scheduling retry"
    );

    let queue = context.queue.clone();
    let shutdown = context.shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::warn!(task_id = %job.id, task_type = %job.task_type, "shutdown before retry, dropping job");
            }
            () = tokio::time::sleep(delay) => {
                let (id, task_type) = (job.id, job.task_type.clone());
                if let Err(e) = queue.send(job) {
                    tracing::error!(task_id = %id, task_type = %task_type, error = %e, "failed to requeue job");
                }
            }
        }
    });
}
