use newsroom_config::Config;
use newsroom_db::{Database, DbPool, connect_pool, create_database_if_not_exists};
use newsroom_mailer::SharedTransport;
use tokio::{sync::broadcast, task::JoinHandle};

mod job;
mod jobs;
mod monitor;
mod policy;
mod queue;
mod worker;

pub use job::{JobHandle, JobId, JobPayload, JobState, QueuedJob};
pub use monitor::Monitor;
pub use policy::{Backoff, RetryPolicy};
pub use queue::JobQueue;
pub use worker::{BatchReport, EVENT_CAPACITY, JobEvent, Worker};

pub struct WorkerInitializer {
    /// Producer handle for the email queue.
    pub email_queue: JobQueue,
    /// Every worker started here publishes its job events on this channel.
    pub events: broadcast::Sender<JobEvent>,
    /// Set when the worker loops run in this process (`worker.embedded`).
    pub monitor_task: Option<JoinHandle<()>>,
}

impl WorkerInitializer {
    pub async fn init(config: &Config, transport: SharedTransport) -> Result<Self, Error> {
        create_database_if_not_exists(Database::Jobs, config).await?;

        let pool = connect_pool(Database::Jobs, config).await?;

        Self::init_with_pool(pool, config, transport).await
    }

    pub async fn init_with_pool(
        pool: DbPool,
        config: &Config,
        transport: SharedTransport,
    ) -> Result<Self, Error> {
        JobQueue::setup(&pool).await?;

        let email_queue = JobQueue::from_config(pool, &config.worker);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let monitor_task = config.worker.embedded.then(|| {
            let monitor = Monitor::new(
                email_queue.clone(),
                transport,
                events.clone(),
                &config.worker,
            );
            tokio::task::spawn(monitor.run())
        });

        Ok(Self {
            email_queue,
            events,
            monitor_task,
        })
    }
}

/// Errors that can occur while running the job queue.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error occured while interacting with worker storage.
    ///
    /// Return `500 Internal Server Error` on a worker storage error.
    #[error("error interacting with worker storage")]
    WorkerStorage(#[from] sqlx::Error),
    /// An error occured while interacting with the database.
    ///
    /// Return `500 Internal Server Error` on a database error.
    #[error("error setting up database for worker")]
    DbSetup(#[from] newsroom_db::Error),
    /// The job was reaped or re-leased before the worker could settle it.
    #[error("lease on job {0} was lost")]
    LeaseLost(JobId),
}

/// A job could not be persisted. Nothing was queued.
#[derive(thiserror::Error, Debug)]
pub enum EnqueueError {
    #[error("could not encode job payload")]
    Encode(#[from] serde_json::Error),
    /// An entry of the batch would never be deliverable.
    #[error("invalid email in batch")]
    InvalidEmail(#[from] newsroom_mailer::ValidationErrors),
    #[error("job store unreachable")]
    Store(#[from] sqlx::Error),
}

/// A leased job could not run to the end of its batch.
#[derive(thiserror::Error, Debug)]
pub enum JobExecutionError {
    #[error("malformed job payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("job crashed: {0}")]
    Crashed(String),
    /// Another worker took the job over. The batch was stopped.
    #[error("lease on job {0} was lost")]
    LeaseLost(JobId),
}
