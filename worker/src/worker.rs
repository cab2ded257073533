use std::time::Duration;

use newsroom_mailer::SharedTransport;
use serde::Serialize;
use tokio::{
    sync::broadcast,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::task::AbortOnDropHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    Error, JobExecutionError,
    job::{JobId, JobPayload, JobState, QueuedJob},
    jobs,
    queue::JobQueue,
};

/// Capacity of the event channel. Slow subscribers skip events past this.
pub const EVENT_CAPACITY: usize = 256;

const MIN_LEASE_RENEWAL: Duration = Duration::from_millis(5);

/// Outcome of delivering one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub delivered: u32,
    pub failed: u32,
}

/// Emitted once per finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// The batch ran to the end. `failed` counts entries the transport rejected.
    Completed {
        job_id: JobId,
        delivered: u32,
        failed: u32,
    },
    /// The attempt did not finish. `retrying` is false once the job is terminally failed.
    Failed {
        job_id: JobId,
        attempts: i64,
        error: String,
        retrying: bool,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Completed { job_id, .. } | JobEvent::Failed { job_id, .. } => *job_id,
        }
    }
}

/// Leases jobs from one queue and delivers them through a mail transport.
pub struct Worker {
    id: String,
    queue: JobQueue,
    transport: SharedTransport,
    events: broadcast::Sender<JobEvent>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(queue: JobQueue, transport: SharedTransport) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            id: format!("email-worker-{}", Uuid::new_v4()),
            queue,
            transport,
            events,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Publishes events on a shared channel instead of a private one.
    pub fn with_events(mut self, events: broadcast::Sender<JobEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Reaps expired leases, then leases and runs at most one job.
    ///
    /// Returns the event of the job it ran, or `None` when nothing was runnable.
    pub async fn run_once(&self) -> Result<Option<JobEvent>, Error> {
        for reaped in self.queue.reap_expired_leases().await? {
            self.emit(JobEvent::Failed {
                job_id: reaped.id,
                attempts: reaped.attempts,
                error: reaped.last_error.unwrap_or_default(),
                retrying: reaped.state == JobState::Waiting,
            });
        }

        let Some(job) = self.queue.lease(&self.id).await? else {
            return Ok(None);
        };

        let span = tracing::info_span!(
            "job",
            job_id = %job.id,
            queue = %job.queue,
            worker_id = %self.id,
            attempt = job.attempts,
        );

        let event = async {
            tracing::info!("processing job");

            match self.execute(&job).await {
                Err(JobExecutionError::LeaseLost(id)) => {
                    tracing::warn!("lease lost, batch abandoned");
                    Err(Error::LeaseLost(id))
                }
                Ok(report) => {
                    self.queue.complete(&job, &report).await?;
                    Ok::<_, Error>(JobEvent::Completed {
                        job_id: job.id,
                        delivered: report.delivered,
                        failed: report.failed,
                    })
                }
                Err(e) => {
                    let error = e.to_string();
                    let state = self.queue.fail(&job, &error).await?;
                    Ok(JobEvent::Failed {
                        job_id: job.id,
                        attempts: job.attempts,
                        error,
                        retrying: state == JobState::Waiting,
                    })
                }
            }
        }
        .instrument(span.clone())
        .await?;

        span.in_scope(|| self.emit(event.clone()));

        Ok(Some(event))
    }

    /// Polls the queue until the task is dropped or aborted.
    pub async fn run(self) {
        tracing::info!(worker_id = %self.id, queue = %self.queue.name(), "worker started");

        loop {
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    tracing::error!(worker_id = %self.id, error = ?e, "error polling job queue");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn execute(&self, job: &QueuedJob) -> Result<BatchReport, JobExecutionError> {
        let JobPayload::SendEmails { emails } = job.payload()?;
        let transport = self.transport.clone();

        // a panicking transport must fail the attempt, not the worker. The handle
        // aborts the batch when this future is dropped.
        let mut batch = AbortOnDropHandle::new(tokio::spawn(
            async move { jobs::send_email::job(&emails, transport.as_ref()).await }
                .in_current_span(),
        ));

        let period = (self.queue.lease_timeout() / 3).max(MIN_LEASE_RENEWAL);
        let mut renewal = tokio::time::interval_at(Instant::now() + period, period);
        renewal.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = &mut batch => {
                    return result.map_err(|e| JobExecutionError::Crashed(e.to_string()));
                }
                _ = renewal.tick() => match self.queue.extend_lease(job).await {
                    Ok(()) => {}
                    Err(Error::LeaseLost(id)) => return Err(JobExecutionError::LeaseLost(id)),
                    Err(e) => tracing::warn!(error = ?e, "could not extend lease"),
                },
            }
        }
    }

    fn emit(&self, event: JobEvent) {
        match &event {
            JobEvent::Completed {
                delivered, failed, ..
            } if *failed > 0 => {
                tracing::warn!(delivered, failed, "job completed with failed entries");
            }
            JobEvent::Completed { delivered, .. } => {
                tracing::info!(delivered, "job completed");
            }
            JobEvent::Failed {
                job_id,
                attempts,
                error,
                retrying: true,
            } => {
                tracing::warn!(%job_id, attempts, %error, "job failed, retry scheduled");
            }
            JobEvent::Failed {
                job_id,
                attempts,
                error,
                retrying: false,
            } => {
                tracing::error!(%job_id, attempts, %error, "job failed permanently");
            }
        }

        // nobody listening is fine
        let _ = self.events.send(event);
    }
}
