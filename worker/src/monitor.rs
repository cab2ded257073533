use std::time::Duration;

use newsroom_config::WorkerConfig;
use newsroom_mailer::SharedTransport;
use tokio::{sync::broadcast, task::JoinSet};

use crate::{JobEvent, JobQueue, Worker};

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Supervises the worker loops of one queue plus the periodic purge of finished jobs.
pub struct Monitor {
    queue: JobQueue,
    transport: SharedTransport,
    events: broadcast::Sender<JobEvent>,
    concurrency: usize,
    poll_interval: Duration,
    retention: Duration,
}

impl Monitor {
    pub fn new(
        queue: JobQueue,
        transport: SharedTransport,
        events: broadcast::Sender<JobEvent>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            transport,
            events,
            concurrency: config.concurrency.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            retention: Duration::from_secs(config.retention_hours.saturating_mul(60 * 60)),
        }
    }

    /// Runs until every supervised task has stopped. Dropping or aborting the
    /// future stops all of them.
    pub async fn run(self) {
        let mut tasks = JoinSet::new();

        for _ in 0..self.concurrency {
            let worker = Worker::new(self.queue.clone(), self.transport.clone())
                .with_events(self.events.clone())
                .with_poll_interval(self.poll_interval);
            tasks.spawn(worker.run());
        }

        let queue = self.queue.clone();
        let retention = self.retention;
        tasks.spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                match queue.purge_finished(retention).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, queue = %queue.name(), "purged finished jobs"),
                    Err(e) => tracing::error!(error = ?e, "error purging finished jobs"),
                }
            }
        });

        tracing::info!(
            queue = %self.queue.name(),
            concurrency = self.concurrency,
            "job monitor started"
        );

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "job monitor task stopped");
            }
        }
    }
}
