use std::time::Duration;

use newsroom_config::WorkerConfig;
use newsroom_db::DbPool;
use newsroom_mailer::{EmailJob, Validate as _};

use crate::{
    EnqueueError, Error,
    job::{JobHandle, JobId, JobPayload, JobState, QueuedJob, from_millis, now_millis},
    policy::RetryPolicy,
    worker::BatchReport,
};

const CREATE_JOBS_TABLE: &str = r#"
create table if not exists jobs (
    id integer primary key autoincrement not null,
    queue text not null,
    payload text not null,
    state text not null default 'waiting',
    attempts integer not null default 0,
    max_attempts integer not null,
    run_at integer not null,
    leased_by text,
    lease_expires_at integer,
    last_error text,
    delivered integer,
    failed integer,
    enqueued_at integer not null,
    finished_at integer
)
"#;

const CREATE_JOBS_INDEX: &str = r#"
create index if not exists jobs_queue_state_run_at_idx on jobs (queue, state, run_at)
"#;

/// A durable, named job queue backed by SQLite.
///
/// Jobs are handed out under a lease that the holder renews with
/// [`JobQueue::extend_lease`] while it works. A worker that stops renewing its
/// claim (it crashed or hung past `lease_timeout`) loses the job to the next
/// [`JobQueue::reap_expired_leases`] call.
#[derive(Debug, Clone)]
pub struct JobQueue {
    pool: DbPool,
    name: String,
    policy: RetryPolicy,
    lease_timeout: Duration,
}

impl JobQueue {
    pub fn new(
        pool: DbPool,
        name: impl Into<String>,
        policy: RetryPolicy,
        lease_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            name: name.into(),
            policy,
            lease_timeout,
        }
    }

    pub fn from_config(pool: DbPool, config: &WorkerConfig) -> Self {
        Self::new(
            pool,
            config.queue_name.clone(),
            RetryPolicy::from(config),
            Duration::from_millis(config.lease_timeout_ms),
        )
    }

    /// Creates the job table if it is missing.
    pub async fn setup(pool: &DbPool) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_JOBS_TABLE).execute(pool).await?;
        sqlx::query(CREATE_JOBS_INDEX).execute(pool).await?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }

    /// Persists a batch of emails as one `send_emails` job.
    ///
    /// Only the job store is touched, so this succeeds whether or not the mail
    /// relay is reachable.
    pub async fn enqueue(&self, emails: Vec<EmailJob>) -> Result<JobHandle, EnqueueError> {
        self.enqueue_payload(&JobPayload::SendEmails { emails })
            .await
    }

    pub async fn enqueue_payload(&self, payload: &JobPayload) -> Result<JobHandle, EnqueueError> {
        let JobPayload::SendEmails { emails } = payload;
        for email in emails {
            email.validate()?;
        }

        let payload = serde_json::to_string(payload)?;
        let now = now_millis();

        let id = sqlx::query_scalar::<_, JobId>(
            r#"insert into jobs (queue, payload, state, attempts, max_attempts, run_at, enqueued_at)
               values (?, ?, 'waiting', 0, ?, ?, ?)
               returning id"#,
        )
        .bind(&self.name)
        .bind(payload)
        .bind(self.policy.max_attempts as i64)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(job_id = %id, queue = %self.name, "job enqueued");

        Ok(JobHandle {
            id,
            queue: self.name.clone(),
            enqueued_at: from_millis(now),
        })
    }

    /// Claims the oldest runnable job for `worker_id`.
    ///
    /// The claim is a single conditional update, so two workers racing for the
    /// same row cannot both win it.
    pub async fn lease(&self, worker_id: &str) -> Result<Option<QueuedJob>, Error> {
        let now = now_millis();
        let expires_at = now.saturating_add(self.lease_timeout.as_millis() as i64);

        let job = sqlx::query_as::<_, QueuedJob>(
            r#"update jobs
               set state = 'active', leased_by = ?, lease_expires_at = ?, attempts = attempts + 1
               where id = (
                   select id from jobs
                   where queue = ? and state = 'waiting' and run_at <= ?
                   order by run_at, id
                   limit 1
               )
               and state = 'waiting'
               returning *"#,
        )
        .bind(worker_id)
        .bind(expires_at)
        .bind(&self.name)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Pushes the lease expiry of a job this worker holds `lease_timeout` into the future.
    pub async fn extend_lease(&self, job: &QueuedJob) -> Result<(), Error> {
        let expires_at = now_millis().saturating_add(self.lease_timeout.as_millis() as i64);

        let result = sqlx::query(
            r#"update jobs
               set lease_expires_at = ?
               where id = ? and state = 'active' and leased_by = ?"#,
        )
        .bind(expires_at)
        .bind(job.id)
        .bind(&job.leased_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::LeaseLost(job.id));
        }

        Ok(())
    }

    /// Marks a leased job as completed with the delivery counts of the batch.
    pub async fn complete(&self, job: &QueuedJob, report: &BatchReport) -> Result<(), Error> {
        let result = sqlx::query(
            r#"update jobs
               set state = 'completed', leased_by = null, lease_expires_at = null,
                   delivered = ?, failed = ?, finished_at = ?
               where id = ? and state = 'active' and leased_by = ?"#,
        )
        .bind(report.delivered as i64)
        .bind(report.failed as i64)
        .bind(now_millis())
        .bind(job.id)
        .bind(&job.leased_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::LeaseLost(job.id));
        }

        Ok(())
    }

    /// Records a failed attempt.
    ///
    /// The job goes back to `Waiting` after the policy's backoff while attempts
    /// remain, otherwise it ends `Failed`. Returns the state it was moved to.
    pub async fn fail(&self, job: &QueuedJob, error: &str) -> Result<JobState, Error> {
        let now = now_millis();

        let (state, run_at, finished_at) = if job.has_attempts_left() {
            let attempt = u32::try_from(job.attempts).unwrap_or(u32::MAX);
            let delay = self.policy.delay_for(attempt).as_millis() as i64;
            (JobState::Waiting, now.saturating_add(delay), None)
        } else {
            (JobState::Failed, job.run_at, Some(now))
        };

        let result = sqlx::query(
            r#"update jobs
               set state = ?, run_at = ?, leased_by = null, lease_expires_at = null,
                   last_error = ?, finished_at = ?
               where id = ? and state = 'active' and leased_by = ?"#,
        )
        .bind(state)
        .bind(run_at)
        .bind(error)
        .bind(finished_at)
        .bind(job.id)
        .bind(&job.leased_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::LeaseLost(job.id));
        }

        Ok(state)
    }

    /// Takes back every job whose lease ran out.
    ///
    /// An expired lease counts as a failed attempt: the job is retried right away
    /// while attempts remain and ends `Failed` otherwise. Returns the reaped jobs
    /// in their new state.
    pub async fn reap_expired_leases(&self) -> Result<Vec<QueuedJob>, Error> {
        let now = now_millis();

        let jobs = sqlx::query_as::<_, QueuedJob>(
            r#"update jobs
               set state = case when attempts < max_attempts then 'waiting' else 'failed' end,
                   finished_at = case when attempts < max_attempts then null else ? end,
                   run_at = ?,
                   leased_by = null,
                   lease_expires_at = null,
                   last_error = 'lease expired'
               where queue = ? and state = 'active' and lease_expires_at <= ?
               returning *"#,
        )
        .bind(now)
        .bind(now)
        .bind(&self.name)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Deletes completed and failed jobs that finished more than `retention` ago.
    pub async fn purge_finished(&self, retention: Duration) -> Result<u64, Error> {
        let retention = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_millis().saturating_sub(retention);

        let result = sqlx::query(
            r#"delete from jobs
               where queue = ? and state in ('completed', 'failed') and finished_at <= ?"#,
        )
        .bind(&self.name)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn find(&self, id: JobId) -> Result<Option<QueuedJob>, Error> {
        let job = sqlx::query_as::<_, QueuedJob>("select * from jobs where id = ? and queue = ?")
            .bind(id)
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }
}
