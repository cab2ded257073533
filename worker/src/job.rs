use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use newsroom_mailer::EmailJob;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// Identifier the queue assigns to every enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct JobId(pub i64);

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a queued job.
///
/// `Failed` as stored in the queue is always terminal: a failed attempt with
/// attempts left goes straight back to `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// The typed body of a job.
///
/// Stored as JSON tagged by `type`, e.g. `{"type": "send_emails", "emails": [...]}`, so a
/// worker can check the shape before doing any work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    /// A batch of emails, delivered in order.
    SendEmails { emails: Vec<EmailJob> },
}

/// What the producer gets back from an enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub id: JobId,
    pub queue: String,
    pub enqueued_at: DateTime<Utc>,
}

/// The durable record of a job.
#[derive(Debug, Clone, FromRow)]
pub struct QueuedJob {
    pub id: JobId,
    pub queue: String,
    /// Raw JSON of the [`JobPayload`].
    pub payload: String,
    pub state: JobState,
    /// Attempts started so far, including the one in progress.
    pub attempts: i64,
    pub max_attempts: i64,
    /// Unix millis before which the job is not leased.
    pub run_at: i64,
    pub leased_by: Option<String>,
    pub lease_expires_at: Option<i64>,
    pub last_error: Option<String>,
    /// Entries delivered by the completing attempt.
    pub delivered: Option<i64>,
    /// Entries that failed in the completing attempt.
    pub failed: Option<i64>,
    pub enqueued_at: i64,
    pub finished_at: Option<i64>,
}

impl QueuedJob {
    pub fn payload(&self) -> Result<JobPayload, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        from_millis(self.enqueued_at)
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
