use serde::{Deserialize, Serialize};
use validator::Validate;

/// One email of a batch handed to the job queue.
///
/// Serialized with camelCase keys, e.g. `{"toEmail": "...", "subject": "...", "body": "<h1>..</h1>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmailJob {
    #[validate(email(message = "must be a valid email address"))]
    pub to_email: String,
    #[validate(length(min = 1, message = "must be at least 1 character"))]
    pub subject: String,
    /// HTML body.
    pub body: String,
}

impl EmailJob {
    pub fn new(
        to_email: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to_email: to_email.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}
