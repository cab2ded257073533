use axum::{
    Extension, Router,
    extract::Query,
    routing::get,
};
use newsroom_mailer::templates::TestMailer;
use newsroom_worker::JobQueue;
use serde::Deserialize;

use crate::{error::Error, state::AppState, views::mail::MailView};

#[derive(Debug, Deserialize)]
pub struct SendEmailQuery {
    email: String,
}

pub struct MailController;

impl MailController {
    pub fn router() -> Router<AppState> {
        Router::new().route("/send-email", get(MailController::send_test_emails))
    }

    /// Queues the five test emails for `email`. Returns as soon as the batch is stored.
    pub async fn send_test_emails(
        Extension(email_queue): Extension<JobQueue>,
        Query(SendEmailQuery { email }): Query<SendEmailQuery>,
    ) -> Result<MailView, Error> {
        let handle = email_queue.enqueue(TestMailer::batch(&email)).await?;

        tracing::info!(job_id = %handle.id, queue = %handle.queue, "test emails queued");

        Ok(MailView::Queued(handle))
    }
}
