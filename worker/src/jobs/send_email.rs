use newsroom_mailer::{EmailJob, MailTransport};

use crate::worker::BatchReport;

/// Delivers every entry of a batch in order.
///
/// A failing entry is logged and counted, it never stops the entries after it.
pub async fn job(emails: &[EmailJob], transport: &dyn MailTransport) -> BatchReport {
    let mut report = BatchReport::default();

    for (entry, email) in emails.iter().enumerate() {
        match transport
            .send(&email.to_email, &email.subject, &email.body)
            .await
        {
            Ok(delivery) => {
                tracing::info!(
                    entry,
                    to = %email.to_email,
                    message_id = %delivery.message_id,
                    "email sent"
                );
                report.delivered += 1;
            }
            Err(e) => {
                tracing::error!(entry, to = %email.to_email, error = %e, "error sending email");
                report.failed += 1;
            }
        }
    }

    report
}
