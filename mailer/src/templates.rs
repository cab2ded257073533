use newsroom_config::Config;

use crate::EmailJob;

pub struct AuthMailer;

impl AuthMailer {
    pub fn welcome(config: &Config, name: &str, email_recipient: &str) -> EmailJob {
        let subject = format!("Welcome to {}", config.app.name);

        let html = format!(
            "<h1>Welcome to {}, {}!</h1>\
            <p>Your account has been created. You can now log in and start publishing news.</p>",
            config.app.name, name
        );

        EmailJob::new(email_recipient, subject, html)
    }
}

pub struct TestMailer;

impl TestMailer {
    /// The batch of five test emails used to check the delivery pipeline end to end.
    pub fn batch(email_recipient: &str) -> Vec<EmailJob> {
        (1..=5)
            .map(|n| {
                EmailJob::new(
                    email_recipient,
                    format!("Test Email {}", n),
                    format!("<h1>Hello, This is test email {}.</h1>", n),
                )
            })
            .collect()
    }
}
