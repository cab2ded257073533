use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use newsroom_config::MailerConfig;
use uuid::Uuid;

use crate::{Delivery, DeliveryError, Error, MailTransport};

/// Delivers mail over an SMTP relay.
///
/// With `mailer.smtp.secure` the connection uses implicit TLS, otherwise the
/// transport upgrades with STARTTLS when the relay offers it and falls back to
/// plain text when it does not.
#[derive(Clone)]
pub struct SmtpTransport {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    sender: Mailbox,
}

impl std::fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("sender", &self.sender.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpTransport {
    pub fn new(config: &MailerConfig) -> Result<Self, Error> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|_| Error::InvalidSender(config.sender.clone()))?;

        let smtp = &config.smtp;

        let mut builder = if smtp.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
                .tls(Tls::Opportunistic(TlsParameters::new(smtp.host.clone())?))
        };

        builder = builder
            .port(smtp.port)
            .timeout(Some(Duration::from_millis(config.timeout)));

        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: Arc::new(builder.build()),
            sender,
        })
    }

    fn build_message(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        message_id: &str,
    ) -> Result<Message, DeliveryError> {
        let to: Mailbox = to_email
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(to_email.to_string()))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .message_id(Some(message_id.to_string()))
            .singlepart(SinglePart::html(html_body.to_string()))?;

        Ok(message)
    }

    fn next_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.sender.email.domain())
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<Delivery, DeliveryError> {
        let message_id = self.next_message_id();
        let message = self.build_message(to_email, subject, html_body, &message_id)?;

        self.transport.send(message).await?;

        tracing::debug!(%message_id, to = %to_email, "email handed to smtp relay");

        Ok(Delivery { message_id })
    }
}
