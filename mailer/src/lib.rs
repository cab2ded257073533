pub mod api;
pub mod message;
pub mod smtp;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use newsroom_config::{MailTransportKind, MailerConfig};

pub use api::ApiTransport;
pub use message::EmailJob;
pub use smtp::SmtpTransport;
pub use validator::{Validate, ValidationErrors};

/// A successful hand-off of one email to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
}

/// ------------------------------------------------------------------------
/// # A transport that delivers a single email
/// ------------------------------------------------------------------------
///
/// Every call is exactly one delivery attempt. Transports never retry on
/// their own, retrying is left to the job queue.
///
/// Transports are built once at startup with [`build_transport`] and passed
/// to whoever needs them as a [`SharedTransport`].
/// ------------------------------------------------------------------------
#[async_trait]
pub trait MailTransport: Send + Sync + 'static {
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<Delivery, DeliveryError>;
}

pub type SharedTransport = Arc<dyn MailTransport>;

/// Builds the transport selected by `mailer.transport`.
pub fn build_transport(config: &MailerConfig) -> Result<SharedTransport, Error> {
    let transport: SharedTransport = match config.transport {
        MailTransportKind::Smtp => Arc::new(SmtpTransport::new(config)?),
        MailTransportKind::Api => Arc::new(ApiTransport::new(config)?),
    };

    Ok(transport)
}

/// Errors that can occur while setting up a transport.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configured sender is not a valid mailbox, e.g. "Newsroom <no-reply@example.com>".
    #[error("invalid sender address: {0}")]
    InvalidSender(String),
    /// The SMTP transport could not be configured, e.g. invalid TLS parameters.
    #[error("could not configure the smtp transport")]
    Smtp(#[from] lettre::transport::smtp::Error),
    /// The HTTP client for the email API could not be built.
    #[error("could not configure the http client")]
    HttpClient(#[from] reqwest::Error),
    /// The API transport was selected without an API key.
    #[error("mailer.api.api_key must be set when using the api transport")]
    MissingApiKey,
}

/// Errors of a single delivery attempt.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    // The recipient could not be parsed as a mailbox
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),
    // The message could not be assembled
    #[error("could not build the message")]
    Build(#[from] lettre::error::Error),
    // The relay was unreachable, refused the credentials or rejected the message
    #[error("smtp delivery failed")]
    Smtp(#[from] lettre::transport::smtp::Error),
    // A reqwest error occurred
    #[error("email api request failed")]
    Request(#[from] reqwest::Error),
}
