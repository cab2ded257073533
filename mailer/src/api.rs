use core::time;

use async_trait::async_trait;
use newsroom_config::MailerConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Delivery, DeliveryError, Error, MailTransport};

#[derive(Serialize)]
struct ApiEmail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    id: String,
}

/// Delivers mail through an HTTP email API (`POST {base_url}/emails`).
#[derive(Clone)]
pub struct ApiTransport {
    http_client: Client,
    base_url: String,
    sender: String,
    authorization_token: String,
}

// Manual implementation of Debug for ApiTransport to redact the authorization token
impl std::fmt::Debug for ApiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiTransport")
            .field("http_client", &self.http_client)
            .field("base_url", &self.base_url)
            .field("sender", &self.sender)
            .field("authorization_token", &"[redacted]")
            .finish()
    }
}

impl ApiTransport {
    pub fn new(config: &MailerConfig) -> Result<Self, Error> {
        let timeout = time::Duration::from_millis(config.timeout);
        let http_client = Client::builder().timeout(timeout).build()?;
        let authorization_token = config.api.api_key.clone().ok_or(Error::MissingApiKey)?;

        Ok(Self {
            http_client,
            base_url: config.api.base_url.clone(),
            sender: config.sender.clone(),
            authorization_token,
        })
    }
}

#[async_trait]
impl MailTransport for ApiTransport {
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<Delivery, DeliveryError> {
        if !validator::ValidateEmail::validate_email(&to_email) {
            return Err(DeliveryError::InvalidAddress(to_email.to_string()));
        }

        let url = format!("{}/emails", self.base_url);

        let res = self
            .http_client
            .post(url)
            .bearer_auth(&self.authorization_token)
            .json(&ApiEmail {
                from: &self.sender,
                to: vec![to_email],
                subject,
                html: html_body,
            })
            .send()
            .await?
            .error_for_status()?; // return an error if the response status is not 2xx

        let ApiResponse { id } = res.json().await?;

        tracing::debug!(message_id = %id, to = %to_email, "email accepted by email api");

        Ok(Delivery { message_id: id })
    }
}
