use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use color_eyre::eyre;
use newsroom_db::ValidationErrors;
use serde_json::json;
use tracing::error;

pub type Result<T, E = Error> = color_eyre::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] newsroom_config::Error),
    /// Unauthenticated user
    ///
    /// Return a `401 Unauthorized` response on an unauthenticated user.
    #[error("unauthenticated user")]
    Unauthenticated,
    /// The user is logged in but does not own the resource.
    ///
    /// Return a `403 Forbidden` response.
    #[error("not allowed to modify this resource")]
    Forbidden,
    /// A single invalid input field, e.g. a rejected upload or unknown login email.
    ///
    /// Return a `400 Bad Request` response with the message under `errors.<field>`.
    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    /// An error occured while interacting with the database.
    ///
    /// Return `500 Internal Server Error` on a db error.
    #[error("an error occured while interacting with the database")]
    Database(#[from] newsroom_db::Error),
    /// The mail transport could not be built from configuration.
    ///
    /// Return `500 Internal Server Error` on a mailer error.
    #[error("an error occured while setting up the mail transport")]
    Mailer(#[from] newsroom_mailer::Error),
    /// An error occured while interacting with worker storage.
    ///
    /// Return `500 Internal Server Error` on a worker storage error.
    #[error("error interacting with worker storage")]
    Worker(#[from] newsroom_worker::Error),
    /// A job could not be queued.
    ///
    /// Return `400 Bad Request` when the batch holds an undeliverable email,
    /// `500 Internal Server Error` otherwise.
    #[error("could not queue job")]
    Enqueue(#[from] newsroom_worker::EnqueueError),
    /// An uploaded file could not be written to or removed from disk.
    #[error("error storing uploaded file")]
    Upload(#[from] std::io::Error),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),
    /// Enumerate any possible app arrors here.
    ///
    /// Return `500 Internal Server Error` on a `eyre::Error`.
    #[error("Error: {0}")]
    Unexpected(#[from] eyre::Error),
}

impl Error {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidField {
            field,
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::InvalidField { .. } => StatusCode::BAD_REQUEST,
            Error::Database(newsroom_db::Error::NoRecordFound) => StatusCode::NOT_FOUND,
            Error::Database(newsroom_db::Error::UniqueConstraint(_)) => StatusCode::BAD_REQUEST,
            Error::Database(newsroom_db::Error::ValidationError(_)) => StatusCode::BAD_REQUEST,
            Error::Database(newsroom_db::Error::DatabaseError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::Database(newsroom_db::Error::PasswordHashError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::Multipart(err) => err.status(),
            Error::JsonRejection(_) => StatusCode::BAD_REQUEST,
            Error::Mailer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Enqueue(newsroom_worker::EnqueueError::InvalidEmail(_)) => {
                StatusCode::BAD_REQUEST
            }
            Error::Enqueue(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"errors": {"<field>": "<message>"}}`, the body of every field level error.
fn field_errors<I, K, V>(status: StatusCode, errors: I) -> Response
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let errors: BTreeMap<String, String> = errors
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    (status, Json(json!({ "errors": errors }))).into_response()
}

fn message(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": status.as_u16(), "message": message })),
    )
        .into_response()
}

/// First message of every invalid field.
fn validation_messages(errors: &ValidationErrors) -> Vec<(String, String)> {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errors)| {
            errors.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"));
                (field.to_string(), message)
            })
        })
        .collect()
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            Error::Unauthenticated => message(status, "unauthenticated"),
            Error::Forbidden => message(status, "you are not allowed to modify this resource"),
            Error::InvalidField { field, message } => field_errors(status, [(field, message)]),
            Error::Database(newsroom_db::Error::NoRecordFound) => {
                message(status, "no record found")
            }
            Error::Database(newsroom_db::Error::UniqueConstraint(ref fields)) => field_errors(
                status,
                fields
                    .iter()
                    .map(|(field, _)| (field.clone(), format!("{} already exists", capitalize(field)))),
            ),
            Error::Database(newsroom_db::Error::ValidationError(ref err)) => {
                field_errors(status, validation_messages(err))
            }
            Error::Database(ref err) => {
                error!("an error occured while interacting with the database: {:?}", err);
                message(status, "Something went wrong. Please try again.")
            }
            Error::Multipart(ref err) => message(status, &err.body_text()),
            Error::JsonRejection(ref err) => message(status, &err.body_text()),
            Error::Enqueue(newsroom_worker::EnqueueError::InvalidEmail(ref err)) => {
                field_errors(status, validation_messages(err))
            }
            Error::Enqueue(ref err) => {
                error!("an error occured while queueing a job: {:?}", err);
                message(status, "Something went wrong. Please try again later")
            }
            Error::Upload(ref err) => {
                error!("an error occured while storing an upload: {:?}", err);
                message(status, "Error uploading the image")
            }
            Error::Worker(ref err) => {
                error!("an error occured while interacting with worker: {:?}", err);
                message(status, "Something went wrong. Please try again later")
            }
            Error::Mailer(ref err) => {
                error!("an error occured while setting up the mailer: {:?}", err);
                message(status, "Something went wrong. Please try again later")
            }
            Error::Config(ref err) => {
                error!("an error occured while loading configuration: {:?}", err);
                message(status, "Something went wrong. Please try again later")
            }
            Error::Unexpected(ref err) => {
                error!("an internal server error occured: {:?}", err);
                message(status, "Something went wrong. Please try again later")
            }
        }
    }
}
