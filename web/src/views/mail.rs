use axum::{
    Json,
    response::{IntoResponse, Response},
};
use newsroom_worker::JobHandle;
use serde_json::json;

pub enum MailView {
    /// The batch is queued; delivery happens in the background.
    Queued(JobHandle),
}

impl IntoResponse for MailView {
    fn into_response(self) -> Response {
        match self {
            MailView::Queued(handle) => Json(json!({
                "status": 200,
                "message": "Email sent successfully!",
                "job": handle,
            }))
            .into_response(),
        }
    }
}
