use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub enum HomeView {
    Index,
}

impl IntoResponse for HomeView {
    fn into_response(self) -> Response {
        match self {
            HomeView::Index => Json(json!({ "message": "Hello, It's Working..." })).into_response(),
        }
    }
}
