use axum::{
    Json,
    response::{IntoResponse, Response},
};
use newsroom_db::entities::user::User;
use serde_json::json;

pub enum AuthView {
    Registered(User),
    LoggedIn(User),
    LoggedOut,
}

impl IntoResponse for AuthView {
    fn into_response(self) -> Response {
        match self {
            AuthView::Registered(user) => Json(json!({
                "status": 200,
                "message": "user created successfully",
                "user": user,
            }))
            .into_response(),
            AuthView::LoggedIn(user) => Json(json!({
                "status": 200,
                "message": "Logged in",
                "user": user,
            }))
            .into_response(),
            AuthView::LoggedOut => Json(json!({
                "status": 200,
                "message": "Logged out",
            }))
            .into_response(),
        }
    }
}
