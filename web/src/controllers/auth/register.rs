use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use newsroom_db::entities::user::{RegisterUser, User};
use newsroom_mailer::templates::AuthMailer;
use newsroom_worker::JobQueue;

use crate::{error::Error, state::AppState, views::auth::AuthView};

pub struct RegisterController;

impl RegisterController {
    pub fn router() -> Router<AppState> {
        Router::new().route("/auth/register", post(RegisterController::register))
    }

    pub async fn register(
        State(app_state): State<AppState>,
        Extension(email_queue): Extension<JobQueue>,
        form: Result<Json<RegisterUser>, JsonRejection>,
    ) -> Result<AuthView, Error> {
        let Json(form) = form?;

        let user = User::create(form, &app_state.db_pool).await?;

        // Send the welcome email in a background job
        match email_queue
            .enqueue(vec![AuthMailer::welcome(
                &app_state.config,
                &user.name,
                &user.email,
            )])
            .await
        {
            Ok(handle) => tracing::debug!(job_id = %handle.id, "welcome email queued"),
            Err(e) => tracing::error!("failed to queue welcome email: {:?}", e),
        }

        Ok(AuthView::Registered(user))
    }
}
