use axum::{Router, routing::post};

use crate::{
    error::Error, middlewares::auth::AuthSession, state::AppState, views::auth::AuthView,
};

pub struct LogoutController;

impl LogoutController {
    pub fn router() -> Router<AppState> {
        Router::new().route("/auth/logout", post(LogoutController::logout))
    }

    pub async fn logout(mut auth_session: AuthSession) -> Result<AuthView, Error> {
        auth_session
            .logout()
            .await
            .map_err(|e| Error::Unexpected(e.into()))?;

        Ok(AuthView::LoggedOut)
    }
}
