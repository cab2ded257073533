use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use newsroom_db::{
    Validate,
    entities::user::{User, UserCredentials},
};

use crate::{
    error::Error, middlewares::auth::AuthSession, state::AppState, views::auth::AuthView,
};

pub struct LoginController;

impl LoginController {
    pub fn router() -> Router<AppState> {
        Router::new().route("/auth/login", post(LoginController::login))
    }

    pub async fn login(
        mut auth_session: AuthSession,
        State(app_state): State<AppState>,
        creds: Result<Json<UserCredentials>, JsonRejection>,
    ) -> Result<AuthView, Error> {
        let Json(creds) = creds?;
        creds.validate().map_err(newsroom_db::Error::from)?;

        // tell an unknown email apart from a wrong password
        if User::try_get_by_email(&creds.email, &app_state.db_pool)
            .await?
            .is_none()
        {
            return Err(Error::invalid("email", "No user found with this email."));
        }

        let user = match auth_session.authenticate(creds).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(Error::invalid("email", "Invalid Credentials.")),
            Err(e) => return Err(Error::Unexpected(e.into())),
        };

        auth_session
            .login(&user)
            .await
            .map_err(|e| Error::Unexpected(e.into()))?;

        tracing::info!(user_id = user.id, "user logged in");

        Ok(AuthView::LoggedIn(user))
    }
}
