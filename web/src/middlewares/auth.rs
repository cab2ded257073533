use async_trait::async_trait;
use axum_login::{AuthManagerLayer, AuthManagerLayerBuilder, AuthnBackend, UserId};
use color_eyre::eyre::eyre;
use newsroom_config::Environment;
use newsroom_db::{
    DbPool,
    entities::user::{User, UserCredentials},
};
use password_auth::verify_password;
use tokio::task::{self, JoinHandle};
use tower_sessions::{
    ExpiredDeletion, Expiry, SessionManagerLayer,
    cookie::{Key, time::Duration},
    session_store,
};
use tower_sessions_sqlx_store::SqliteStore;

use crate::{error::Error, state::AppState};

pub type AuthSession = axum_login::AuthSession<AuthBackend>;

pub type AuthLayer =
    AuthManagerLayer<AuthBackend, SqliteStore, tower_sessions::service::SignedCookie>;

#[derive(Debug, Clone)]
pub struct AuthBackend {
    db: DbPool,
}

impl AuthBackend {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuthnBackend for AuthBackend {
    type User = User;
    type Credentials = UserCredentials;
    type Error = Error;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let user: Option<Self::User> = User::try_get_by_email(&creds.email, &self.db).await?;
        // Verifying the password is blocking and potentially slow, so we'll do so via
        // `spawn_blocking`.
        task::spawn_blocking(|| {
            Ok(user.filter(|user| verify_password(creds.password, &user.password_hash).is_ok()))
        })
        .await
        .map_err(|e| Error::Unexpected(e.into()))?
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        let user = User::try_get_by_id(user_id, &self.db).await?;
        Ok(user)
    }
}

/// Session store, expired session cleanup and the auth layer for the router.
pub struct AuthSessionManager {
    pub deletion_task: JoinHandle<Result<(), session_store::Error>>,
    pub auth_layer: AuthLayer,
}

impl AuthSessionManager {
    pub fn new(app_state: &AppState) -> Result<Self, Error> {
        let session_store = SqliteStore::new(app_state.db_pool.clone())
            .with_table_name("sessions")
            .map_err(|e| Error::Unexpected(eyre!("invalid session table name: {e}")))?;

        let deletion_task = tokio::task::spawn(
            session_store
                .clone()
                .continuously_delete_expired(tokio::time::Duration::from_secs(60)),
        );

        // Sessions do not survive a restart of the process.
        let key = Key::generate();

        let session_layer = SessionManagerLayer::new(session_store)
            .with_secure(app_state.env == Environment::Production)
            .with_expiry(Expiry::OnInactivity(Duration::days(1)))
            .with_signed(key);

        let backend = AuthBackend::new(app_state.db_pool.clone());
        let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

        Ok(Self {
            deletion_task,
            auth_layer,
        })
    }
}
