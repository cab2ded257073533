use axum::{
    Router,
    extract::{Multipart, Path, State},
    routing::{get, put},
};
use newsroom_db::entities::user::User;

use crate::{
    error::Error,
    middlewares::auth::AuthSession,
    state::AppState,
    uploads::{MultipartForm, remove_image},
    views::profile::{ProfileResource, ProfileView},
};

pub struct ProfileController;

impl ProfileController {
    pub fn router() -> Router<AppState> {
        Router::new()
            .route("/profile", get(ProfileController::show))
            .route("/profile/{id}", put(ProfileController::update))
    }

    pub async fn show(
        auth_session: AuthSession,
        State(app_state): State<AppState>,
    ) -> Result<ProfileView, Error> {
        let user = auth_session.user.ok_or(Error::Unauthenticated)?;

        Ok(ProfileView::Show(ProfileResource::new(
            user,
            &app_state.config,
        )))
    }

    /// Replaces the profile image of the logged in user.
    pub async fn update(
        auth_session: AuthSession,
        Path(id): Path<i64>,
        State(app_state): State<AppState>,
        multipart: Multipart,
    ) -> Result<ProfileView, Error> {
        let user = auth_session.user.ok_or(Error::Unauthenticated)?;
        if user.id != id {
            return Err(Error::Forbidden);
        }

        let mut form = MultipartForm::read(multipart).await?;
        let upload = form
            .file("profile")
            .ok_or_else(|| Error::invalid("profile", "Profile image is required"))?;

        let uploads = &app_state.config.uploads;
        let image = upload.store(uploads, "profile").await?;

        let updated = match User::update_profile(user.id, &image, &app_state.db_pool).await {
            Ok(updated) => updated,
            Err(e) => {
                remove_image(uploads, &image).await?;
                return Err(e.into());
            }
        };

        if let Some(previous) = user.profile.as_deref() {
            remove_image(uploads, previous).await?;
        }

        tracing::info!(user_id = user.id, "profile image updated");

        Ok(ProfileView::Updated(ProfileResource::new(
            updated,
            &app_state.config,
        )))
    }
}
