use axum::{
    Json,
    response::{IntoResponse, Response},
};
use newsroom_config::Config;
use newsroom_db::entities::user::User;
use serde::Serialize;
use serde_json::json;

use crate::uploads::{PLACEHOLDER_AVATAR, image_url};

/// A user as shown to its owner, with the profile image as a URL.
#[derive(Serialize, Debug)]
pub struct ProfileResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub profile: String,
    pub created_at: chrono::NaiveDateTime,
}

impl ProfileResource {
    pub fn new(user: User, config: &Config) -> Self {
        let profile = match &user.profile {
            Some(name) => image_url(config, name),
            None => PLACEHOLDER_AVATAR.to_string(),
        };

        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            profile,
            created_at: user.created_at,
        }
    }
}

pub enum ProfileView {
    Show(ProfileResource),
    Updated(ProfileResource),
}

impl IntoResponse for ProfileView {
    fn into_response(self) -> Response {
        match self {
            ProfileView::Show(user) => Json(json!({ "status": 200, "user": user })).into_response(),
            ProfileView::Updated(user) => Json(json!({
                "status": 200,
                "message": "Profile updated successfully",
                "user": user,
            }))
            .into_response(),
        }
    }
}
