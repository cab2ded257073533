use argon2::{
    Argon2, PasswordHasher,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use axum_login::AuthUser;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, prelude::FromRow};
use validator::Validate;

#[cfg(any(test, feature = "test-helpers"))]
use fake::{
    Dummy, Fake, Faker,
    faker::{
        internet::en::{Password, SafeEmail},
        name::en::Name,
    },
};

use crate::{Error, ResultExt};

#[derive(Clone, FromRow, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// File name of the uploaded profile image, if any.
    pub profile: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// Here we've implemented `Debug` manually to avoid accidentally logging the
// password hash.
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("profile", &self.profile)
            .finish()
    }
}

/// RegisterUser is a changeset for creating a new user.
///
/// Changesets can also be used to generate fake data for tests when the `test-helpers` feature is enabled:
///
/// ```
/// let user: RegisterUser = Faker.fake();
/// ```
#[derive(Deserialize, Validate, Clone, Debug)]
#[cfg_attr(any(test, feature = "test-helpers"), derive(serde::Serialize))]
pub struct RegisterUser {
    #[validate(length(min = 2, max = 191, message = "name must be between 2 and 191 characters"))]
    pub name: String,
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 100, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub password_confirmation: String,
}

/// ------------------------------------------------------------------------
/// Manual impl Dummy to allow re-use of the password in the password_confirmation field.
/// ------------------------------------------------------------------------
///
/// Only used in tests or when the `test-helpers` feature is enabled.
/// ------------------------------------------------------------------------
#[cfg(any(test, feature = "test-helpers"))]
impl Dummy<Faker> for RegisterUser {
    fn dummy_with_rng<R: fake::Rng + ?Sized>(_: &Faker, rng: &mut R) -> Self {
        let password: String = Password(8..16).fake_with_rng(rng);
        Self {
            name: Name().fake_with_rng(rng),
            email: SafeEmail().fake_with_rng(rng),
            password: password.clone(),
            password_confirmation: password,
        }
    }
}

/// UserCredentials is a changeset for logging in a user.
#[derive(Deserialize, Validate, Clone, Debug)]
#[cfg_attr(any(test, feature = "test-helpers"), derive(serde::Serialize))]
pub struct UserCredentials {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// ------------------------------------------------------------------------
/// Authentication specific implementations for axum_login.
/// ------------------------------------------------------------------------
impl AuthUser for User {
    type Id = i64;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn session_auth_hash(&self) -> &[u8] {
        self.password_hash.as_bytes()
        // We use the password hash as the auth
        // hash--what this means
        // is when the user changes their password the
        // auth session becomes invalid.
    }
}

impl User {
    pub async fn try_get_by_email(
        email: &str,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            r#"select * from users where email = ?

"#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    pub async fn try_get_by_id(
        id: &i64,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            r#"select * from users where id = ?

"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    pub async fn create(
        user: RegisterUser,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<User, Error> {
        user.validate()?;

        let password_hash = generate_password_hash(&user.password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            insert into users (name, email, password_hash)
            values (?, ?, ?)
            returning *

"#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(password_hash)
        .fetch_one(executor)
        .await
        .map_constraint_err()?; // return an app error if user already exists

        Ok(user)
    }

    /// Points the user at a new profile image file.
    pub async fn update_profile(
        id: i64,
        profile: &str,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<User, Error> {
        let user = sqlx::query_as::<_, User>(
            r#"update users set profile = ?, updated_at = current_timestamp where id = ? returning *

"#,
        )
        .bind(profile)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(Error::NoRecordFound)?;

        Ok(user)
    }
}

/// ------------------------------------------------------------------------
/// Helper function to generate a password hash using argon2.
/// ------------------------------------------------------------------------
/// # Returns
///
/// A hashed password string.
/// ------------------------------------------------------------------------
fn generate_password_hash(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hashed_password = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();

    Ok(hashed_password)
}
