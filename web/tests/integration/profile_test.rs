use super::{authenticated_request, image_part, test_request_with_db};
use axum_test::multipart::MultipartForm;
use fake::{Fake as _, Faker};
use newsroom_db::{
    DbPool, MIGRATOR,
    entities::user::{RegisterUser, User},
};
use serde_json::Value;

fn profile_form(file_name: &str, mime: &str) -> MultipartForm {
    MultipartForm::new().add_part("profile", image_part(file_name, mime))
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn profile_requires_login(pool: DbPool) {
    test_request_with_db::<_, _>(pool, |app| async move {
        app.server.get("/api/profile").await.assert_status_unauthorized();
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn profile_shows_the_logged_in_user(pool: DbPool) {
    authenticated_request::<_, _>(pool, |app, user| async move {
        let response = app.server.get("/api/profile").await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["user"]["id"], user.id);
        assert_eq!(body["user"]["email"], user.email.as_str());
        assert!(body["user"].get("password_hash").is_none());
        assert_eq!(
            body["user"]["profile"],
            newsroom_web::uploads::PLACEHOLDER_AVATAR
        );
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn update_profile_stores_the_image(pool: DbPool) {
    authenticated_request::<_, _>(pool.clone(), |app, user| async move {
        let response = app
            .server
            .put(&format!("/api/profile/{}", user.id))
            .multipart(profile_form("me.png", "image/png"))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["message"], "Profile updated successfully");

        let stored = User::try_get_by_id(&user.id, &pool)
            .await
            .unwrap()
            .unwrap()
            .profile
            .expect("profile image was not saved");
        assert!(stored.ends_with(".png"));
        assert!(body["user"]["profile"].as_str().unwrap().ends_with(&stored));
        assert!(app.image_exists(&stored));
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn update_profile_replaces_the_previous_image(pool: DbPool) {
    authenticated_request::<_, _>(pool.clone(), |app, user| async move {
        let path = format!("/api/profile/{}", user.id);

        app.server
            .put(&path)
            .multipart(profile_form("first.png", "image/png"))
            .await
            .assert_status_ok();
        let first = User::try_get_by_id(&user.id, &pool)
            .await
            .unwrap()
            .unwrap()
            .profile
            .unwrap();

        app.server
            .put(&path)
            .multipart(profile_form("second.gif", "image/gif"))
            .await
            .assert_status_ok();
        let second = User::try_get_by_id(&user.id, &pool)
            .await
            .unwrap()
            .unwrap()
            .profile
            .unwrap();

        assert_ne!(first, second);
        assert!(!app.image_exists(&first), "previous image was not removed");
        assert!(app.image_exists(&second));
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn update_profile_of_another_user_is_forbidden(pool: DbPool) {
    authenticated_request::<_, _>(pool.clone(), |app, _user| async move {
        let other: RegisterUser = Faker.fake();
        let other = User::create(other, &pool).await.unwrap();

        let response = app
            .server
            .put(&format!("/api/profile/{}", other.id))
            .multipart(profile_form("me.png", "image/png"))
            .await;

        response.assert_status_forbidden();
        let other = User::try_get_by_id(&other.id, &pool).await.unwrap().unwrap();
        assert!(other.profile.is_none());
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn update_profile_rejects_unsupported_files(pool: DbPool) {
    authenticated_request::<_, _>(pool, |app, user| async move {
        let response = app
            .server
            .put(&format!("/api/profile/{}", user.id))
            .multipart(profile_form("notes.txt", "text/plain"))
            .await;

        response.assert_status_bad_request();
        assert_eq!(
            response.json::<Value>()["errors"]["profile"],
            "Image must be type of png,jpg,jpeg,svg,webp,gif...."
        );
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn update_profile_requires_an_image(pool: DbPool) {
    authenticated_request::<_, _>(pool, |app, user| async move {
        let response = app
            .server
            .put(&format!("/api/profile/{}", user.id))
            .multipart(MultipartForm::new().add_text("name", "Jane"))
            .await;

        response.assert_status_bad_request();
        assert_eq!(
            response.json::<Value>()["errors"]["profile"],
            "Profile image is required"
        );
    })
    .await
}
