use super::{PNG, authenticated_request, image_part, test_request_with_db};
use axum_test::multipart::MultipartForm;
use newsroom_db::{DbPool, MIGRATOR};
use serde_json::{Value, json};

#[sqlx::test(migrator = "MIGRATOR")]
async fn home_reports_the_api_is_up(pool: DbPool) {
    test_request_with_db::<_, _>(pool, |app| async move {
        let response = app.server.get("/").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "message": "Hello, It's Working..." }));
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn uploaded_images_are_served_under_images(pool: DbPool) {
    authenticated_request::<_, _>(pool, |app, user| async move {
        let response = app
            .server
            .put(&format!("/api/profile/{}", user.id))
            .multipart(MultipartForm::new().add_part("profile", image_part("me.png", "image/png")))
            .await;
        response.assert_status_ok();

        let url = response.json::<Value>()["user"]["profile"]
            .as_str()
            .unwrap()
            .to_string();
        let name = url.rsplit('/').next().unwrap();

        let image = app.server.get(&format!("/images/{}", name)).await;

        image.assert_status_ok();
        assert_eq!(image.as_bytes().as_ref(), PNG);
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn unknown_images_are_not_found(pool: DbPool) {
    test_request_with_db::<_, _>(pool, |app| async move {
        app.server
            .get("/images/does-not-exist.png")
            .await
            .assert_status_not_found();
    })
    .await
}
