use super::{authenticated_request, test_request_with_db};
use fake::{Fake as _, Faker};
use newsroom_db::{
    DbPool, MIGRATOR,
    entities::user::{RegisterUser, User, UserCredentials},
};
use newsroom_worker::{JobPayload, JobState};
use serde_json::{Value, json};

#[sqlx::test(migrator = "MIGRATOR")]
async fn register_creates_user_without_exposing_the_hash(pool: DbPool) {
    test_request_with_db::<_, _>(pool.clone(), |app| async move {
        let user: RegisterUser = Faker.fake();

        let response = app.server.post("/api/auth/register").json(&user).await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["message"], "user created successfully");
        assert_eq!(body["user"]["email"], user.email.as_str());
        assert!(body["user"].get("password_hash").is_none());

        let saved = User::try_get_by_email(&user.email, &pool)
            .await
            .unwrap()
            .expect("user was not stored");
        assert_eq!(saved.name, user.name);
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn register_queues_a_welcome_email(pool: DbPool) {
    test_request_with_db::<_, _>(pool.clone(), |app| async move {
        let user: RegisterUser = Faker.fake();

        app.server
            .post("/api/auth/register")
            .json(&user)
            .await
            .assert_status_ok();

        let job = app
            .email_queue
            .lease("test-worker")
            .await
            .unwrap()
            .expect("no welcome job was queued");
        assert_eq!(job.state, JobState::Active);

        let JobPayload::SendEmails { emails } = job.payload().unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].to_email, user.email);
        assert!(emails[0].subject.starts_with("Welcome to"));
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn register_rejects_a_duplicate_email(pool: DbPool) {
    test_request_with_db::<_, _>(pool.clone(), |app| async move {
        let user: RegisterUser = Faker.fake();
        User::create(user.clone(), &pool)
            .await
            .expect("failed to create user in test db");

        let response = app.server.post("/api/auth/register").json(&user).await;

        response.assert_status_bad_request();
        response.assert_json(&json!({ "errors": { "email": "Email already exists" } }));
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn register_reports_invalid_fields(pool: DbPool) {
    test_request_with_db::<_, _>(pool, |app| async move {
        let mut user: RegisterUser = Faker.fake();
        user.email = "not-an-email".to_string();
        user.password_confirmation = "something-else".to_string();

        let response = app.server.post("/api/auth/register").json(&user).await;

        response.assert_status_bad_request();
        let errors = &response.json::<Value>()["errors"];
        assert_eq!(errors["email"], "Must be a valid email address");
        assert_eq!(errors["password_confirmation"], "passwords do not match");
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn register_rejects_a_malformed_body(pool: DbPool) {
    test_request_with_db::<_, _>(pool, |app| async move {
        let response = app
            .server
            .post("/api/auth/register")
            .json(&json!({ "name": "Jane" }))
            .await;

        response.assert_status_bad_request();
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn login_creates_session_on_success(pool: DbPool) {
    test_request_with_db::<_, _>(pool.clone(), |app| async move {
        let user: RegisterUser = Faker.fake();

        User::create(user.clone(), &pool).await.unwrap();

        let response = app
            .server
            .post("/api/auth/login")
            .json(&UserCredentials {
                email: user.email.clone(),
                password: user.password,
            })
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["user"]["email"], user.email.as_str());

        let session_cookie = response.cookie("id").value().to_string();
        // Cookie is signed so the actual session id can be extracted after the '=' symbol
        let session_cookie = session_cookie.split('=').collect::<Vec<&str>>()[1];

        let (session_id,) =
            sqlx::query_as::<_, (String,)>("select id from sessions where id = ?")
                .bind(session_cookie)
                .fetch_optional(&pool)
                .await
                .unwrap()
                .expect("no session found in the database");

        assert_eq!(
            session_cookie, session_id,
            "session cookie did not match the stored token"
        );
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn login_rejects_an_unknown_email(pool: DbPool) {
    test_request_with_db::<_, _>(pool.clone(), |app| async move {
        let user: RegisterUser = Faker.fake();

        // User is not created in the database

        let response = app
            .server
            .post("/api/auth/login")
            .json(&UserCredentials {
                email: user.email,
                password: user.password,
            })
            .await;

        response.assert_status_bad_request();
        response.assert_json(&json!({ "errors": { "email": "No user found with this email." } }));
        assert!(
            response.maybe_cookie("id").is_none(),
            "oops a session cookie was created for a non existent user"
        );
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn login_rejects_a_wrong_password(pool: DbPool) {
    test_request_with_db::<_, _>(pool.clone(), |app| async move {
        let user: RegisterUser = Faker.fake();

        User::create(user.clone(), &pool)
            .await
            .expect("failed to create user in test db");

        let response = app
            .server
            .post("/api/auth/login")
            .json(&UserCredentials {
                email: user.email.clone(),
                password: "wrongPa$$word".into(),
            })
            .await;

        response.assert_status_bad_request();
        response.assert_json(&json!({ "errors": { "email": "Invalid Credentials." } }));
    })
    .await
}

#[sqlx::test(migrator = "MIGRATOR")]
async fn logout_ends_the_session(pool: DbPool) {
    authenticated_request::<_, _>(pool, |app, _user| async move {
        app.server.get("/api/profile").await.assert_status_ok();

        app.server.post("/api/auth/logout").await.assert_status_ok();

        app.server.get("/api/profile").await.assert_status_unauthorized();
    })
    .await
}
