mod auth_test;
mod home_test;
mod mail_test;
mod profile_test;

use std::{path::PathBuf, sync::OnceLock};

use axum_test::{
    TestServer, TestServerBuilder,
    multipart::{MultipartForm, Part},
};
use fake::{Fake, Faker};
use newsroom_config::Environment;
use newsroom_db::{
    DbPool,
    entities::user::{RegisterUser, User, UserCredentials},
};
use newsroom_web::{app::App, state::AppState, tracing::Tracing};
use newsroom_worker::{JobEvent, JobQueue};
use tokio::{sync::broadcast, task::JoinHandle};

/// A tiny png.
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Everything a test needs to drive the app and look behind it.
pub struct TestApp {
    pub server: TestServer,
    pub email_queue: JobQueue,
    pub job_events: broadcast::Sender<JobEvent>,
    pub uploads_path: PathBuf,
    pub worker_monitor_task: Option<JoinHandle<()>>,
}

impl TestApp {
    pub fn image_exists(&self, name: &str) -> bool {
        self.uploads_path.join(name).exists()
    }
}

pub fn image_part(file_name: &str, mime: &str) -> Part {
    Part::bytes(PNG.to_vec()).file_name(file_name).mime_type(mime)
}

pub fn news_form(title: &str, content: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", title.to_string())
        .add_text("content", content.to_string())
}

fn lazy_tracing(app_state: &AppState) {
    static TRACING: OnceLock<()> = OnceLock::new();
    TRACING.get_or_init(|| {
        let _ = Tracing::try_init(&app_state.config.tracing);
    });
}

fn lazy_eyre() {
    static EYRE: OnceLock<()> = OnceLock::new();
    EYRE.get_or_init(|| {
        let _ = color_eyre::install();
    });
}

pub async fn mock_logged_in_state(request: &TestServer, pool: &DbPool) -> User {
    let user: RegisterUser = Faker.fake();

    let saved_user = User::create(user.clone(), pool).await.unwrap();

    request
        .post("/api/auth/login")
        .json(&UserCredentials {
            email: user.email,
            password: user.password,
        })
        .await
        .assert_status_ok();

    saved_user
}

/// Builds the app on top of the test database. `configure` may tweak the state first.
pub async fn spawn_app<C>(test_db: DbPool, configure: C) -> TestApp
where
    C: FnOnce(&mut AppState),
{
    lazy_eyre();

    let mut app_state = AppState::build(Environment::Test)
        .await
        .expect("failed to build app state");

    // [sqlx::test] sets up a test database when running the test and cleans up afterwards
    // https://docs.rs/sqlx/latest/sqlx/attr.test.html
    app_state.db_pool = test_db.clone();
    app_state.jobs_pool = test_db;

    configure(&mut app_state);

    if std::env::var("TEST_LOG").is_ok() {
        lazy_tracing(&app_state);
    }

    let uploads_path = PathBuf::from(&app_state.config.uploads.path);

    let app = App::build(app_state)
        .await
        .expect("failed to boot test app");

    let config = TestServerBuilder::new()
        .transport(axum_test::Transport::HttpRandomPort)
        .default_content_type("application/json")
        .save_cookies()
        .into_config();

    let server = TestServer::new_with_config(app.router, config)
        .expect("unable to parse axum test server config");

    TestApp {
        server,
        email_queue: app.email_queue,
        job_events: app.job_events,
        uploads_path,
        worker_monitor_task: app.worker_monitor_task,
    }
}

pub async fn authenticated_request<F, Fut>(test_db: DbPool, callback: F)
where
    F: FnOnce(TestApp, User) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let app = spawn_app(test_db.clone(), |_| {}).await;

    let user = mock_logged_in_state(&app.server, &test_db).await;

    callback(app, user).await;
}

pub async fn test_request_with_db<F, Fut>(test_db: DbPool, callback: F)
where
    F: FnOnce(TestApp) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let app = spawn_app(test_db, |_| {}).await;

    callback(app).await;
}
