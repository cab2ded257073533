use std::time::Duration;

use axum::{Extension, Router, extract::DefaultBodyLimit};
use axum_login::login_required;
use newsroom_worker::JobQueue;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    controllers::{
        auth::{login::LoginController, logout::LogoutController, register::RegisterController},
        home::HomeController,
        mail::MailController,
        news::NewsController,
        profile::ProfileController,
    },
    middlewares::auth::{AuthBackend, AuthLayer},
    state::AppState,
};

// Room for the text fields of a multipart body next to the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn init_router(app_state: &AppState, auth_layer: AuthLayer, email_queue: JobQueue) -> Router {
    let protected = Router::new()
        .merge(ProfileController::router())
        .merge(NewsController::router())
        .merge(MailController::router())
        .merge(LogoutController::router())
        .route_layer(login_required!(AuthBackend));

    let api = Router::new()
        .merge(protected)
        .merge(RegisterController::router())
        .merge(LoginController::router())
        .merge(NewsController::public_router());

    Router::new()
        .nest("/api", api)
        .merge(HomeController::router())
        .nest_service("/images", ServeDir::new(&app_state.config.uploads.path))
        .with_state(app_state.clone())
        .layer(ServiceBuilder::new().layer((
            TraceLayer::new_for_http(),
            // Graceful shutdown will wait for outstanding requests to complete. Add a timeout so
            // requests don't hang forever.
            TimeoutLayer::new(Duration::from_secs(10)),
            DefaultBodyLimit::max(app_state.config.uploads.max_size_bytes + MULTIPART_OVERHEAD),
            auth_layer,
            Extension(email_queue),
        )))
}
