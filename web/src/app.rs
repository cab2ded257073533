use newsroom_config::Environment;
use newsroom_worker::{JobEvent, JobQueue, WorkerInitializer};
use tokio::sync::broadcast;
use tower_sessions::session_store;
use tracing::{debug, info};

use axum::{Router, serve};
use color_eyre::Result;
use tokio::{
    net::TcpListener,
    signal,
    task::{AbortHandle, JoinHandle},
};

use crate::{
    middlewares::auth::AuthSessionManager, router::init_router, state::AppState, tracing::Tracing,
};

pub struct App {
    pub router: Router,
    pub app_state: AppState,
    /// Producer handle used by the controllers.
    pub email_queue: JobQueue,
    /// Job events of the workers embedded in this process.
    pub job_events: broadcast::Sender<JobEvent>,
    pub deletion_task: JoinHandle<Result<(), session_store::Error>>,
    /// Only set when `worker.embedded` is on.
    pub worker_monitor_task: Option<JoinHandle<()>>,
}

impl App {
    // Builds the application without running it
    // this is useful for testing purposes
    // where axum_test will run a
    // random port
    pub async fn build(app_state: AppState) -> Result<Self> {
        let AuthSessionManager {
            deletion_task,
            auth_layer,
        } = AuthSessionManager::new(&app_state)?;

        // Prepare the email queue and, if embedded, start the workers
        let worker = WorkerInitializer::init_with_pool(
            app_state.jobs_pool.clone(),
            &app_state.config,
            app_state.mail_transport.clone(),
        )
        .await?;

        let router = init_router(&app_state, auth_layer, worker.email_queue.clone());

        Ok(Self {
            router,
            app_state,
            email_queue: worker.email_queue,
            job_events: worker.events,
            deletion_task,
            worker_monitor_task: worker.monitor_task,
        })
    }

    // Serves the application on the configured
    // ip and port.
    async fn serve(app: App) -> Result<()> {
        let listener = TcpListener::bind(&app.app_state.config.server.addr()).await?;

        debug!("listening on {}", app.app_state.config.server.addr());

        let mut task_handles = vec![app.deletion_task.abort_handle()];
        if let Some(monitor_task) = &app.worker_monitor_task {
            task_handles.push(monitor_task.abort_handle());
        }

        serve(listener, app.router)
            .with_graceful_shutdown(shutdown_signal(task_handles))
            .await?;

        App::shutdown_with_cleanup(app.deletion_task, app.worker_monitor_task).await?;

        Ok(())
    }

    // Boots up the app on the configured binding
    // and port.
    pub async fn boot(env: Environment) -> Result<()> {
        color_eyre::install()?;

        let app_state = AppState::build(env).await?;

        Tracing::try_init(&app_state.config.tracing)?;

        newsroom_db::migrate(&app_state.db_pool).await?;

        let app = App::build(app_state).await?;

        App::serve(app).await?;

        Ok(())
    }

    async fn shutdown_with_cleanup(
        deletion_task: JoinHandle<Result<(), session_store::Error>>,
        monitor_task: Option<JoinHandle<()>>,
    ) -> Result<()> {
        match deletion_task.await {
            Ok(_) => (), // nothing to cleanup
            Err(err) if err.is_cancelled() => {
                tracing::debug!("session deletion tasks cleaned up.")
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(monitor_task) = monitor_task {
            match monitor_task.await {
                Ok(_) => (),
                Err(err) if err.is_cancelled() => {
                    tracing::debug!("worker monitor task cleaned up.")
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!("server shutdown successfully");

        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM after aborting the given tasks.
pub async fn shutdown_signal(task_handles: Vec<AbortHandle>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    for task_handle in task_handles {
        task_handle.abort();
    }
}
