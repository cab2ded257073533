//! Runs the email workers without the HTTP API.

use color_eyre::eyre::{Context as _, Result};
use newsroom_config::{get_env, load_config};
use newsroom_mailer::build_transport;
use newsroom_web::{app::shutdown_signal, tracing::Tracing};
use newsroom_worker::WorkerInitializer;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let env = get_env().wrap_err("cannot get environment")?;
    let mut config = load_config(&env).wrap_err("cannot load configuration")?;

    Tracing::try_init(&config.tracing).wrap_err("cannot install tracing")?;

    // this process exists to run workers, whatever the web process does
    config.worker.embedded = true;

    let transport = build_transport(&config.mailer).wrap_err("cannot build mail transport")?;

    let worker = WorkerInitializer::init(&config, transport)
        .await
        .wrap_err("could not start workers")?;

    let Some(monitor_task) = worker.monitor_task else {
        return Ok(());
    };

    tokio::spawn(shutdown_signal(vec![monitor_task.abort_handle()]));

    match monitor_task.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => tracing::info!("worker shut down"),
        Err(e) => return Err(e).wrap_err("worker monitor crashed"),
    }

    Ok(())
}
