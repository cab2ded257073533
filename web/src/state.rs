use color_eyre::Result;
use newsroom_config::{Config, Environment, load_config};
use newsroom_db::{Database, DbPool, connect_pool, create_database_if_not_exists};
use newsroom_mailer::{SharedTransport, build_transport};

use crate::error::Error;

/// The application's state that is available in [`crate::controllers`] and [`crate::middlewares`].
#[derive(Clone)]
pub struct AppState {
    pub env: Environment,
    pub config: Config,
    pub db_pool: DbPool,
    /// Pool of the database holding the job queue.
    pub jobs_pool: DbPool,
    /// Built once at startup and handed to the embedded workers.
    pub mail_transport: SharedTransport,
}

impl AppState {
    pub async fn build(env: Environment) -> Result<Self, Error> {
        let config: Config = load_config(&env)?;
        let db_pool = connect_pool(Database::Primary, &config).await?;

        create_database_if_not_exists(Database::Jobs, &config).await?;
        let jobs_pool = connect_pool(Database::Jobs, &config).await?;

        let mail_transport = build_transport(&config.mailer)?;

        Ok(Self {
            env,
            config,
            db_pool,
            jobs_pool,
            mail_transport,
        })
    }
}
