use std::{
    env,
    fmt::{Display, Formatter},
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use dotenvy::dotenv;
use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The application configuration.
///
/// This struct is the central point for the entire application configuration. It holds the [`ServerConfig`], [`DatabaseConfig`], [`TracingConfig`], [`MailerConfig`], [`WorkerConfig`] and [`UploadsConfig`] that are read from the main `app.toml` and the environment-specific configuration files.
///
/// For any setting that appears in both the `app.toml` and the environment-specific file, the latter will override the former so that default settings can be kept in `app.toml` that are overridden per environment if necessary.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub tracing: TracingConfig,
    pub mailer: MailerConfig,
    pub worker: WorkerConfig,
    pub uploads: UploadsConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct AppConfig {
    /// The name of the app, used e.g. in outgoing emails
    pub name: String,
    /// The public base url used to build links to uploaded images, e.g. "http://localhost:3000"
    pub url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Newsroom".to_string(),
            url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ServerConfig {
    /// The port to bind to, e.g. 3000
    pub port: u16,

    /// The ip to bind to, e.g. 127.0.0.1 or ::1
    pub ip: IpAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Returns the full address the server binds to, including both the ip and port.
    ///
    /// This can be used when creating a TCP Listener:
    ///
    /// ```rust
    /// let config: Config = load_config(Environment::Development);
    /// let listener = TcpListener::bind(&config.server.addr()).await?;
    /// serve(listener, app.into_make_service()).await?;
    ///  ```
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct DatabaseConfig {
    /// The URL to use to connect to the database, e.g. "sqlite://database.db"
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://newsroom.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct TracingConfig {
    pub enable: bool,
    pub env_filter: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enable: true,
            env_filter: "info,tower_http=debug".to_string(),
        }
    }
}

/// Which adapter delivers outgoing mail.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailTransportKind {
    /// Deliver over an SMTP relay.
    #[default]
    Smtp,
    /// Deliver through an HTTP email API (`POST {base_url}/emails`).
    Api,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct MailerConfig {
    pub transport: MailTransportKind,
    /// The from-address of every outgoing email
    pub sender: String,
    /// Timeout of a single delivery attempt, in milliseconds
    pub timeout: u64,
    pub smtp: SmtpConfig,
    pub api: ApiConfig,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            transport: MailTransportKind::Smtp,
            sender: "newsroom@localhost".to_string(),
            timeout: 10_000,
            smtp: SmtpConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Use implicit TLS (usually port 465). When `false` the connection is upgraded with STARTTLS
    /// if the relay offers it.
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            secure: false,
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.resend.com".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Wait `delay_ms` before every retry.
    Fixed,
    /// Wait `delay_ms * 2^(attempt - 1)`, capped at `max_delay_ms`.
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct BackoffConfig {
    pub kind: BackoffKind,
    pub delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential,
            delay_ms: 1_000,
            max_delay_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct WorkerConfig {
    /// The URL of the database holding the job queue
    pub database_url: String,
    /// The logical channel all email batches flow through
    pub queue_name: String,
    /// Run worker loops inside the web process
    pub embedded: bool,
    /// Number of worker loops leasing jobs in parallel
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    /// How long a worker may hold a job before the lease expires and the job is retried
    pub lease_timeout_ms: u64,
    /// Total delivery attempts per job, including the first one
    pub max_attempts: u32,
    pub backoff: BackoffConfig,
    /// Finished jobs older than this are purged from the queue
    pub retention_hours: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://jobs.db?mode=rwc".to_string(),
            queue_name: "email-queue".to_string(),
            embedded: true,
            concurrency: 1,
            poll_interval_ms: 1_000,
            lease_timeout_ms: 300_000,
            max_attempts: 3,
            backoff: BackoffConfig::default(),
            retention_hours: 24 * 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct UploadsConfig {
    /// Directory uploaded images are written to and served from, e.g. "public/images"
    pub path: String,
    pub max_size_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            path: "public/images".to_string(),
            max_size_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Loads the application configuration for a particular environment.
///
/// Depending on the environment, this function will behave differently:
/// * for [`Environment::Development`], the function will load env vars from a `.env` file at the project root if that is present
/// * for [`Environment::Test`], the function will load env vars from a `.env.test` file at the project root if that is present
/// * for [`Environment::Staging`], the function will only use the process env vars, and not load a `.env` file
/// * for [`Environment::Production`], the function will only use the process env vars, and not load a `.env` file
///
/// In case the .env or .env.test files live in another directory,
/// you can set that location using the APP_DOTENV_CONFIG_DIR environment variable.
/// This is useful when they are mounted at separate locations in a Docker container, for example.
///
/// Configuration settings are loaded from these sources (in that order so that latter sources override former):
/// * the defaults of [`Config`]
/// * the `config/app.toml` file
/// * the `config/environments/<development|staging|production|test>.toml` files depending on the environment
/// * environment variables prefixed with `APP_`, nested keys separated by `__` (e.g. `APP_MAILER__SMTP__HOST`)
pub fn load_config(env: &Environment) -> Result<Config, Error> {
    let dotenv_config_dir = env::var("APP_DOTENV_CONFIG_DIR")
        .ok()
        .map(std::path::PathBuf::from);

    match (env, dotenv_config_dir) {
        (Environment::Development, None) => {
            dotenv().ok();
        }
        (Environment::Test, None) => {
            dotenvy::from_filename(".env.test").ok();
        }
        (Environment::Development, Some(mut dotenv_config_dir)) => {
            dotenv_config_dir.push(".env");
            dotenvy::from_filename(dotenv_config_dir).ok();
        }
        (Environment::Test, Some(mut dotenv_config_dir)) => {
            dotenv_config_dir.push(".env.test");
            dotenvy::from_filename(dotenv_config_dir).ok();
        }
        _ => { /* don't use any .env file for production */ }
    }

    let config: Config = figment(env).extract()?;

    Ok(config)
}

fn figment(env: &Environment) -> Figment {
    let env_config_file = match env {
        Environment::Development => "development.toml",
        Environment::Staging => "staging.toml",
        Environment::Production => "production.toml",
        Environment::Test => "test.toml",
    };

    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file("config/app.toml"))
        .merge(Toml::file(format!(
            "config/environments/{}",
            env_config_file
        )))
        .merge(Env::prefixed("APP_").split("__"))
}

/// The environment the application runs in.
///
/// The application can run in 4 different environments: development, staging, production, and test. Depending on the environment, the configuration might be different (e.g. different databases) or the application might behave differently.
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// The development environment is what developers would use locally.
    Development,
    /// The staging environment would typically be used in a staging deployment of the app.
    Staging,
    /// The production environment would typically be used in the released, user-facing deployment of the app.
    Production,
    /// The test environment is using when running e.g. `cargo test`
    Test,
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
            Environment::Test => write!(f, "test"),
        }
    }
}

/// Returns the currently active environment.
///
/// If the `APP_ENVIRONMENT` env var is set, the application environment is parsed from that (which might fail if an invalid environment is set). If the env var is not set, [`Environment::Development`] is returned.
pub fn get_env() -> Result<Environment, Error> {
    match env::var("APP_ENVIRONMENT") {
        Ok(val) => {
            info!(r#"Setting environment from APP_ENVIRONMENT: "{}""#, val);
            parse_env(&val)
        }
        Err(_) => {
            info!("Defaulting to environment: development");
            Ok(Environment::Development)
        }
    }
}

/// Parses an [`Environment`] from a string.
///
/// The environment can be passed in different forms, e.g. "dev", "development", "prod", etc. If an invalid environment is passed, an error is returned.
pub fn parse_env(env: &str) -> Result<Environment, Error> {
    let env = &env.to_lowercase();
    match env.as_str() {
        "dev" => Ok(Environment::Development),
        "development" => Ok(Environment::Development),
        "stage" => Ok(Environment::Staging),
        "staging" => Ok(Environment::Staging),
        "test" => Ok(Environment::Test),
        "prod" => Ok(Environment::Production),
        "production" => Ok(Environment::Production),
        unknown => Err(Error::InvalidEnvironment(format!(
            "Unknown environment: {}",
            unknown
        ))),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Merge(#[from] figment::Error),
    #[error("unknown environment")]
    InvalidEnvironment(String),
}
