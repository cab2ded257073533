use newsroom_config::TracingConfig;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

/// Installs the global subscriber shared by the API server and the worker process.
pub struct Tracing;

impl Tracing {
    /// Fails if a global subscriber is already set.
    pub fn try_init(config: &TracingConfig) -> Result<(), TryInitError> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

        if config.enable {
            // job and request spans carry the ids, keep them on every line
            let stdout_layer = fmt::Layer::default()
                .with_ansi(true)
                .with_target(true)
                .with_writer(std::io::stdout)
                .compact()
                .boxed();
            layers.push(stdout_layer);
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(init_env_layer(config))
            .with(ErrorLayer::default())
            .try_init()
    }
}

// RUST_LOG wins over the configured filter
fn init_env_layer(config: &TracingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.env_filter))
}
