use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DRYDOCK_LOG";

const DEFAULT_FILTER: &str = "info";

/// Installs a formatted `tracing` subscriber.
///
/// `filter` wins when given; otherwise `DRYDOCK_LOG`, then `RUST_LOG`, then
/// `info`. Returns `false` when a global subscriber was already installed.
pub fn init(filter: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .try_init()
        .is_ok()
}

fn env_filter(filter: Option<&str>) -> EnvFilter {
    let directives = filter
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_ENV).ok())
        .filter(|value| !value.trim().is_empty());

    match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}
