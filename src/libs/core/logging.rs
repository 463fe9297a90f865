use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "pranayam_chat_lib=info";

/// Installs the global fmt subscriber. Later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    let filter = filter
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
