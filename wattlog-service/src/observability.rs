use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise the service logs at info.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wattlog_service=info,wattlog_client=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
