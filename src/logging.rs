use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins; `info` otherwise.
///
/// Logs go to stderr so client commands can keep stdout for their output.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
