use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` from the environment (default level is `info`). Safe to
/// call multiple times; later calls are ignored.
pub fn init() {
    init_with_default("info");
}

/// Like [`init`], with `default` used when `RUST_LOG` is unset or invalid.
pub fn init_with_default(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
