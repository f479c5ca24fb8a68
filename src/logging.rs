//! Logging - tracing subscriber setup for hosts embedding the wallet.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global subscriber. `RUST_LOG` filters (default `info`);
/// `BEEWALLET_LOG_JSON=1` switches to JSON lines. Later calls are no-ops.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var("BEEWALLET_LOG_JSON")
        .map(|value| value == "1")
        .unwrap_or(false);

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Subscriber for tests: captured by the harness, `debug` unless `RUST_LOG` says otherwise.
pub fn init_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beewallet=debug"));
    let _ = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
