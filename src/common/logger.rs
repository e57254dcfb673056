use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; `fallback_level` is used when the variable is
/// unset or invalid. Safe to call more than once (later calls are no-ops),
/// which keeps test setups simple.
pub fn init(fallback_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback_level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
