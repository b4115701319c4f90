use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,wind_bid_optimizer=info";

/// Install the global JSON subscriber. `RUST_LOG` overrides the default filter.
///
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Human-readable subscriber routed through the test harness. Safe to call from
/// every test; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "wind_bid_optimizer=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
