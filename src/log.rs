use tracing_subscriber::{
    fmt::Layer, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::env::ENV_PREFIX;

fn json_requested() -> bool {
    std::env::var(format!("{}LOG_JSON", ENV_PREFIX))
        .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

/// Installs the global subscriber. Honors `RUST_LOG`, defaulting to `info`.
///
/// Called before the app config is read so config errors are logged.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json_requested() {
        registry
            .with(Layer::default().json().flatten_event(true))
            .init();
    } else {
        registry.with(Layer::default()).init();
    }
}
