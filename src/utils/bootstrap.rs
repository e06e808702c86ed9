//! Bootstrap utilities for the adabridge binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the tracing filter directives.
pub const LOG_ENV_VAR: &str = "ADABRIDGE_LOG";
/// Environment variable selecting the log output format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "ADABRIDGE_LOG_FORMAT";

/// Initialize tracing with the ADABRIDGE_LOG environment variable.
///
/// Defaults to "info" level if ADABRIDGE_LOG is not set. Set
/// ADABRIDGE_LOG_FORMAT=json for one JSON object per line.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json_output() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn json_output() -> bool {
    std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
