//! adabridge: MQTT bridge between the local broker and Adafruit IO
//!
//! ## Usage
//! ```text
//! adabridge [CONFIG_FILE]
//! ```
//!
//! ## Configuration
//! - ADABRIDGE_CONFIG: Path to a YAML config file (optional)
//! - ADABRIDGE__<SECTION>__<FIELD>: Override any config field
//! - ADABRIDGE_LOG: Tracing filter directives (default: info)
//! - ADABRIDGE_LOG_FORMAT: `json` for structured output
//!
//! The process exits non-zero whenever the bridge stops on an error, so the
//! service manager can restart it.

use tracing::info;

use adabridge::bridge;
use adabridge::config::Config;
use adabridge::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref())?;

    info!(
        local = %config.local.host,
        cloud = %config.cloud.host,
        "adabridge starting"
    );

    bridge::run(config).await?;
    Ok(())
}
