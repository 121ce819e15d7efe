//! Logging setup for applications that do not install a subscriber of their own.
//!
//! Everything pjax does is reported through [`tracing`]. On `wasm` targets the events go to the
//! browser console, elsewhere to stdout.

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{PjaxError, Result};

/// Install a global subscriber that records events up to `level`.
///
/// Fails if a global subscriber is already installed.
pub fn init(level: Level) -> Result<()> {
    #[cfg(target_family = "wasm")]
    let result = tracing_subscriber::registry()
        .with(tracing_wasm::WASMLayer::new(
            tracing_wasm::WASMLayerConfigBuilder::default()
                .set_max_level(level)
                .build(),
        ))
        .try_init();

    #[cfg(not(target_family = "wasm"))]
    let result = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().without_time())
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .try_init();

    result.map_err(|err| PjaxError::Platform(format!("failed to install the logger: {err}")))
}
