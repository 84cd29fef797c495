//! Console logging for wasm hosts.

use tracing::Level;
use tracing::subscriber::set_global_default;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

/// Route `tracing` events at or above `level` to the browser console.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_logging(level: Level) {
    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );

    let reg = Registry::default().with(wasm_layer);

    let _ = set_global_default(reg);
}
