// ubridge: user-facing library crate. Embedders depend on this, start a
// bridge over their host and hand its module functions to the script side.

pub use ubridge_flags as flags;
pub use ubridge_host as host;
pub use ubridge_runtime as runtime;

// The script-facing module functions (log, find_object, generate_class, ...).
pub use ubridge_runtime::module;
pub use ubridge_runtime::blog;

pub mod prelude;

// Re-export glam for convenience.
pub use glam;

use std::path::Path;
use std::rc::Rc;

use ubridge_host::Host;
use ubridge_runtime::{Bridge, BridgeConfig, BridgeResult};

/// Start a bridge over `host`.
pub fn start(host: Rc<Host>, config: BridgeConfig) -> BridgeResult<Rc<Bridge>> {
    Bridge::new(host, config)
}

/// Start a bridge over `host`, reading its configuration from a
/// ubridge.config.toml file.
pub fn start_with_config_file(host: Rc<Host>, path: &Path) -> BridgeResult<Rc<Bridge>> {
    Bridge::new(host, BridgeConfig::load(path)?)
}

/// Release every script-side reference the bridge holds. Live wrappers keep
/// working against the host until their objects are collected.
pub fn shutdown(bridge: &Bridge) {
    bridge.host().log_sink().flush();
    bridge.shutdown();
}
