//! Config resolution: file first, then command-line overrides.

use picocraft_server::ServerConfig;
use std::path::Path;

/// Load the config file (lenient, defaulting) and apply CLI overrides.
pub fn resolve(path: &Path, apply_overrides: impl FnOnce(&mut ServerConfig)) -> ServerConfig {
    let mut config = ServerConfig::load_from_path(path);
    apply_overrides(&mut config);
    config
}
