//! Server configuration.
//!
//! Loaded from a TOML file with every field defaulted, so a missing or
//! partial config still boots a sensible server. Parse failures warn and
//! fall back rather than refusing to start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub port: u16,
    pub max_players: usize,
    /// Chunk radius streamed around each player, clamped to 1..=32.
    pub view_distance: u8,
    /// Raw world seed; mixed before use.
    pub world_seed: u64,
    pub motd: String,

    // Terrain shape.
    pub terrain_base_height: u8,
    pub cave_base_depth: u8,
    pub biome_size: i32,
    pub biome_radius: i32,

    // Memory bounds.
    pub max_block_changes: usize,
    pub chunk_cache_size: usize,
    pub packet_buffer_size: usize,
    pub max_recv_buf_len: usize,

    // Timing, in milliseconds.
    pub network_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
    pub keepalive_timeout_ms: u64,

    // Features.
    pub allow_chests: bool,
    pub do_fluid_flow: bool,
    /// Emit periodic absolute keyframes so clients interpolate mob motion
    /// smoothly across delayed ticks.
    pub mob_interpolation: bool,
    pub max_mobs: usize,

    // Persistence.
    pub save_path: PathBuf,
    pub save_interval_ms: u64,
    /// Directory of registry dumps from the extraction step.
    pub registry_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 25565,
            max_players: 16,
            view_distance: 5,
            world_seed: 0xA103_DE6C,
            motd: "picocraft server".into(),
            terrain_base_height: 64,
            cave_base_depth: 32,
            biome_size: 8,
            biome_radius: 4,
            max_block_changes: 20_000,
            chunk_cache_size: 4096,
            packet_buffer_size: 2048,
            max_recv_buf_len: 4096,
            network_timeout_ms: 15_000,
            keepalive_interval_ms: 10_000,
            keepalive_timeout_ms: 30_000,
            allow_chests: false,
            do_fluid_flow: true,
            mob_interpolation: false,
            max_mobs: 16,
            save_path: PathBuf::from("world.dat"),
            save_interval_ms: 60_000,
            registry_dir: PathBuf::from("config/registries"),
        }
    }
}

impl ServerConfig {
    /// Load from an explicit path, warning and defaulting on any failure.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ServerConfig>(&contents) {
                Ok(cfg) => cfg.sanitized(),
                Err(err) => {
                    warn!("failed to parse {}: {err}. Using defaults", path.display());
                    ServerConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to read {}: {err}. Using defaults", path.display());
                }
                ServerConfig::default()
            }
        }
    }

    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Clamp fields whose range the rest of the server assumes.
    fn sanitized(mut self) -> Self {
        self.view_distance = self.view_distance.clamp(1, 32);
        self.max_players = self.max_players.max(1);
        self.chunk_cache_size = self.chunk_cache_size.max(1);
        self.packet_buffer_size = self.packet_buffer_size.max(256);
        self.max_recv_buf_len = self.max_recv_buf_len.max(1024);
        self
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_millis(self.keepalive_timeout_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 25565);
        assert!(cfg.view_distance >= 1 && cfg.view_distance <= 32);
        assert!(cfg.max_block_changes > 0);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: ServerConfig = toml::from_str("port = 1234\nview_distance = 40").unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.port, 1234);
        // Out-of-range view distance clamps instead of failing.
        assert_eq!(cfg.view_distance, 32);
        assert_eq!(cfg.max_players, ServerConfig::default().max_players);
    }

    #[test]
    fn missing_file_defaults() {
        let cfg = ServerConfig::load_from_path(Path::new("/nonexistent/picocraft.toml"));
        assert_eq!(cfg.port, ServerConfig::default().port);
    }
}
