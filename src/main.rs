use anyhow::Result;
use clap::Parser;
use picocraft_server::Server;
use tracing::{info, Level};

mod config;

/// Minimal Minecraft Java Edition 1.21.8 server with deterministic
/// procedural terrain.
#[derive(Debug, Parser)]
#[command(name = "picocraft", version)]
struct Args {
    /// Path to the server config file.
    #[arg(long, default_value = picocraft_server::config::DEFAULT_CONFIG_PATH)]
    config: std::path::PathBuf,

    /// Override the configured port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured world seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the configured save path.
    #[arg(long)]
    save_path: Option<std::path::PathBuf>,

    /// Override the configured view distance (1..=32).
    #[arg(long)]
    view_distance: Option<u8>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args = Args::parse();
    let config = config::resolve(&args.config, |cfg| {
        if let Some(port) = args.port {
            cfg.port = port;
        }
        if let Some(seed) = args.seed {
            cfg.world_seed = seed;
        }
        if let Some(path) = &args.save_path {
            cfg.save_path = path.clone();
        }
        if let Some(vd) = args.view_distance {
            cfg.view_distance = vd.clamp(1, 32);
        }
    });

    info!(
        port = config.port,
        seed = config.world_seed,
        view_distance = config.view_distance,
        "starting picocraft"
    );
    let mut server = Server::bind(config)?;
    server.run()
}
