use anyhow::Result;
use clap::Parser;
use infinidesk::config::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// An infinite canvas Wayland compositor.
#[derive(Debug, Parser)]
#[command(name = "infinidesk", version, about)]
struct Cli {
    /// Command to run at startup
    #[arg(short, long, value_name = "cmd")]
    startup: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("starting infinidesk");

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            warn!("failed to load config, continuing with defaults: {err}");
            Config::default()
        }
    };

    infinidesk::winit::run_winit(config, cli.startup)
}
