// udp-sender: periodically broadcasts sensor snapshots as fixed-width
// UDP datagrams. SM is out of scope for this repository; see lib.rs.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "udp-sender", version, about = "Periodic UDP sensor broadcaster")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "/etc/sensor-gateway/udp-sender.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "udp-sender starting");

    let cli = Cli::parse();
    let cfg = match udp_sender::config::load_config_from_path(&cli.config) {
        Ok(cfg) => {
            info!(name = %cfg.name, port = cfg.port, sensors = cfg.sensors.len(), "config loaded");
            cfg
        }
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            std::process::exit(1);
        }
    };

    if let Err(err) = udp_sender::run(cfg).await {
        eprintln!("FATAL: {err}");
        std::process::exit(1);
    }
}
