// ws-gate: WebSocket/HTTP sensor gateway. SM is out of scope for this
// repository; see lib.rs.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ws-gate", version, about = "WebSocket/HTTP sensor gateway")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "/etc/sensor-gateway/ws-gate.toml")]
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

    info!(version = env!("CARGO_PKG_VERSION"), "ws-gate starting");

    let cli = Cli::parse();
    let cfg = match ws_gate::config::load_config_from_path(&cli.config) {
        Ok(cfg) => {
            info!(name = %cfg.name, port = cfg.httpserver_port, prefix = %cfg.prefix, "config loaded");
            cfg
        }
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            std::process::exit(1);
        }
    };

    if let Err(err) = ws_gate::run(cfg).await {
        eprintln!("FATAL: {err}");
        std::process::exit(1);
    }
}
