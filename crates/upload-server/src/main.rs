use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chunkyard_server::{AppState, ServerConfig, router};

#[derive(Parser)]
#[command(name = "chunkyard-server", version, about = "Chunked upload server")]
struct Cli {
    /// JSON config file; a missing file means defaults
    #[arg(short, long, default_value = "chunkyard.json")]
    config: PathBuf,

    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Directory receiving final files (overrides the config file)
    #[arg(short, long)]
    upload_dir: Option<PathBuf>,

    /// Log output format: "json" or "pretty" (overrides the config file)
    #[arg(long)]
    log_format: Option<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = ServerConfig::load(&self.config)?;
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(upload_dir) = self.upload_dir {
            config.upload_dir = upload_dir;
        }
        if let Some(log_format) = self.log_format {
            config.log_format = log_format;
        }
        Ok(config)
    }
}

fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    match config.log_format.as_str() {
        "json" => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;
    init_tracing(&config);

    let listen_addr = config.listen.clone();
    let state = AppState::new(config).context("opening upload storage")?;
    let app = router(state);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("cannot bind to {listen_addr}"))?;
    info!("chunkyard-server listening on {listen_addr}");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
