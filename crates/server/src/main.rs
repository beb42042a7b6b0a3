use clap::Parser;
use deepsk_server::ServerConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Task and coupon backend for the DeepSK map game.
#[derive(Debug, Parser)]
#[command(name = "deepsk-server", version)]
struct Args {
    #[arg(long, env = "DEEPSK_ADDR", default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// SQLite file (default: ~/.deepsk/deepsk.db).
    #[arg(long, env = "DEEPSK_DB")]
    db: Option<PathBuf>,

    /// Directory with the browser client, served at `/`.
    #[arg(long, env = "DEEPSK_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// JSON task list (x/y percentages or lat/lng) to upsert at startup.
    #[arg(long, env = "DEEPSK_TASKS_FILE")]
    tasks_file: Option<PathBuf>,

    /// Extra CORS origin; repeatable.
    #[arg(long = "allow-origin")]
    allow_origin: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let db_path = args.db.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".deepsk")
            .join("deepsk.db")
    });

    let config = ServerConfig {
        db_path,
        public_dir: args.public_dir,
        tasks_file: args.tasks_file,
        allowed_origins: args.allow_origin,
    };
    deepsk_server::serve(args.addr, config).await
}
