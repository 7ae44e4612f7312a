//! Storage node entry point
//!
//! Runs one content-addressed shard blob store over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shardvault::node::{server, ShardStore};

#[derive(Parser)]
#[command(name = "storage-node", about = "shardvault storage node")]
struct Args {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Bind port
    #[arg(long, env = "NODE_PORT", default_value_t = 8001)]
    port: u16,

    /// Directory to keep shards in
    #[arg(long, env = "NODE_DATA_DIR", default_value = "storage")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let store = ShardStore::open(&args.data_dir).expect("failed to open shard store");
    tracing::info!(dir = %args.data_dir.display(), "shard store opened");

    let app = server::router(Arc::new(store));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .expect("failed to parse bind address");
    tracing::info!("storage node listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind TCP listener");
    axum::serve(listener, app).await.expect("server failed");
}
