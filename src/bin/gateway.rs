//! Gateway entry point
//!
//! Loads configuration from the environment, builds the orchestrator, and
//! serves the public REST API.

use std::net::SocketAddr;
use std::process;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shardvault::config::Config;
use shardvault::gateway;
use shardvault::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "gateway", about = "shardvault gateway server")]
struct Args {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Bind port
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,
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

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::error!("configuration error: {e}");
        process::exit(1);
    });
    let orchestrator = Orchestrator::new(config).unwrap_or_else(|e| {
        tracing::error!("failed to initialise orchestrator: {e}");
        process::exit(1);
    });

    let app = gateway::router(orchestrator);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .expect("failed to parse bind address");
    tracing::info!("gateway listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind TCP listener");
    axum::serve(listener, app).await.expect("server failed");
}
