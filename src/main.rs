//! Tutor Bridge — realtime English-tutor WebSocket gateway.

use clap::Parser;
use tutor_bridge::server;

#[derive(Parser, Debug)]
#[command(name = "tutor-bridge", about = "Realtime voice-tutor WebSocket gateway")]
struct Cli {
    /// Address to bind the HTTP/WebSocket listener on.
    #[arg(long, env = "BRIDGE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind the HTTP/WebSocket listener on.
    #[arg(long, env = "BRIDGE_PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install Rustls crypto provider for outbound wss:// connections.
    // Required once multiple rustls-backed crates (reqwest, tokio-tungstenite)
    // share a process.
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    server::start(&cli.host, cli.port).await
}
