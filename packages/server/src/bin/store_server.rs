//! Shared store service for multi-instance deployments.
//!
//! Game servers started with `--store-url` replicate room snapshots, publish
//! room events and take the room-code lock through this service.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin gridword-store
//! cargo run --bin gridword-server -- --store-url http://127.0.0.1:6380
//! ```

use std::sync::Arc;

use clap::Parser;
use gridword_server::{infrastructure::store::InMemoryStore, ui::StoreServer};
use gridword_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "gridword-store")]
#[command(about = "Shared store service for gridword game servers", long_about = None)]
struct Args {
    /// Host address to bind the service to
    #[arg(short = 'H', long, env = "GRIDWORD_STORE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the service to
    #[arg(short = 'p', long, env = "GRIDWORD_STORE_PORT", default_value = "6380")]
    port: u16,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "GRIDWORD_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_BIN_NAME"),
        &args.log_level,
    );

    let server = StoreServer::new(Arc::new(InMemoryStore::new()));
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Store service error: {}", e);
        std::process::exit(1);
    }
}
