//! Chat relay daemon
//!
//! Streams messages from an upstream chat room, micro-batches them into
//! count-or-time windows, and posts each aggregated batch to a webhook.
//! The supervision loop reconnects immediately on any disconnect or fault
//! and only stops when the shutdown gate trips (Ctrl-C).
//!
//! Usage:
//!   cargo run --release --bin chatrelay
//!
//! Environment variables:
//!   GITTER_TOKEN       - upstream bearer token (required)
//!   GITTER_ROOM_ID     - room to stream from (required)
//!   GITTER_STREAM_URL  - full upstream URL override (optional)
//!   SLACK_WEBHOOK_URL  - downstream webhook (required)
//!   WINDOW_MAX_ITEMS   - messages per window (default: 10)
//!   WINDOW_MAX_MS      - window duration in ms (default: 1000)

use chatrelay::config::RelayConfig;
use chatrelay::relay::{self, ShutdownGate};
use dotenv::dotenv;
use log::{error, info};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 Starting chat relay");

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("📊 Configuration:");
    info!("   ├─ Upstream: {}", config.stream_url);
    info!(
        "   └─ Window: {} items / {}ms",
        config.window_max_items, config.window_max_ms
    );

    // One shared client: the connection pool behind every upstream read and
    // every concurrent delivery.
    let client = reqwest::Client::new();

    let gate = ShutdownGate::new();
    let signal_gate = gate.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⚠️  Ctrl-C received, shutting down after current run");
            signal_gate.trigger();
        }
    });

    let run_gate = gate.clone();
    relay::supervise(gate, move || {
        let client = client.clone();
        let config = config.clone();
        let gate = run_gate.clone();
        async move { relay::run_pipeline(&client, &config, gate).await }
    })
    .await;

    info!("✅ Relay stopped");
}
