//! SSE Stream Example
//!
//! Connects to an SSE endpoint and prints every notification until Ctrl-C.
//!
//! Run with: `cargo run -p hpx-sse --example sse_stream -- http://localhost:8080/events`
//!
//! Set `RUST_LOG=hpx_sse=debug` to see connection state transitions.

use std::time::Duration;

use clap::Parser;
use hpx_sse::{CancellationToken, SseClient, SseConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Stream Server-Sent Events to stdout")]
struct Args {
    /// SSE endpoint URL.
    url: String,

    /// Base reconnect delay in milliseconds.
    #[arg(long, default_value_t = 1000)]
    base_delay_ms: u64,

    /// Maximum consecutive reconnect attempts (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    max_attempts: u32,

    /// Exit after the first disconnect instead of reconnecting.
    #[arg(long)]
    no_reconnect: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let client = SseClient::new(SseConfig::new().user_agent("hpx-sse-example"))?;
    if !args.no_reconnect {
        client.enable_auto_reconnect(Duration::from_millis(args.base_delay_ms), args.max_attempts)?;
    }

    println!("{}", client.process_info());

    client.on_connected(|| println!("[connected]"));
    client.on_disconnected(|reason| println!("[disconnected] {reason}"));
    client.on_reconnecting(|info| {
        println!(
            "[reconnecting] attempt {} of {} in {:?}",
            info.attempt,
            if info.max_attempts == 0 {
                "unlimited".to_string()
            } else {
                info.max_attempts.to_string()
            },
            info.delay
        );
    });
    client.on_message(|event| match &event.id {
        Some(id) => println!("[{}#{}] {}", event.event_type, id, event.data),
        None => println!("[{}] {}", event.event_type, event.data),
    });
    client.on_error(|error| eprintln!("[error] {error}"));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    client.connect_with_cancel(&args.url, cancel).await?;
    Ok(())
}
