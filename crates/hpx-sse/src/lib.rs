//! # hpx-sse
//!
//! Reconnecting Server-Sent Events client.
//!
//! This crate opens a long-lived HTTP GET against an SSE endpoint, parses the
//! `text/event-stream` body into events, and fans every event and lifecycle
//! change out to registered subscribers in order. Dropped connections are
//! re-established with capped exponential backoff.
//!
//! ## Features
//!
//! - **Incremental parsing**: events are dispatched as soon as their
//!   terminating blank line arrives, regardless of chunk boundaries
//! - **Automatic reconnection**: exponential backoff with a cap, an optional
//!   attempt limit, and server `retry:` overrides
//! - **Ordered dispatch**: subscribers run synchronously in registration
//!   order; a panicking subscriber never stops the others
//! - **Cooperative cancellation**: every wait races a [`CancellationToken`]
//! - **Pluggable transport**: [`SseTransport`] abstracts the HTTP layer;
//!   [`HttpTransport`] is the default
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use hpx_sse::{DisconnectReason, SseClient, SseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SseConfig::new()
//!         .auto_reconnect(true)
//!         .reconnect_base_delay(Duration::from_secs(1))
//!         .reconnect_max_attempts(5);
//!     let client = SseClient::new(config)?;
//!
//!     client.on_message(|event| println!("[{}] {}", event.event_type, event.data));
//!     client.on_disconnected(|reason| {
//!         if reason != DisconnectReason::Cancelled {
//!             eprintln!("disconnected: {reason}");
//!         }
//!     });
//!
//!     client.connect("https://example.com/events").await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod connection;
pub mod dispatch;
pub mod error;
pub mod parse;
pub mod reconnect;
pub mod transport;
pub mod types;

pub use client::SseClient;
pub use config::SseConfig;
pub use dispatch::{DispatchReport, Dispatcher, Notification, SseHandler};
pub use error::{SseError, SseResult};
pub use parse::{Event, EventStream, Frame};
pub use reconnect::ReconnectPolicy;
pub use tokio_util::sync::CancellationToken;
pub use transport::{HttpTransport, SseTransport, StreamRequest, StreamResponse};
pub use types::{DisconnectReason, ErrorEvent, ErrorKind, ReconnectInfo};
