//! SSE connection driver.
//!
//! A [`Lifecycle`] runs one `connect` invocation to completion: it opens the
//! stream, feeds the body through the parser, reports every outcome to the
//! [`Dispatcher`], and reconnects with capped exponential backoff while the
//! live [`ReconnectState`] allows it.
//!
//! ```text
//! Idle ──► Connecting ──► Streaming ──► Disconnected ──► (stop)
//!              ▲                             │
//!              └──────── backoff delay ◄─────┘
//! ```
//!
//! The request, every body read and the backoff sleep all race against the
//! same [`CancellationToken`]; a cancelled token always ends the attempt as
//! [`DisconnectReason::Cancelled`] without an error notification.

use std::{
    sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    time::Duration,
};

use futures_util::StreamExt;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    config::SseConfig,
    dispatch::{DispatchReport, Dispatcher, Notification},
    error::SseError,
    parse::{EventStream, EventStreamError, Frame},
    reconnect::ReconnectPolicy,
    transport::{ByteStream, SseTransport, StreamRequest},
    types::{DisconnectReason, ErrorEvent, ErrorKind, ReconnectInfo},
};

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Driver state machine states. Private to the driver task; only logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Idle,
    Connecting,
    Streaming,
    Disconnected,
}

// ---------------------------------------------------------------------------
// Reconnect state
// ---------------------------------------------------------------------------

/// Live reconnect settings and counters.
///
/// Shared between the client handle and the driver task. Every field is an
/// atomic so mutators can run concurrently with a driver; values are read
/// fresh at each reconnect decision.
#[derive(Debug)]
pub(crate) struct ReconnectState {
    /// Written by `enable_auto_reconnect`/`disable_auto_reconnect`.
    auto_reconnect: AtomicBool,
    /// Milliseconds. Written by `enable_auto_reconnect` and by server
    /// `retry` directives (driver task).
    base_delay_ms: AtomicU64,
    /// Fixed at construction.
    max_delay: Duration,
    /// Written by `enable_auto_reconnect`. `0` = unlimited.
    max_attempts: AtomicU32,
    /// Written by the driver task, and by manual reconnect once no driver
    /// is running.
    attempt_count: AtomicU32,
}

fn duration_to_ms(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

impl ReconnectState {
    pub(crate) fn from_config(config: &SseConfig) -> Self {
        Self {
            auto_reconnect: AtomicBool::new(config.auto_reconnect),
            base_delay_ms: AtomicU64::new(duration_to_ms(config.reconnect_base_delay)),
            max_delay: config.reconnect_max_delay,
            max_attempts: AtomicU32::new(config.reconnect_max_attempts),
            attempt_count: AtomicU32::new(0),
        }
    }

    pub(crate) fn enable(&self, base_delay: Duration, max_attempts: u32) {
        self.base_delay_ms
            .store(duration_to_ms(base_delay), Ordering::Relaxed);
        self.max_attempts.store(max_attempts, Ordering::Relaxed);
        self.auto_reconnect.store(true, Ordering::Release);
    }

    pub(crate) fn disable(&self) {
        self.auto_reconnect.store(false, Ordering::Release);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.auto_reconnect.load(Ordering::Acquire)
    }

    pub(crate) fn set_base_delay(&self, delay: Duration) {
        self.base_delay_ms
            .store(duration_to_ms(delay), Ordering::Relaxed);
    }

    /// Snapshot of the current policy.
    pub(crate) fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms.load(Ordering::Relaxed)),
            max_delay: self.max_delay,
            max_attempts: self.max_attempts.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::Acquire)
    }

    pub(crate) fn reset_attempts(&self) {
        self.attempt_count.store(0, Ordering::Release);
    }

    /// Increment the attempt counter and return the new attempt number.
    fn next_attempt(&self) -> u32 {
        self.attempt_count.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Drives one `connect` invocation, including its reconnects.
pub(crate) struct Lifecycle<'a> {
    transport: &'a dyn SseTransport,
    dispatcher: &'a Dispatcher,
    reconnect: &'a ReconnectState,
    config: &'a SseConfig,
    cancel: CancellationToken,
    state: ConnectionState,
}

impl<'a> Lifecycle<'a> {
    pub(crate) fn new(
        transport: &'a dyn SseTransport,
        dispatcher: &'a Dispatcher,
        reconnect: &'a ReconnectState,
        config: &'a SseConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            reconnect,
            config,
            cancel,
            state: ConnectionState::Idle,
        }
    }

    /// Run until the connection stops for good: cancelled, reconnect
    /// disabled, or attempts exhausted.
    pub(crate) async fn run(mut self, url: &Url) {
        loop {
            let reason = self.attempt(url).await;
            self.transition(ConnectionState::Disconnected);
            info!(url = %url, reason = %reason, "SSE disconnected");
            self.notify(Notification::Disconnected(reason));

            let Some(delay) = self.schedule_reconnect(reason) else {
                return;
            };

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    debug!(url = %url, "SSE reconnect abandoned (cancelled)");
                    return;
                }
                () = sleep(delay) => {}
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = ?self.state, to = ?next, "SSE state transition");
        self.state = next;
    }

    fn notify(&self, notification: Notification) -> DispatchReport {
        self.dispatcher.dispatch(&notification)
    }

    /// Report an error and end the attempt with `reason`.
    fn fail(&self, reason: DisconnectReason, error: ErrorEvent) -> DisconnectReason {
        error!(kind = %error.kind, reason = %reason, "{}", error);
        self.notify(Notification::Error(error));
        reason
    }

    // --- Connecting ---

    async fn attempt(&mut self, url: &Url) -> DisconnectReason {
        self.transition(ConnectionState::Connecting);
        info!(url = %url, attempt = self.reconnect.attempt_count(), "SSE connecting");

        let request = StreamRequest::new(url.clone()).with_headers(&self.config.headers);
        let connect_timeout = self.config.connect_timeout;

        let opened = tokio::select! {
            biased;

            () = self.cancel.cancelled() => return DisconnectReason::Cancelled,
            res = timeout(connect_timeout, self.transport.open(request)) => res,
        };

        let response = match opened {
            Err(_elapsed) => {
                return self.fail(
                    DisconnectReason::Timeout,
                    ErrorEvent::new(ErrorKind::Timeout, format!("Connection to {url} timed out"))
                        .with_cause(SseError::timeout(connect_timeout)),
                );
            }
            Ok(Err(err)) if err.is_timeout() => {
                return self.fail(
                    DisconnectReason::Timeout,
                    ErrorEvent::new(ErrorKind::Timeout, format!("Connection to {url} timed out"))
                        .with_cause(err),
                );
            }
            Ok(Err(err)) => {
                return self.fail(
                    DisconnectReason::ConnectionFailed,
                    ErrorEvent::new(
                        ErrorKind::ConnectionError,
                        format!("Failed to connect to {url}"),
                    )
                    .with_cause(err),
                );
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status;
        if !status.is_success() {
            return self.fail(
                DisconnectReason::ServerError,
                ErrorEvent::new(
                    ErrorKind::InvalidUrl,
                    format!("Invalid response status: {}", status.as_u16()),
                )
                .with_cause(SseError::invalid_status(status)),
            );
        }

        if !response.is_event_stream() {
            let content_type = response.content_type.as_deref().unwrap_or("none");
            return self.fail(
                DisconnectReason::InvalidContentType,
                ErrorEvent::new(
                    ErrorKind::InvalidResponse,
                    format!("Invalid Content-Type: {content_type}"),
                )
                .with_cause(SseError::invalid_content_type(content_type)),
            );
        }

        info!(url = %url, status = status.as_u16(), "SSE connection established");
        self.notify(Notification::Connected);
        self.reconnect.reset_attempts();
        self.transition(ConnectionState::Streaming);

        self.stream(response.body).await
    }

    // --- Streaming ---

    async fn stream(&self, body: ByteStream) -> DisconnectReason {
        let mut events = EventStream::new(body);

        loop {
            let item = tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    info!("SSE connection closing (requested)");
                    return DisconnectReason::Cancelled;
                }
                item = events.next() => item,
            };

            match item {
                Some(Ok(Frame::Event(event))) => {
                    debug!(
                        event_type = %event.event_type,
                        id = ?event.id,
                        data_len = event.data.len(),
                        "SSE event received",
                    );
                    let report = self.notify(Notification::Message(event));
                    if let Some(message) = report.first_failure {
                        let line = events.lines_read();
                        self.notify(Notification::Error(
                            ErrorEvent::new(
                                ErrorKind::DataParseError,
                                format!("Message handler failed (line {line})"),
                            )
                            .with_cause(SseError::HandlerPanicked { message }),
                        ));
                    }
                }
                Some(Ok(Frame::Retry(delay))) => {
                    debug!(delay_ms = duration_to_ms(delay), "SSE retry directive");
                    self.reconnect.set_base_delay(delay);
                }
                Some(Err(err)) => {
                    if self.cancel.is_cancelled() {
                        return DisconnectReason::Cancelled;
                    }
                    let line = err.line();
                    let cause = match err {
                        EventStreamError::Transport { line, source } => {
                            SseError::stream_read(line, source.to_string())
                        }
                        EventStreamError::Utf8 { line, source } => {
                            SseError::stream_decode(line, source.to_string())
                        }
                    };
                    return self.fail(
                        DisconnectReason::UnexpectedError,
                        ErrorEvent::new(cause.kind(), format!("Stream read error (line {line})"))
                            .with_cause(cause),
                    );
                }
                None => {
                    warn!(lines = events.lines_read(), "SSE stream ended");
                    return DisconnectReason::StreamEnded;
                }
            }
        }
    }

    // --- Reconnect decision ---

    /// Decide whether to reconnect after `reason`; returns the delay to wait.
    fn schedule_reconnect(&self, reason: DisconnectReason) -> Option<Duration> {
        if reason.is_cancelled() || self.cancel.is_cancelled() {
            return None;
        }
        if !self.reconnect.is_enabled() {
            debug!("Auto-reconnect disabled, stopping");
            return None;
        }

        let policy = self.reconnect.policy();
        if !policy.should_attempt(self.reconnect.attempt_count()) {
            let err = SseError::AttemptsExhausted {
                max_attempts: policy.max_attempts,
            };
            error!(attempts = policy.max_attempts, "Max SSE reconnect attempts exceeded");
            self.notify(Notification::Error(
                ErrorEvent::new(ErrorKind::ConnectionError, err.to_string()).with_cause(err),
            ));
            return None;
        }

        let attempt = self.reconnect.next_attempt();
        let delay = policy.delay(attempt);
        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = duration_to_ms(delay),
            "SSE reconnecting after backoff"
        );
        self.notify(Notification::Reconnecting(ReconnectInfo {
            attempt,
            max_attempts: policy.max_attempts,
            delay,
        }));
        Some(delay)
    }
}
