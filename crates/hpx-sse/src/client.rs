//! The SSE client handle.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::SseConfig,
    connection::{Lifecycle, ReconnectState},
    dispatch::{Dispatcher, SseHandler},
    error::{SseError, SseResult},
    parse::Event,
    reconnect::ReconnectPolicy,
    transport::{HttpTransport, SseTransport},
    types::{DisconnectReason, ErrorEvent, ReconnectInfo},
};

/// Server-Sent Events client with automatic reconnection.
///
/// A client owns at most one active connection. [`connect`](Self::connect)
/// drives that connection on the calling task and returns once it stops for
/// good; [`disconnect`](Self::disconnect) may be called from any other task
/// or from inside a subscriber. The handle is cheap to clone; clones share
/// the same connection and subscribers.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use hpx_sse::{SseClient, SseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = SseClient::new(SseConfig::default())?;
///     client.enable_auto_reconnect(Duration::from_secs(1), 5)?;
///
///     client.on_message(|event| println!("[{}] {}", event.event_type, event.data));
///     client.on_error(|error| eprintln!("{error}"));
///
///     client.connect("http://localhost:8080/events").await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: SseConfig,
    transport: Arc<dyn SseTransport>,
    dispatcher: Dispatcher,
    reconnect: ReconnectState,
    /// Last URL passed to a successful `connect` call.
    current_url: Mutex<Option<Url>>,
    /// Token of the running connection; `Some` exactly while one runs.
    active: Mutex<Option<CancellationToken>>,
    /// Mirrors `active.is_some()` so callers can await wind-down.
    running: watch::Sender<bool>,
    process_info: String,
}

/// Clears the active slot when a `connect` call finishes, however it ends.
struct ActiveGuard<'a> {
    inner: &'a ClientInner,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        *self.inner.active.lock() = None;
        self.inner.running.send_replace(false);
    }
}

impl std::fmt::Debug for SseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseClient")
            .field("url", &self.current_url())
            .field("connected", &self.is_connected())
            .field("auto_reconnect", &self.is_auto_reconnect_enabled())
            .field("attempt_count", &self.attempt_count())
            .finish_non_exhaustive()
    }
}

impl SseClient {
    /// Create a client that uses the default HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::Config`] if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: SseConfig) -> SseResult<Self> {
        config.validate().map_err(SseError::config)?;
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, transport)
    }

    /// Create a client on top of a custom transport.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::Config`] if the configuration is invalid.
    pub fn with_transport<T: SseTransport>(config: SseConfig, transport: T) -> SseResult<Self> {
        config.validate().map_err(SseError::config)?;
        let (running, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(ClientInner {
                reconnect: ReconnectState::from_config(&config),
                config,
                transport: Arc::new(transport),
                dispatcher: Dispatcher::new(),
                current_url: Mutex::new(None),
                active: Mutex::new(None),
                running,
                process_info: describe_process(),
            }),
        })
    }

    // --- Connection control ---

    /// Connect to `url` and stream events until the connection stops for
    /// good.
    ///
    /// All outcomes after the call is accepted are reported through
    /// notifications; the returned future resolves once the connection has
    /// been cancelled, auto-reconnect is off, or attempts are exhausted.
    ///
    /// # Errors
    ///
    /// - [`SseError::AlreadyConnected`] if a connection is already active.
    /// - [`SseError::InvalidUrl`] if `url` is not an absolute http(s) URL.
    pub async fn connect(&self, url: &str) -> SseResult<()> {
        self.connect_with_cancel(url, CancellationToken::new()).await
    }

    /// Like [`connect`](Self::connect), but the connection also stops when
    /// `cancel` is cancelled.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub async fn connect_with_cancel(&self, url: &str, cancel: CancellationToken) -> SseResult<()> {
        let token = cancel.child_token();
        let (url, _guard) = {
            let mut active = self.inner.active.lock();
            if active.is_some() {
                warn!(url, "SSE connect rejected: already connected");
                return Err(SseError::AlreadyConnected);
            }
            let url = parse_url(url)?;
            *self.inner.current_url.lock() = Some(url.clone());
            *active = Some(token.clone());
            self.inner.running.send_replace(true);
            (
                url,
                ActiveGuard {
                    inner: &self.inner,
                },
            )
        };

        let inner = &*self.inner;
        Lifecycle::new(
            inner.transport.as_ref(),
            &inner.dispatcher,
            &inner.reconnect,
            &inner.config,
            token,
        )
        .run(&url)
        .await;

        debug!(url = %url, "SSE connect finished");
        Ok(())
    }

    /// Request the active connection to stop. No-op when idle.
    ///
    /// The connection winds down asynchronously and ends with a
    /// [`DisconnectReason::Cancelled`] notification; no reconnect follows.
    pub fn disconnect(&self) {
        if let Some(token) = self.inner.active.lock().as_ref() {
            info!("SSE disconnect requested");
            token.cancel();
        }
    }

    /// Disconnect, wait for the connection to wind down, then connect again
    /// to the last URL with a fresh attempt count.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::InvalidOperation`] if `connect` was never called,
    /// otherwise the errors of [`connect`](Self::connect).
    pub async fn reconnect(&self) -> SseResult<()> {
        let url = self
            .inner
            .current_url
            .lock()
            .clone()
            .ok_or_else(|| SseError::invalid_operation("no URL to reconnect to"))?;

        info!(url = %url, "SSE manual reconnect");
        self.disconnect();

        let mut running = self.inner.running.subscribe();
        if running.wait_for(|running| !running).await.is_err() {
            return Err(SseError::invalid_operation(
                "client closed while waiting for the connection to stop",
            ));
        }

        tokio::time::sleep(self.inner.config.reconnect_settle_delay).await;
        self.inner.reconnect.reset_attempts();
        self.connect(url.as_str()).await
    }

    // --- Reconnect settings ---

    /// Turn on automatic reconnection. Takes effect at the next reconnect
    /// decision, including on an already running connection.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::Config`] if `base_delay` is zero or exceeds the
    /// configured maximum delay; the current settings are left unchanged.
    pub fn enable_auto_reconnect(&self, base_delay: Duration, max_attempts: u32) -> SseResult<()> {
        ReconnectPolicy {
            base_delay,
            max_attempts,
            ..self.inner.reconnect.policy()
        }
        .validate()
        .map_err(SseError::config)?;

        debug!(?base_delay, max_attempts, "SSE auto-reconnect enabled");
        self.inner.reconnect.enable(base_delay, max_attempts);
        Ok(())
    }

    /// Turn off automatic reconnection.
    pub fn disable_auto_reconnect(&self) {
        debug!("SSE auto-reconnect disabled");
        self.inner.reconnect.disable();
    }

    /// Whether automatic reconnection is on.
    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.inner.reconnect.is_enabled()
    }

    /// Current base reconnect delay, including any server `retry` override.
    pub fn reconnect_base_delay(&self) -> Duration {
        self.inner.reconnect.policy().base_delay
    }

    /// Reconnect attempts since the last successful connection.
    pub fn attempt_count(&self) -> u32 {
        self.inner.reconnect.attempt_count()
    }

    // --- Introspection ---

    /// Whether a connection is active and has not been asked to stop.
    ///
    /// This stays `true` while the driver waits out a reconnect backoff,
    /// since the connection remains owned by the running `connect` call and
    /// a second `connect` would still be rejected.
    pub fn is_connected(&self) -> bool {
        self.inner
            .active
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// The last URL passed to `connect`.
    pub fn current_url(&self) -> Option<String> {
        self.inner.current_url.lock().as_ref().map(Url::to_string)
    }

    /// Name, PID and executable path of the hosting process.
    pub fn process_info(&self) -> &str {
        &self.inner.process_info
    }

    /// The client configuration.
    pub fn config(&self) -> &SseConfig {
        &self.inner.config
    }

    // --- Subscriptions ---

    /// The dispatcher that fans notifications out to subscribers.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Subscribe to connection established notifications.
    pub fn on_connected<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_connected(f);
    }

    /// Subscribe to disconnect notifications.
    pub fn on_disconnected<F>(&self, f: F)
    where
        F: Fn(DisconnectReason) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_disconnected(f);
    }

    /// Subscribe to reconnect notifications.
    pub fn on_reconnecting<F>(&self, f: F)
    where
        F: Fn(&ReconnectInfo) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_reconnecting(f);
    }

    /// Subscribe to received events.
    pub fn on_message<F>(&self, f: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_message(f);
    }

    /// Subscribe to error notifications.
    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on_error(f);
    }

    /// Register a handler for every notification kind.
    pub fn subscribe<H: SseHandler>(&self, handler: Arc<H>) {
        self.inner.dispatcher.subscribe(handler);
    }
}

fn parse_url(raw: &str) -> SseResult<Url> {
    let url = Url::parse(raw).map_err(|e| SseError::invalid_url(raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SseError::invalid_url(
            raw,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

fn describe_process() -> String {
    match std::env::current_exe() {
        Ok(path) => {
            let pid = std::process::id();
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string());
            format!("Process: {name} (PID: {pid}) | Path: {}", path.display())
        }
        Err(e) => format!("Process info error: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::transport::{StreamRequest, StreamResponse};

    struct Unreachable;

    #[async_trait]
    impl SseTransport for Unreachable {
        async fn open(&self, _request: StreamRequest) -> SseResult<StreamResponse> {
            Err(SseError::connect("unreachable", None))
        }
    }

    fn client() -> SseClient {
        SseClient::with_transport(SseConfig::new(), Unreachable).expect("client")
    }

    #[test]
    fn url_validation() {
        assert!(parse_url("http://localhost:8080/events").is_ok());
        assert!(parse_url("https://example.com/sse").is_ok());
        assert!(matches!(
            parse_url("not a url"),
            Err(SseError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_url("ftp://example.com/events"),
            Err(SseError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SseConfig::new().connect_timeout(Duration::ZERO);
        let err = SseClient::with_transport(config, Unreachable).expect_err("invalid");
        assert!(matches!(err, SseError::Config { .. }));
    }

    #[test]
    fn process_info_names_pid() {
        let client = client();
        assert!(
            client
                .process_info()
                .contains(&std::process::id().to_string())
        );
    }

    #[test]
    fn auto_reconnect_toggles() {
        let client = client();
        assert!(!client.is_auto_reconnect_enabled());

        client
            .enable_auto_reconnect(Duration::from_millis(200), 3)
            .expect("valid policy");
        assert!(client.is_auto_reconnect_enabled());
        assert_eq!(client.reconnect_base_delay(), Duration::from_millis(200));

        client.disable_auto_reconnect();
        assert!(!client.is_auto_reconnect_enabled());
    }

    #[test]
    fn invalid_live_policy_is_rejected() {
        let client = client();

        let err = client
            .enable_auto_reconnect(Duration::ZERO, 0)
            .expect_err("zero base delay");
        assert!(matches!(err, SseError::Config { .. }));

        let above_max = client.config().reconnect_max_delay + Duration::from_secs(1);
        let err = client
            .enable_auto_reconnect(above_max, 0)
            .expect_err("base above max delay");
        assert!(matches!(err, SseError::Config { .. }));

        assert!(!client.is_auto_reconnect_enabled());
        assert_eq!(client.reconnect_base_delay(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalid_url_leaves_client_idle() {
        let client = client();
        let err = client.connect("::bad::").await.expect_err("invalid url");
        assert!(matches!(err, SseError::InvalidUrl { .. }));
        assert!(!client.is_connected());
        assert!(client.current_url().is_none());
    }

    #[tokio::test]
    async fn reconnect_without_url_is_invalid() {
        let err = client().reconnect().await.expect_err("no url");
        assert!(matches!(err, SseError::InvalidOperation { .. }));
    }

    #[tokio::test]
    async fn failed_connect_returns_to_idle() {
        let client = client();
        client.connect("http://127.0.0.1:1/events").await.expect("accepted");
        assert!(!client.is_connected());
        assert_eq!(
            client.current_url().as_deref(),
            Some("http://127.0.0.1:1/events")
        );
    }

    #[tokio::test]
    async fn reconnect_after_stop_reuses_last_url() {
        let config = SseConfig::new().reconnect_settle_delay(Duration::from_millis(5));
        let client = SseClient::with_transport(config, Unreachable).expect("client");
        let failures = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        client.on_disconnected(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        client.connect("http://127.0.0.1:1/events").await.expect("accepted");
        client.reconnect().await.expect("reconnect");

        assert_eq!(failures.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(client.attempt_count(), 0);
        assert!(!client.is_connected());
    }

    #[test]
    fn disconnect_when_idle_is_noop() {
        let client = client();
        client.disconnect();
        assert!(!client.is_connected());
    }
}
