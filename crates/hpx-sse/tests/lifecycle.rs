//! Lifecycle tests against a scripted in-memory transport.
//!
//! These cover timing- and fault-driven paths (timeouts, broken bodies,
//! attempt limits, cancellation during backoff) without a network.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use hpx_sse::{
    CancellationToken, DisconnectReason, ErrorKind, SseClient, SseConfig, SseError, SseResult,
    SseTransport, StreamRequest, StreamResponse, error::BoxError,
};
use http::StatusCode;
use tokio::time::timeout;

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

enum Step {
    /// Fail before headers with a connection error.
    Refuse,
    /// Fail before headers with a timeout error.
    TimedOut,
    /// Never produce headers.
    Hang,
    /// 200 `text/event-stream` with the given body chunks.
    Body(Vec<Result<&'static str, &'static str>>),
    /// 200 `text/event-stream` with a single raw chunk.
    Raw(&'static [u8]),
}

struct Scripted {
    steps: Mutex<VecDeque<Step>>,
    opens: Arc<AtomicUsize>,
}

impl Scripted {
    /// Returns the transport and a counter of `open` calls. Once the script
    /// runs out every further open is refused.
    fn new(steps: Vec<Step>) -> (Self, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        (
            Self {
                steps: Mutex::new(steps.into()),
                opens: Arc::clone(&opens),
            },
            opens,
        )
    }
}

#[async_trait]
impl SseTransport for Scripted {
    async fn open(&self, _request: StreamRequest) -> SseResult<StreamResponse> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .expect("lock steps")
            .pop_front()
            .unwrap_or(Step::Refuse);

        match step {
            Step::Refuse => Err(SseError::connect("connection refused", None)),
            Step::TimedOut => Err(SseError::timeout(Duration::from_secs(1))),
            Step::Hang => std::future::pending().await,
            Step::Body(chunks) => {
                let body = stream::iter(chunks.into_iter().map(|chunk| {
                    chunk
                        .map(|text| Bytes::from_static(text.as_bytes()))
                        .map_err(BoxError::from)
                }))
                .boxed();
                Ok(event_stream(body))
            }
            Step::Raw(chunk) => {
                let body = stream::iter([Ok::<_, BoxError>(Bytes::from_static(chunk))]).boxed();
                Ok(event_stream(body))
            }
        }
    }
}

fn event_stream(body: hpx_sse::transport::ByteStream) -> StreamResponse {
    StreamResponse::new(StatusCode::OK, Some("text/event-stream".to_string()), body)
}

// ---------------------------------------------------------------------------
// Notification recorder
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Seen {
    Connected,
    Disconnected(DisconnectReason),
    Reconnecting(u32, u32),
    Message(String),
    Error(ErrorKind, String),
}

fn record(client: &SseClient) -> Arc<Mutex<Vec<Seen>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&seen);
    client.on_connected(move || log.lock().expect("lock").push(Seen::Connected));
    let log = Arc::clone(&seen);
    client.on_disconnected(move |reason| {
        log.lock().expect("lock").push(Seen::Disconnected(reason));
    });
    let log = Arc::clone(&seen);
    client.on_reconnecting(move |info| {
        log.lock()
            .expect("lock")
            .push(Seen::Reconnecting(info.attempt, info.max_attempts));
    });
    let log = Arc::clone(&seen);
    client.on_message(move |event| {
        log.lock()
            .expect("lock")
            .push(Seen::Message(event.data.clone()));
    });
    let log = Arc::clone(&seen);
    client.on_error(move |error| {
        log.lock()
            .expect("lock")
            .push(Seen::Error(error.kind, error.message.clone()));
    });

    seen
}

fn snapshot(seen: &Arc<Mutex<Vec<Seen>>>) -> Vec<Seen> {
    seen.lock().expect("lock").clone()
}

async fn run(client: &SseClient) {
    timeout(Duration::from_secs(5), client.connect("http://sse.test/events"))
        .await
        .expect("connect did not finish")
        .expect("connect");
}

// ---------------------------------------------------------------------------
// Attempt limits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_max_attempts_stops_after_limit() {
    let (transport, opens) = Scripted::new(vec![]);
    let config = SseConfig::new()
        .auto_reconnect(true)
        .reconnect_base_delay(Duration::from_millis(5))
        .reconnect_max_attempts(2);
    let client = SseClient::with_transport(config, transport).expect("client");
    let seen = record(&client);

    run(&client).await;

    let refused = Seen::Error(
        ErrorKind::ConnectionError,
        "Failed to connect to http://sse.test/events".to_string(),
    );
    assert_eq!(
        snapshot(&seen),
        vec![
            refused.clone(),
            Seen::Disconnected(DisconnectReason::ConnectionFailed),
            Seen::Reconnecting(1, 2),
            refused.clone(),
            Seen::Disconnected(DisconnectReason::ConnectionFailed),
            Seen::Reconnecting(2, 2),
            refused,
            Seen::Disconnected(DisconnectReason::ConnectionFailed),
            Seen::Error(
                ErrorKind::ConnectionError,
                "Maximum reconnect attempts (2) reached".to_string()
            ),
        ]
    );
    assert_eq!(opens.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unlimited_attempts_until_disconnect() {
    let (transport, opens) = Scripted::new(vec![]);
    let config = SseConfig::new()
        .auto_reconnect(true)
        .reconnect_base_delay(Duration::from_millis(1))
        .reconnect_max_attempts(0);
    let client = SseClient::with_transport(config, transport).expect("client");
    let seen = record(&client);

    let handle = client.clone();
    client.on_reconnecting(move |info| {
        if info.attempt == 5 {
            handle.disconnect();
        }
    });

    run(&client).await;

    let attempts: Vec<u32> = snapshot(&seen)
        .iter()
        .filter_map(|s| match s {
            Seen::Reconnecting(attempt, 0) => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    assert_eq!(opens.load(Ordering::SeqCst), 5);
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_timeout_elapses() {
    let (transport, _) = Scripted::new(vec![Step::Hang]);
    let config = SseConfig::new().connect_timeout(Duration::from_millis(50));
    let client = SseClient::with_transport(config, transport).expect("client");
    let seen = record(&client);

    run(&client).await;

    let seen = snapshot(&seen);
    assert_eq!(seen.len(), 2, "{seen:?}");
    assert!(matches!(&seen[0], Seen::Error(ErrorKind::Timeout, msg) if msg.contains("timed out")));
    assert_eq!(seen[1], Seen::Disconnected(DisconnectReason::Timeout));
}

#[tokio::test]
async fn test_transport_timeout_is_reported_as_timeout() {
    let (transport, _) = Scripted::new(vec![Step::TimedOut]);
    let client = SseClient::with_transport(SseConfig::new(), transport).expect("client");
    let seen = record(&client);

    run(&client).await;

    let seen = snapshot(&seen);
    assert!(matches!(&seen[0], Seen::Error(ErrorKind::Timeout, _)));
    assert_eq!(seen[1], Seen::Disconnected(DisconnectReason::Timeout));
}

// ---------------------------------------------------------------------------
// Body faults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_body_read_error_mid_stream() {
    let (transport, _) = Scripted::new(vec![Step::Body(vec![
        Ok("data: a\n\ndata: par"),
        Err("connection reset"),
    ])]);
    let client = SseClient::with_transport(SseConfig::new(), transport).expect("client");
    let seen = record(&client);

    run(&client).await;

    let seen = snapshot(&seen);
    assert_eq!(seen[..2], [Seen::Connected, Seen::Message("a".to_string())]);
    assert!(
        matches!(&seen[2], Seen::Error(ErrorKind::StreamReadError, msg) if msg.contains("line 3")),
        "{seen:?}"
    );
    assert_eq!(seen[3], Seen::Disconnected(DisconnectReason::UnexpectedError));
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_invalid_utf8_is_stream_error() {
    let (transport, _) = Scripted::new(vec![Step::Raw(b"data: \xff\xfe\n\n")]);
    let client = SseClient::with_transport(SseConfig::new(), transport).expect("client");
    let seen = record(&client);

    run(&client).await;

    let seen = snapshot(&seen);
    assert_eq!(seen[0], Seen::Connected);
    assert!(matches!(&seen[1], Seen::Error(ErrorKind::StreamError, _)), "{seen:?}");
    assert_eq!(seen[2], Seen::Disconnected(DisconnectReason::UnexpectedError));
}

#[tokio::test]
async fn test_chunk_boundaries_do_not_matter() {
    let (transport, _) = Scripted::new(vec![Step::Body(vec![
        Ok("da"),
        Ok("ta: hel"),
        Ok("lo\r"),
        Ok("\n\r\ndata: second\r"),
        Ok("\r"),
    ])]);
    let client = SseClient::with_transport(SseConfig::new(), transport).expect("client");
    let seen = record(&client);

    run(&client).await;

    assert_eq!(
        snapshot(&seen),
        vec![
            Seen::Connected,
            Seen::Message("hello".to_string()),
            Seen::Message("second".to_string()),
            Seen::Disconnected(DisconnectReason::StreamEnded),
        ]
    );
}

// ---------------------------------------------------------------------------
// Subscriber isolation and live settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_panicking_subscriber_is_isolated() {
    let (transport, _) = Scripted::new(vec![Step::Body(vec![Ok("data: a\n\ndata: b\n\n")])]);
    let client = SseClient::with_transport(SseConfig::new(), transport).expect("client");

    client.on_message(|event| {
        if event.data == "a" {
            panic!("subscriber failure");
        }
    });
    let seen = record(&client);

    run(&client).await;

    let seen = snapshot(&seen);
    assert_eq!(seen[0], Seen::Connected);
    assert_eq!(seen[1], Seen::Message("a".to_string()));
    assert!(matches!(&seen[2], Seen::Error(ErrorKind::DataParseError, _)), "{seen:?}");
    assert_eq!(seen[3], Seen::Message("b".to_string()));
    assert_eq!(seen[4], Seen::Disconnected(DisconnectReason::StreamEnded));
}

#[tokio::test]
async fn test_disable_reconnect_from_subscriber() {
    let (transport, opens) = Scripted::new(vec![]);
    let config = SseConfig::new()
        .auto_reconnect(true)
        .reconnect_base_delay(Duration::from_millis(1));
    let client = SseClient::with_transport(config, transport).expect("client");
    let seen = record(&client);

    let handle = client.clone();
    client.on_disconnected(move |_| handle.disable_auto_reconnect());

    run(&client).await;

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(
        !snapshot(&seen)
            .iter()
            .any(|s| matches!(s, Seen::Reconnecting(..)))
    );
}

#[tokio::test]
async fn test_parent_token_cancels_backoff() {
    let (transport, opens) = Scripted::new(vec![]);
    let config = SseConfig::new()
        .auto_reconnect(true)
        .reconnect_base_delay(Duration::from_secs(30));
    let client = SseClient::with_transport(config, transport).expect("client");
    let seen = record(&client);

    let parent = CancellationToken::new();
    let trigger = parent.clone();
    client.on_reconnecting(move |_| trigger.cancel());

    timeout(
        Duration::from_secs(5),
        client.connect_with_cancel("http://sse.test/events", parent),
    )
    .await
    .expect("backoff was not cancelled")
    .expect("connect");

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(
        snapshot(&seen).last(),
        Some(&Seen::Reconnecting(1, 0))
    );
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_disconnect_while_awaiting_headers() {
    let (transport, opens) = Scripted::new(vec![Step::Hang]);
    let config = SseConfig::new()
        .auto_reconnect(true)
        .reconnect_base_delay(Duration::from_millis(1));
    let client = SseClient::with_transport(config, transport).expect("client");
    let seen = record(&client);

    let stopper = client.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.disconnect();
    });

    timeout(Duration::from_secs(2), client.connect("http://sse.test/events"))
        .await
        .expect("pending request was not cancelled")
        .expect("connect");

    assert_eq!(
        snapshot(&seen),
        vec![Seen::Disconnected(DisconnectReason::Cancelled)]
    );
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_is_connected_during_backoff() {
    let (transport, _) = Scripted::new(vec![]);
    let config = SseConfig::new()
        .auto_reconnect(true)
        .reconnect_base_delay(Duration::from_millis(1))
        .reconnect_max_attempts(1);
    let client = SseClient::with_transport(config, transport).expect("client");

    let during_backoff = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&during_backoff);
    let handle = client.clone();
    client.on_reconnecting(move |_| log.lock().expect("lock").push(handle.is_connected()));

    run(&client).await;

    assert_eq!(*during_backoff.lock().expect("lock"), vec![true]);
    assert!(!client.is_connected());
}
