//! Ordered fan-out of connection notifications to subscribers.
//!
//! Subscribers are kept in one list per notification kind and invoked
//! synchronously, in registration order, on the task that produced the
//! notification. Every invocation is isolated: a subscriber that panics is
//! logged and skipped, the remaining subscribers still run.
//!
//! # Example
//!
//! ```rust
//! use hpx_sse::{Dispatcher, Notification, parse::Event};
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.on_message(|event| println!("[{}] {}", event.event_type, event.data));
//!
//! let report = dispatcher.dispatch(&Notification::Message(Event::message("hi")));
//! assert_eq!(report.delivered, 1);
//! ```

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::{
    parse::Event,
    types::{DisconnectReason, ErrorEvent, ReconnectInfo},
};

type ConnectedFn = dyn Fn() + Send + Sync;
type DisconnectedFn = dyn Fn(DisconnectReason) + Send + Sync;
type ReconnectingFn = dyn Fn(&ReconnectInfo) + Send + Sync;
type MessageFn = dyn Fn(&Event) + Send + Sync;
type ErrorFn = dyn Fn(&ErrorEvent) + Send + Sync;

/// A notification produced by the connection driver.
#[derive(Clone, Debug)]
pub enum Notification {
    /// The stream was established.
    Connected,
    /// A connection attempt ended.
    Disconnected(DisconnectReason),
    /// A reconnect has been scheduled.
    Reconnecting(ReconnectInfo),
    /// An event was received.
    Message(Event),
    /// A fault was detected.
    Error(ErrorEvent),
}

impl Notification {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected(_) => "disconnected",
            Self::Reconnecting(_) => "reconnecting",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
        }
    }
}

/// Object-style subscriber: implement only the notifications you need.
///
/// Register with [`Dispatcher::subscribe`] or
/// [`SseClient::subscribe`](crate::SseClient::subscribe).
pub trait SseHandler: Send + Sync + 'static {
    /// Called when a connection is established (or re-established).
    fn on_connected(&self) {}

    /// Called when a connection attempt ends.
    fn on_disconnected(&self, _reason: DisconnectReason) {}

    /// Called before waiting out a reconnect delay.
    fn on_reconnecting(&self, _info: &ReconnectInfo) {}

    /// Called for every received event.
    fn on_message(&self, _event: &Event) {}

    /// Called when a fault is reported.
    fn on_error(&self, _error: &ErrorEvent) {}
}

/// Result of a single [`Dispatcher::dispatch`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers that returned normally.
    pub delivered: usize,
    /// Subscribers that panicked.
    pub failed: usize,
    /// Panic message of the first failing subscriber.
    pub first_failure: Option<String>,
}

impl DispatchReport {
    /// Returns `true` if every subscriber returned normally.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => self.delivered += 1,
            Err(message) => {
                self.failed += 1;
                self.first_failure.get_or_insert(message);
            }
        }
    }
}

#[derive(Default, Clone)]
struct Subscribers {
    connected: Vec<Arc<ConnectedFn>>,
    disconnected: Vec<Arc<DisconnectedFn>>,
    reconnecting: Vec<Arc<ReconnectingFn>>,
    message: Vec<Arc<MessageFn>>,
    error: Vec<Arc<ErrorFn>>,
}

/// Registry of subscribers with synchronous, isolated fan-out.
#[derive(Default)]
pub struct Dispatcher {
    /// Copy-on-write: registration replaces the lists, dispatch clones the `Arc`.
    subscribers: RwLock<Arc<Subscribers>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subs = self.subscribers.read();
        f.debug_struct("Dispatcher")
            .field("connected_count", &subs.connected.len())
            .field("disconnected_count", &subs.disconnected.len())
            .field("reconnecting_count", &subs.reconnecting.len())
            .field("message_count", &subs.message.len())
            .field("error_count", &subs.error.len())
            .finish()
    }
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, add: impl FnOnce(&mut Subscribers)) {
        let mut subs = self.subscribers.write();
        add(Arc::make_mut(&mut subs));
    }

    /// Subscribe to connection established notifications.
    pub fn on_connected<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(|subs| subs.connected.push(Arc::new(f)));
    }

    /// Subscribe to disconnect notifications.
    pub fn on_disconnected<F>(&self, f: F)
    where
        F: Fn(DisconnectReason) + Send + Sync + 'static,
    {
        self.register(|subs| subs.disconnected.push(Arc::new(f)));
    }

    /// Subscribe to reconnect notifications.
    pub fn on_reconnecting<F>(&self, f: F)
    where
        F: Fn(&ReconnectInfo) + Send + Sync + 'static,
    {
        self.register(|subs| subs.reconnecting.push(Arc::new(f)));
    }

    /// Subscribe to received events.
    pub fn on_message<F>(&self, f: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(|subs| subs.message.push(Arc::new(f)));
    }

    /// Subscribe to error notifications.
    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        self.register(|subs| subs.error.push(Arc::new(f)));
    }

    /// Register a handler for every notification kind at once.
    pub fn subscribe<H: SseHandler>(&self, handler: Arc<H>) {
        self.register(|subs| {
            let h = Arc::clone(&handler);
            subs.connected.push(Arc::new(move || h.on_connected()));
            let h = Arc::clone(&handler);
            subs.disconnected
                .push(Arc::new(move |reason| h.on_disconnected(reason)));
            let h = Arc::clone(&handler);
            subs.reconnecting
                .push(Arc::new(move |info: &ReconnectInfo| h.on_reconnecting(info)));
            let h = Arc::clone(&handler);
            subs.message
                .push(Arc::new(move |event: &Event| h.on_message(event)));
            subs.error
                .push(Arc::new(move |error: &ErrorEvent| handler.on_error(error)));
        });
    }

    /// Total number of registered subscriber callbacks.
    pub fn subscriber_count(&self) -> usize {
        let subs = self.subscribers.read();
        subs.connected.len()
            + subs.disconnected.len()
            + subs.reconnecting.len()
            + subs.message.len()
            + subs.error.len()
    }

    /// Deliver a notification to every subscriber of its kind.
    ///
    /// Delivery runs against a shared snapshot of the lists, so callbacks may
    /// register further subscribers without deadlocking; those see the next
    /// notification.
    pub fn dispatch(&self, notification: &Notification) -> DispatchReport {
        let name = notification.name();
        let snapshot = Arc::clone(&self.subscribers.read());
        let mut report = DispatchReport::default();

        match notification {
            Notification::Connected => {
                for f in &snapshot.connected {
                    report.record(invoke(name, || f()));
                }
            }
            Notification::Disconnected(reason) => {
                for f in &snapshot.disconnected {
                    report.record(invoke(name, || f(*reason)));
                }
            }
            Notification::Reconnecting(info) => {
                for f in &snapshot.reconnecting {
                    report.record(invoke(name, || f(info)));
                }
            }
            Notification::Message(event) => {
                for f in &snapshot.message {
                    report.record(invoke(name, || f(event)));
                }
            }
            Notification::Error(error) => {
                for f in &snapshot.error {
                    report.record(invoke(name, || f(error)));
                }
            }
        }

        trace!(
            notification = name,
            delivered = report.delivered,
            failed = report.failed,
            "Dispatched notification"
        );
        report
    }
}

fn invoke(notification: &'static str, f: impl FnOnce()) -> Result<(), String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(notification, panic = %message, "Subscriber panicked");
        message
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
