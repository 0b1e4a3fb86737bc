//! Subscription tracking and notification fan-out.
//!
//! Each coordinator has one notifying attribute. The gateway remembers
//! whether the peer subscribed to it and forwards state changes to the
//! transport through a [`NotificationSink`]. Delivery is fire-and-forget:
//! a notification that cannot be sent is simply dropped, the peer can
//! always read the current value.
//!
//! [`NotificationGateway::notify`] runs under the coordinator lock. A
//! transport whose own callbacks hold a lock while calling into the service
//! (NimBLE holds the characteristic mutex during reads and writes) must not
//! take that lock in `deliver`; wrap it in a [`QueuedSink`] instead.

use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// Which coordinator a notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorId {
    /// Scanning-mode attribute.
    Scan,
    /// Connection-state attribute.
    Connect,
}

impl CoordinatorId {
    fn index(self) -> usize {
        match self {
            Self::Scan => 0,
            Self::Connect => 1,
        }
    }
}

/// Transport-side receiver of notifications.
pub trait NotificationSink: Send {
    /// Push `payload` to the subscribed peer.
    fn deliver(&self, id: CoordinatorId, payload: &[u8]);
}

/// Per-coordinator subscription flags plus the outbound sink.
pub struct NotificationGateway {
    subscribed: [AtomicBool; 2],
    sink: Mutex<Option<Box<dyn NotificationSink>>>,
}

impl Default for NotificationGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationGateway {
    /// Create a gateway with no subscriptions and no sink attached.
    pub fn new() -> Self {
        Self {
            subscribed: [AtomicBool::new(false), AtomicBool::new(false)],
            sink: Mutex::new(None),
        }
    }

    /// Attach the transport sink, replacing any previous one.
    pub fn attach(&self, sink: Box<dyn NotificationSink>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn set_subscribed(&self, id: CoordinatorId, enabled: bool) {
        debug!("{:?} notifications {}", id, if enabled { "on" } else { "off" });
        self.subscribed[id.index()].store(enabled, Ordering::SeqCst);
    }

    pub fn is_subscribed(&self, id: CoordinatorId) -> bool {
        self.subscribed[id.index()].load(Ordering::SeqCst)
    }

    /// Deliver `payload` if the peer is subscribed and a sink is attached.
    ///
    /// Returns whether the payload was handed to the sink.
    pub fn notify(&self, id: CoordinatorId, payload: &[u8]) -> bool {
        if !self.is_subscribed(id) {
            return false;
        }
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.as_ref() {
            Some(sink) => {
                sink.deliver(id, payload);
                true
            }
            None => {
                debug!("Dropped {:?} notification: no sink attached", id);
                false
            }
        }
    }
}

/// Sink that hands notifications to a dedicated delivery thread.
///
/// `deliver` only enqueues, so it never blocks the coordinator. The queue is
/// FIFO, so notifications reach the wrapped sink in state order. The thread
/// exits when the `QueuedSink` is dropped.
pub struct QueuedSink {
    queue: mpsc::UnboundedSender<(CoordinatorId, Vec<u8>)>,
}

impl QueuedSink {
    /// Start the delivery thread for `sink`.
    pub fn spawn<S>(sink: S) -> std::io::Result<Self>
    where
        S: NotificationSink + 'static,
    {
        let (queue, mut pending) = mpsc::unbounded_channel::<(CoordinatorId, Vec<u8>)>();
        std::thread::Builder::new()
            .name("notify".into())
            .spawn(move || {
                while let Some((id, payload)) = pending.blocking_recv() {
                    sink.deliver(id, &payload);
                }
                debug!("Notification queue closed");
            })?;
        Ok(Self { queue })
    }
}

impl NotificationSink for QueuedSink {
    fn deliver(&self, id: CoordinatorId, payload: &[u8]) {
        if self.queue.send((id, payload.to_vec())).is_err() {
            debug!("Dropped {:?} notification: delivery thread gone", id);
        }
    }
}
