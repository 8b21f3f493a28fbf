//! In-process dispatch bus backed by per-subscriber `mpsc` channels.
//!
//! Unlike a broadcast channel, nothing is ever dropped: the bus keeps the
//! full publication history and replays it to late subscribers, and each
//! subscriber drains its own unbounded queue so a slow consumer never
//! blocks the publisher or its siblings.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// DispatchBus
// ---------------------------------------------------------------------------

struct BusInner<T> {
    history: Vec<T>,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

/// Replaying fan-out bus for one topic.
///
/// Shared via `Arc<DispatchBus<T>>`. The internal lock is never held
/// across an `.await`.
pub struct DispatchBus<T> {
    topic: &'static str,
    inner: Mutex<BusInner<T>>,
}

impl<T: Clone + Send + 'static> DispatchBus<T> {
    pub fn new(topic: &'static str) -> Self {
        Self {
            topic,
            inner: Mutex::new(BusInner {
                history: Vec::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Hand `item` to every current subscriber and record it for future ones.
    ///
    /// Never blocks. Subscribers whose receiver was dropped are forgotten.
    pub fn publish(&self, item: T) {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|tx| tx.send(item.clone()).is_ok());
        inner.history.push(item);
        tracing::trace!(topic = self.topic, published = inner.history.len(), "Item published");
    }

    /// Subscribe with a raw receiver.
    ///
    /// The receiver first yields every item published so far, in
    /// publication order, then every later item.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        for item in &inner.history {
            // The receiver is still in hand, so the send cannot fail.
            let _ = tx.send(item.clone());
        }
        inner.subscribers.push(tx);
        rx
    }

    /// Subscribe with a handler invoked once per item on a dedicated task.
    ///
    /// The delivery task stops when `cancel` fires or the bus is dropped.
    pub fn subscribe_with<F>(&self, cancel: CancellationToken, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let topic = self.topic;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(topic, "Dispatch subscriber cancelled");
                        break;
                    }
                    item = rx.recv() => match item {
                        Some(item) => handler(item),
                        None => {
                            tracing::debug!(topic, "Dispatch bus closed");
                            break;
                        }
                    },
                }
            }
        })
    }

    /// Number of items published so far.
    pub fn published(&self) -> usize {
        self.lock().history.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner<T>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
