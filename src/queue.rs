//! The bounded, ordered channel connecting the matching engine to the
//! background persister. Single consumer; in practice single producer,
//! since the engine hands its book mutex back before anything is enqueued.

use tokio::sync::mpsc;

use crate::event::Event;

/// Default channel capacity. Producers (admission) suspend on `send` once
/// the queue is full rather than dropping an event — the queue never loses
/// a decision the engine has already committed to.
pub const DEFAULT_CAPACITY: usize = 4096;

pub struct EventSender {
    inner: mpsc::Sender<Event>,
}

pub struct EventReceiver {
    inner: mpsc::Receiver<Event>,
}

pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { inner: tx }, EventReceiver { inner: rx })
}

impl EventSender {
    /// Enqueue one event, waiting if the queue is momentarily full.
    pub async fn send(&self, event: Event) {
        // The channel is only closed if the persister task has exited, which
        // only happens after an unrecoverable store failure (§4.5). There is
        // no supervisor in this crate to restart it, so further events are
        // silently dropped rather than panicking the caller's request.
        let _ = self.inner.send(event).await;
    }

    /// Enqueue every event from `events`, in order.
    pub async fn send_all(&self, events: Vec<Event>) {
        for event in events {
            self.send(event).await;
        }
    }
}

impl Clone for EventSender {
    fn clone(&self) -> Self {
        EventSender {
            inner: self.inner.clone(),
        }
    }
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<Event> {
        self.inner.recv().await
    }
}
