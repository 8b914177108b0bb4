//! # Event bus.
//!
//! [`Bus`] fans lifecycle events out over a [`tokio::sync::broadcast`] ring.
//!
//! ```text
//!   TaskManager ──┐                   ┌──► subscriber_listener ──► SubscriberSet
//!   Runner(s)   ──┼──► Bus (ring) ────┼──► wait_for_completion ─┐
//!   Watcher(s)  ──┤                   └──► abort watcher ───────┴─ TaskEvents (one record)
//!   Worker      ──┘
//! ```
//!
//! Publishing never blocks and never fails. Receivers that fall more than
//! `capacity` events behind skip the oldest ones, so every consumer that must
//! not miss a transition also polls the store.

use tokio::sync::broadcast::{self, error::RecvError};

use super::event::Event;
use crate::record::TaskId;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus keeping the last `capacity` events (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes `ev`; dropped if nobody is listening.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver of every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Receiver of the events about record `id` published from now on.
    pub(crate) fn subscribe_task(&self, id: TaskId) -> TaskEvents {
        TaskEvents {
            id,
            rx: self.tx.subscribe(),
        }
    }
}

/// Bus receiver filtered to one record.
pub(crate) struct TaskEvents {
    id: TaskId,
    rx: broadcast::Receiver<Event>,
}

impl TaskEvents {
    /// Next event about the record, or `None` once the bus is gone.
    ///
    /// Cancel-safe. Lag gaps are skipped silently.
    pub(crate) async fn next(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(ev) if ev.task_id == Some(self.id) => return Some(ev),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!(task_id = %self.id, skipped = n, "task event receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_receivers_only_see_later_events() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::TaskCreated));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::TaskStarted));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TaskStarted);
    }

    #[tokio::test]
    async fn test_task_events_filter_by_id() {
        let bus = Bus::new(8);
        let id = TaskId::new();
        let mut events = bus.subscribe_task(id);

        bus.publish(Event::new(EventKind::TaskStarted).with_task_id(TaskId::new()));
        bus.publish(Event::new(EventKind::ShutdownRequested));
        bus.publish(Event::new(EventKind::AbortRequested).with_task_id(id));

        let ev = events.next().await.unwrap();
        assert_eq!(ev.kind, EventKind::AbortRequested);
        assert_eq!(ev.task_id, Some(id));
    }

    #[tokio::test]
    async fn test_task_events_skip_lag_gap() {
        let bus = Bus::new(2);
        let id = TaskId::new();
        let mut events = bus.subscribe_task(id);

        for _ in 0..5 {
            bus.publish(Event::new(EventKind::TaskProgress).with_task_id(TaskId::new()));
        }
        bus.publish(Event::new(EventKind::TaskSucceeded).with_task_id(id));

        let ev = events.next().await.unwrap();
        assert_eq!(ev.kind, EventKind::TaskSucceeded);

        drop(bus);
        assert!(events.next().await.is_none());
    }
}
