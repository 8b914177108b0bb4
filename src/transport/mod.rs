//! # Hand-off of scheduled records to workers.
//!
//! [`Transport`] is the dispatcher consumed by
//! [`TaskManager::schedule`](crate::TaskManager::schedule). Delivery is
//! at-least-once with no ordering or timing guarantee; the runner's claim step
//! makes duplicate deliveries harmless.
//!
//! [`ChannelTransport`] is the in-process implementation: a bounded
//! `tokio::sync::mpsc` queue whose [`TaskReceiver`] feeds a
//! [`Worker`](crate::Worker).

mod channel;

pub use channel::{channel, ChannelTransport, TaskReceiver};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::record::TaskId;

/// Arranges for a runner to be invoked with a record id on some worker.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn enqueue(&self, id: TaskId) -> Result<(), TransportError>;
}
