use async_trait::async_trait;
use tokio::sync::mpsc;

use super::Transport;
use crate::error::TransportError;
use crate::record::TaskId;

/// Creates a bounded in-process transport and its receiving end.
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use taskframe::{transport, TaskId, Transport};
///
/// let (tx, mut rx) = transport::channel(8);
/// let id = TaskId::new();
/// tx.enqueue(id).await.unwrap();
/// assert_eq!(rx.recv().await, Some(id));
/// # }
/// ```
pub fn channel(capacity: usize) -> (ChannelTransport, TaskReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelTransport { tx }, TaskReceiver { rx })
}

/// Sending half; cheap to clone.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<TaskId>,
}

impl ChannelTransport {
    /// Enqueues without waiting for queue space.
    pub fn try_enqueue(&self, id: TaskId) -> Result<(), TransportError> {
        self.tx.try_send(id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Full,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    /// Waits for queue space; fails only when the receiver is gone.
    async fn enqueue(&self, id: TaskId) -> Result<(), TransportError> {
        self.tx.send(id).await.map_err(|_| TransportError::Closed)
    }
}

/// Receiving half, consumed by a [`Worker`](crate::Worker).
#[derive(Debug)]
pub struct TaskReceiver {
    rx: mpsc::Receiver<TaskId>,
}

impl TaskReceiver {
    /// Next id, or `None` once every sender is dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<TaskId> {
        self.rx.recv().await
    }

    /// Next queued id without waiting.
    pub fn try_recv(&mut self) -> Option<TaskId> {
        self.rx.try_recv().ok()
    }

    /// Stops accepting new ids; queued ids can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
