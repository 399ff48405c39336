//! Live collection subscriptions.

use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::errors::AppError;

/// One emission of a subscription: the full current result set.
pub type Snapshot = Result<Vec<Value>, AppError>;

/// Handle to a live query.
///
/// Emits the complete result set once on creation and again after every
/// committed change to the collection. An error ends the sequence.
/// Dropping the handle cancels the listener.
pub struct Subscription {
    receiver: mpsc::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(receiver: mpsc::Receiver<Snapshot>, task: JoinHandle<()>) -> Self {
        Self { receiver, task }
    }

    /// Wait for the next emission. `None` once the listener has stopped.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
