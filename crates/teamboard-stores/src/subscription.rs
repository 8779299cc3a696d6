//! Background listeners bound to a cancellation token.

use std::future::Future;

use teamboard_core::Collection;
use teamboard_remote::{Snapshot, SnapshotFeed};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A spawned listener task.
///
/// Dropping the handle cancels and aborts the task; [`close`](Self::close)
/// additionally waits until it is gone.
pub struct Subscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawn `task`; it should stop once `token` is cancelled.
    pub fn spawn<F>(token: CancellationToken, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            token,
            handle: Some(tokio::spawn(task)),
        }
    }

    /// Spawn a loop feeding every snapshot to `on_snapshot` until the token
    /// is cancelled or the feed ends.
    pub fn snapshots<F>(
        collection: Collection,
        feed: SnapshotFeed,
        token: CancellationToken,
        on_snapshot: F,
    ) -> Self
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        let task = pump(collection, feed, token.clone(), on_snapshot);
        Self::spawn(token, task)
    }

    /// Whether the task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel, abort and wait for the task to be dropped.
    pub async fn close(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Cancel without aborting; for a task ending itself from the inside.
    pub fn disarm(mut self) {
        self.token.cancel();
        drop(self.handle.take());
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[tracing::instrument(skip_all, fields(%collection))]
async fn pump<F>(
    collection: Collection,
    mut feed: SnapshotFeed,
    token: CancellationToken,
    mut on_snapshot: F,
) where
    F: FnMut(Snapshot) + Send + 'static,
{
    loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!("subscription cancelled");
                break;
            }
            item = feed.recv() => match item {
                Some(Ok(snapshot)) => on_snapshot(snapshot),
                Some(Err(err)) => {
                    warn!(error = %err, "subscription ended by remote");
                    break;
                }
                None => {
                    debug!("snapshot feed closed");
                    break;
                }
            }
        }
    }
}
