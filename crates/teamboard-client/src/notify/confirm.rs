//! Blocking confirmation dialog with a FIFO of pending requests.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::debug;

/// Text of a confirmation dialog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    /// Request number, unique per queue.
    pub id: u64,
    /// Dialog title.
    pub title: String,
    /// Dialog body.
    pub message: String,
    /// Label of the accepting button.
    pub confirm_label: String,
    /// Label of the rejecting button.
    pub cancel_label: String,
}

/// Caller side of a request.
pub struct Confirmation {
    id: u64,
    rx: oneshot::Receiver<bool>,
}

impl Confirmation {
    /// Request number.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the answer. A request dropped unanswered counts as rejected.
    pub async fn outcome(self) -> bool {
        self.rx.await.unwrap_or(false)
    }
}

struct Entry {
    request: ConfirmRequest,
    reply: oneshot::Sender<bool>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    queue: VecDeque<Entry>,
}

/// One active dialog at a time; later requests wait their turn.
///
/// Dropping the queue rejects everything still pending.
#[derive(Default)]
pub struct ConfirmQueue {
    inner: Mutex<Inner>,
}

impl ConfirmQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for confirmation with the default button labels.
    pub fn request(&self, title: impl Into<String>, message: impl Into<String>) -> Confirmation {
        self.request_with(title, message, "Confirm", "Cancel")
    }

    /// Ask for confirmation.
    pub fn request_with(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
        confirm_label: impl Into<String>,
        cancel_label: impl Into<String>,
    ) -> Confirmation {
        let (reply, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.queue.push_back(Entry {
            request: ConfirmRequest {
                id,
                title: title.into(),
                message: message.into(),
                confirm_label: confirm_label.into(),
                cancel_label: cancel_label.into(),
            },
            reply,
        });
        debug!(id, pending = inner.queue.len(), "confirmation requested");
        Confirmation { id, rx }
    }

    /// The dialog on screen.
    pub fn active(&self) -> Option<ConfirmRequest> {
        self.inner.lock().queue.front().map(|e| e.request.clone())
    }

    /// Requests not yet answered, including the active one.
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Answer the active dialog; the next one becomes active.
    ///
    /// Returns the answered request, or `None` if nothing was active.
    pub fn resolve(&self, accepted: bool) -> Option<ConfirmRequest> {
        let entry = self.inner.lock().queue.pop_front()?;
        debug!(id = entry.request.id, accepted, "confirmation answered");
        let _ = entry.reply.send(accepted);
        Some(entry.request)
    }

    /// Accept the active dialog.
    pub fn accept(&self) -> Option<ConfirmRequest> {
        self.resolve(true)
    }

    /// Reject the active dialog.
    pub fn reject(&self) -> Option<ConfirmRequest> {
        self.resolve(false)
    }

    /// Reject every pending request.
    pub fn reject_all(&self) {
        let drained: Vec<Entry> = self.inner.lock().queue.drain(..).collect();
        for entry in drained {
            let _ = entry.reply.send(false);
        }
    }
}
