//! Auto-dismissing toast messages.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use teamboard_core::{ClientError, Surface};
use tokio::time::Instant;
use tracing::debug;

/// Toast severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    /// Neutral information.
    Info,
    /// Something succeeded.
    Success,
    /// Something needs attention.
    Warning,
    /// Something failed.
    Error,
}

/// Identifies a toast for manual dismissal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ToastId(u64);

/// A toast on screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    /// Handle for [`ToastQueue::dismiss`].
    pub id: ToastId,
    /// Severity.
    pub level: ToastLevel,
    /// Text shown.
    pub message: String,
    /// When the toast leaves the screen on its own.
    #[serde(skip)]
    pub expires_at: Instant,
}

struct Waiting {
    id: ToastId,
    level: ToastLevel,
    message: String,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    shown: Vec<Toast>,
    waiting: VecDeque<Waiting>,
}

/// Ordered toast stack.
///
/// At most `max_visible` toasts are shown; later ones wait in order and
/// take a slot as soon as one frees up. A toast's lifetime starts when it
/// is shown, not when it is pushed.
pub struct ToastQueue {
    duration: Duration,
    max_visible: usize,
    inner: Mutex<Inner>,
}

impl ToastQueue {
    /// Create an empty queue.
    pub fn new(duration: Duration, max_visible: usize) -> Self {
        Self {
            duration,
            max_visible: max_visible.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Queue a toast.
    pub fn push(&self, level: ToastLevel, message: impl Into<String>) -> ToastId {
        let message = message.into();
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = ToastId(inner.next_id);
        debug!(id = id.0, ?level, %message, "toast queued");
        inner.waiting.push_back(Waiting { id, level, message });
        self.advance(&mut inner, Instant::now());
        id
    }

    /// Queue an info toast.
    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.push(ToastLevel::Info, message)
    }

    /// Queue a success toast.
    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.push(ToastLevel::Success, message)
    }

    /// Queue an error toast.
    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.push(ToastLevel::Error, message)
    }

    /// Toast a store error if it is meant to be shown as one.
    ///
    /// Inline and sign-in errors are left to the form and the guard.
    pub fn notify_error(&self, err: &ClientError) -> Option<ToastId> {
        (err.surface() == Surface::Toast).then(|| self.error(err.to_string()))
    }

    /// Toasts currently on screen, oldest first.
    pub fn visible(&self) -> Vec<Toast> {
        let mut inner = self.inner.lock();
        self.advance(&mut inner, Instant::now());
        inner.shown.clone()
    }

    /// Number of toasts waiting for a slot.
    pub fn waiting(&self) -> usize {
        let mut inner = self.inner.lock();
        self.advance(&mut inner, Instant::now());
        inner.waiting.len()
    }

    /// Remove a toast early. Returns `false` if it is already gone.
    pub fn dismiss(&self, id: ToastId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.shown.len() + inner.waiting.len();
        inner.shown.retain(|t| t.id != id);
        inner.waiting.retain(|t| t.id != id);
        let removed = inner.shown.len() + inner.waiting.len() < before;
        self.advance(&mut inner, Instant::now());
        removed
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.shown.clear();
        inner.waiting.clear();
    }

    /// Expire toasts due by `now`, promoting waiting ones into freed slots
    /// at the instant each slot freed.
    fn advance(&self, inner: &mut Inner, now: Instant) {
        let mut at = now;
        loop {
            while inner.shown.len() < self.max_visible {
                let Some(next) = inner.waiting.pop_front() else {
                    break;
                };
                inner.shown.push(Toast {
                    id: next.id,
                    level: next.level,
                    message: next.message,
                    expires_at: at + self.duration,
                });
            }

            let due = inner
                .shown
                .iter()
                .enumerate()
                .filter(|(_, t)| t.expires_at <= now)
                .min_by_key(|(_, t)| t.expires_at)
                .map(|(index, t)| (index, t.expires_at));
            let Some((index, expired_at)) = due else {
                break;
            };
            let _ = inner.shown.remove(index);
            at = expired_at;
        }
    }
}
