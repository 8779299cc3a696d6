//! Transient notifications: toasts and confirmation dialogs.
//!
//! Both queues are process-wide UI state, independent of the domain stores.

pub mod confirm;
pub mod toast;

use std::time::Duration;

use teamboard_settings::NotificationSettings;

pub use confirm::{ConfirmQueue, ConfirmRequest, Confirmation};
pub use toast::{Toast, ToastId, ToastLevel, ToastQueue};

/// The toast stack and the confirmation queue.
pub struct Notifications {
    /// Auto-dismissing messages.
    pub toasts: ToastQueue,
    /// Blocking confirmations.
    pub confirms: ConfirmQueue,
}

impl Notifications {
    /// Build both queues from settings.
    pub fn new(settings: &NotificationSettings) -> Self {
        Self {
            toasts: ToastQueue::new(
                Duration::from_millis(settings.toast_duration_ms),
                settings.max_visible,
            ),
            confirms: ConfirmQueue::new(),
        }
    }
}
