//! Shared constants.

/// Label rendered for a task whose assignee is empty or no longer in the directory.
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// Default toast lifetime in milliseconds.
pub const DEFAULT_TOAST_DURATION_MS: u64 = 3_000;

/// Default number of toasts shown at once.
pub const DEFAULT_MAX_VISIBLE_TOASTS: usize = 5;

/// Capacity of session-event broadcast channels.
pub const SESSION_EVENT_CAPACITY: usize = 64;
