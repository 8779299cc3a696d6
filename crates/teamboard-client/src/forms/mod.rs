//! Form state for creating and editing tasks and projects.
//!
//! A form holds raw input. `submit` validates it and produces an intent:
//! a full payload for a create, or a patch carrying only the fields that
//! differ from the edited document. Intents are sent to the owning store.

pub mod project;
pub mod task;

pub use project::{ProjectForm, ProjectIntent};
pub use task::{AssigneeOption, TaskForm, TaskIntent};

/// Trimmed text, or `None` when blank.
fn optional_text(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
