//! Domain type definitions.
//!
//! All wire-facing types use `#[serde(rename_all = "camelCase")]` so remote
//! documents carry `createdBy`, `assignedTo`, `projectId` and friends.

mod collection;
mod identity;
mod project;
mod task;

pub use collection::Collection;
pub use identity::{Credentials, Role, Session, User};
pub use project::{Project, ProjectInput, ProjectPatch};
pub use task::{Deadline, FieldChange, Priority, Task, TaskPatch, TaskStatus, TaskSubmission};

/// Record a change of one field into `changes` when `old != new`, then assign.
pub(crate) fn set_field<T>(
    changes: &mut Vec<FieldChange>,
    field: &'static str,
    slot: &mut T,
    new: T,
    render: impl Fn(&T) -> String,
) where
    T: PartialEq,
{
    if *slot != new {
        changes.push(FieldChange {
            field,
            old: render(slot),
            new: render(&new),
        });
        *slot = new;
    }
}

pub(crate) fn render_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}
