//! Task documents, their enums, and the create/patch payloads.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{render_opt, set_field};
use crate::errors::ValidationError;
use crate::ids::{ProjectId, TaskId, UserId};

/// Task priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low.
    Low,
    /// Medium (form default).
    #[default]
    Medium,
    /// High.
    High,
}

impl Priority {
    /// All priorities in display order.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Human label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::new("priority", format!("unknown priority '{s}'")))
    }
}

/// Task status. Any status may follow any other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Awaiting review.
    Review,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// All statuses in board-column order.
    pub const ALL: [Self; 4] = [Self::Todo, Self::InProgress, Self::Review, Self::Done];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }

    /// Human label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Review => "Review",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ValidationError::new("status", format!("unknown status '{s}'")))
    }
}

/// Task deadline. `None` is an explicit marker and serializes as `null`
/// rather than being omitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<NaiveDate>", into = "Option<NaiveDate>")]
pub enum Deadline {
    /// No deadline.
    #[default]
    None,
    /// Due on this day.
    Due(NaiveDate),
}

impl Deadline {
    /// Parse form input: empty means no deadline, otherwise `YYYY-MM-DD`.
    pub fn parse_input(input: &str) -> Result<Self, ValidationError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::None);
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map(Self::Due)
            .map_err(|_| ValidationError::new("deadline", format!("'{input}' is not a date")))
    }

    /// The due date, if any.
    #[must_use]
    pub const fn date(self) -> Option<NaiveDate> {
        match self {
            Self::None => None,
            Self::Due(d) => Some(d),
        }
    }

    /// Whether the deadline lies strictly before `today`.
    #[must_use]
    pub fn is_before(self, today: NaiveDate) -> bool {
        self.date().is_some_and(|d| d < today)
    }
}

impl From<Option<NaiveDate>> for Deadline {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map_or(Self::None, Self::Due)
    }
}

impl From<Deadline> for Option<NaiveDate> {
    fn from(value: Deadline) -> Self {
        value.date()
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Due(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// One field changed by a mutation, rendered for activity history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    /// Wire name of the field.
    pub field: &'static str,
    /// Previous value.
    pub old: String,
    /// New value.
    pub new: String,
}

/// A task document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Document id.
    pub id: TaskId,
    /// Title, never blank.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Assignee. A soft reference: the user may have left the directory.
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    /// Deadline.
    #[serde(default)]
    pub deadline: Deadline,
    /// Owning project.
    pub project_id: ProjectId,
}

impl Task {
    /// Build a task document from a submission.
    #[must_use]
    pub fn from_submission(id: TaskId, submission: TaskSubmission) -> Self {
        Self {
            id,
            title: submission.title.trim().to_string(),
            description: submission.description.filter(|d| !d.trim().is_empty()),
            priority: submission.priority,
            status: submission.status,
            assigned_to: submission.assigned_to,
            deadline: submission.deadline,
            project_id: submission.project_id,
        }
    }

    /// Apply a patch in place, returning the fields that actually changed.
    pub fn apply(&mut self, patch: &TaskPatch) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        if let Some(title) = &patch.title {
            set_field(&mut changes, "title", &mut self.title, title.trim().to_string(), String::clone);
        }
        if let Some(description) = &patch.description {
            set_field(
                &mut changes,
                "description",
                &mut self.description,
                description.clone(),
                render_opt,
            );
        }
        if let Some(priority) = patch.priority {
            set_field(&mut changes, "priority", &mut self.priority, priority, ToString::to_string);
        }
        if let Some(status) = patch.status {
            set_field(&mut changes, "status", &mut self.status, status, ToString::to_string);
        }
        if let Some(assigned_to) = &patch.assigned_to {
            set_field(
                &mut changes,
                "assignedTo",
                &mut self.assigned_to,
                assigned_to.clone(),
                render_opt,
            );
        }
        if let Some(deadline) = patch.deadline {
            set_field(&mut changes, "deadline", &mut self.deadline, deadline, ToString::to_string);
        }
        if let Some(project_id) = &patch.project_id {
            set_field(
                &mut changes,
                "projectId",
                &mut self.project_id,
                project_id.clone(),
                ToString::to_string,
            );
        }
        changes
    }
}

/// Task-submission payload emitted by the task form.
///
/// Every field is always present; a missing deadline is
/// [`Deadline::None`], serialized as `null`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Priority.
    pub priority: Priority,
    /// Initial status.
    pub status: TaskStatus,
    /// Assignee.
    pub assigned_to: Option<UserId>,
    /// Deadline marker.
    pub deadline: Deadline,
    /// Owning project.
    pub project_id: ProjectId,
}

impl TaskSubmission {
    /// Minimal submission with form defaults.
    pub fn new(title: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::default(),
            status: TaskStatus::default(),
            assigned_to: None,
            deadline: Deadline::None,
            project_id,
        }
    }

    /// Shape validation that needs no other store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "task title is required"));
        }
        Ok(())
    }
}

/// Partial update of a task. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description (`Some(None)` clears it).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    /// New priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New assignee (`Some(None)` unassigns).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<UserId>>,
    /// New deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Deadline>,
    /// Move to another project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
}

impl TaskPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether the patch touches no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shape validation that needs no other store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.as_ref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::new("title", "task title is required"));
        }
        Ok(())
    }
}
