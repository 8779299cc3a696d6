//! Task create/edit form.

use chrono::NaiveDate;
use teamboard_core::constants::UNASSIGNED_LABEL;
use teamboard_core::{
    ClientError, Deadline, Priority, ProjectId, Session, Task, TaskId, TaskPatch, TaskStatus,
    TaskSubmission, UserId, ValidationError,
};
use teamboard_stores::{DirectoryStore, TaskStore};

use super::optional_text;

/// One entry of the assignee picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssigneeOption {
    /// User to assign, `None` for nobody.
    pub id: Option<UserId>,
    /// Label shown.
    pub label: String,
}

/// What a submitted task form asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskIntent {
    /// Create a task.
    Create(TaskSubmission),
    /// Patch an existing task.
    Update {
        /// Task edited.
        id: TaskId,
        /// Fields that changed.
        patch: TaskPatch,
    },
}

impl TaskIntent {
    /// Hand the intent to the task store. Returns the task's id.
    pub async fn send(self, tasks: &TaskStore) -> Result<TaskId, ClientError> {
        match self {
            Self::Create(submission) => Ok(tasks.create(submission).await?.id),
            Self::Update { id, patch } => {
                tasks.update(&id, &patch).await?;
                Ok(id)
            }
        }
    }
}

/// Raw task form input.
#[derive(Clone, Debug)]
pub struct TaskForm {
    original: Option<Box<Task>>,
    /// Title as typed.
    pub title: String,
    /// Description as typed; blank means none.
    pub description: String,
    /// Selected priority.
    pub priority: Priority,
    /// Selected status.
    pub status: TaskStatus,
    /// Selected assignee.
    pub assigned_to: Option<UserId>,
    /// Deadline as typed (`YYYY-MM-DD`); blank means none.
    pub deadline: String,
    /// Owning project.
    pub project_id: ProjectId,
}

impl TaskForm {
    /// Blank form for a new task in `project_id`.
    ///
    /// Status defaults to `default_status` or `todo`; the assignee defaults
    /// to the signed-in user.
    pub fn new(
        project_id: ProjectId,
        default_status: Option<TaskStatus>,
        current_user: Option<&Session>,
    ) -> Self {
        Self {
            original: None,
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            status: default_status.unwrap_or_default(),
            assigned_to: current_user.map(|s| s.user_id.clone()),
            deadline: String::new(),
            project_id,
        }
    }

    /// Form pre-filled from an existing task.
    pub fn edit(task: &Task) -> Self {
        Self {
            original: Some(Box::new(task.clone())),
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            priority: task.priority,
            status: task.status,
            assigned_to: task.assigned_to.clone(),
            deadline: task
                .deadline
                .date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            project_id: task.project_id.clone(),
        }
    }

    /// Whether the form edits an existing task.
    pub fn is_edit(&self) -> bool {
        self.original.is_some()
    }

    /// Assignee choices: nobody, then the directory in its order.
    pub fn assignee_options(directory: &DirectoryStore) -> Vec<AssigneeOption> {
        std::iter::once(AssigneeOption {
            id: None,
            label: UNASSIGNED_LABEL.to_string(),
        })
        .chain(directory.list_users().into_iter().map(|user| AssigneeOption {
            id: Some(user.id),
            label: user.name,
        }))
        .collect()
    }

    /// Validate and build the intent.
    ///
    /// A deadline before `today` is refused unless it is the unchanged
    /// deadline of the edited task.
    pub fn submit(&self, today: NaiveDate) -> Result<TaskIntent, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::new("title", "task title is required"));
        }
        let deadline = Deadline::parse_input(&self.deadline)?;
        let deadline_changed = self.original.as_ref().is_none_or(|t| t.deadline != deadline);
        if deadline_changed && deadline.is_before(today) {
            return Err(ValidationError::new("deadline", "deadline cannot be in the past"));
        }
        let description = optional_text(&self.description);

        let Some(original) = &self.original else {
            return Ok(TaskIntent::Create(TaskSubmission {
                title: title.to_string(),
                description,
                priority: self.priority,
                status: self.status,
                assigned_to: self.assigned_to.clone(),
                deadline,
                project_id: self.project_id.clone(),
            }));
        };

        let patch = TaskPatch {
            title: (title != original.title).then(|| title.to_string()),
            description: (description != original.description).then_some(description),
            priority: (self.priority != original.priority).then_some(self.priority),
            status: (self.status != original.status).then_some(self.status),
            assigned_to: (self.assigned_to != original.assigned_to)
                .then(|| self.assigned_to.clone()),
            deadline: deadline_changed.then_some(deadline),
            project_id: (self.project_id != original.project_id).then(|| self.project_id.clone()),
        };
        Ok(TaskIntent::Update {
            id: original.id.clone(),
            patch,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use teamboard_core::Role;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn session() -> Session {
        Session {
            user_id: UserId::from("u1"),
            display_name: "Ada".into(),
            role: Role::Member,
            authenticated: true,
        }
    }

    #[test]
    fn blank_form_defaults() {
        let form = TaskForm::new(ProjectId::from("p1"), None, Some(&session()));
        assert_eq!(form.priority, Priority::Medium);
        assert_eq!(form.status, TaskStatus::Todo);
        assert_eq!(form.assigned_to, Some(UserId::from("u1")));
        assert!(!form.is_edit());

        let column = TaskForm::new(ProjectId::from("p1"), Some(TaskStatus::Review), None);
        assert_eq!(column.status, TaskStatus::Review);
        assert_eq!(column.assigned_to, None);
    }

    #[test]
    fn create_payload_shape() {
        let mut form = TaskForm::new(ProjectId::from("p1"), None, Some(&session()));
        form.title = "  Design mockup ".into();
        form.description = "   ".into();
        let Ok(TaskIntent::Create(submission)) = form.submit(today()) else {
            panic!("expected a create intent");
        };
        insta::assert_json_snapshot!(submission, @r#"
        {
          "title": "Design mockup",
          "description": null,
          "priority": "medium",
          "status": "todo",
          "assignedTo": "u1",
          "deadline": null,
          "projectId": "p1"
        }
        "#);
    }

    #[test]
    fn blank_title_blocks_submit() {
        let mut form = TaskForm::new(ProjectId::from("p1"), None, None);
        form.title = "   ".into();
        assert_matches!(form.submit(today()), Err(ValidationError { field: "title", .. }));
    }

    #[test]
    fn past_deadline_blocks_new_task() {
        let mut form = TaskForm::new(ProjectId::from("p1"), None, None);
        form.title = "Ship".into();
        form.deadline = "2026-10-18".into();
        assert_matches!(form.submit(today()), Err(ValidationError { field: "deadline", .. }));

        form.deadline = "2026-10-19".into();
        assert_matches!(
            form.submit(today()),
            Ok(TaskIntent::Create(TaskSubmission { deadline: Deadline::Due(_), .. }))
        );

        form.deadline = "tomorrow".into();
        assert_matches!(form.submit(today()), Err(ValidationError { field: "deadline", .. }));
    }

    #[test]
    fn edit_produces_minimal_patch() {
        let mut task = Task::from_submission(
            TaskId::from("t1"),
            TaskSubmission::new("Wireframes", ProjectId::from("p1")),
        );
        task.deadline = Deadline::Due(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());

        let mut form = TaskForm::edit(&task);
        assert!(form.is_edit());
        assert_eq!(form.deadline, "2026-01-01");
        assert_eq!(
            form.submit(today()).unwrap(),
            TaskIntent::Update {
                id: TaskId::from("t1"),
                patch: TaskPatch::default(),
            }
        );

        form.status = TaskStatus::Done;
        form.deadline = String::new();
        let Ok(TaskIntent::Update { patch, .. }) = form.submit(today()) else {
            panic!("expected an update intent");
        };
        assert_eq!(
            patch,
            TaskPatch {
                status: Some(TaskStatus::Done),
                deadline: Some(Deadline::None),
                ..TaskPatch::default()
            }
        );
    }
}
