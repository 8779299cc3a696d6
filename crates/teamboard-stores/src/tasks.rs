//! Tasks, with referential checks against projects and the directory.
//!
//! A task always names a project. Tasks whose project is gone (deleted by
//! another client, or kept under the orphan policy) stay cached but are
//! hidden from every listing except [`TaskStore::orphans`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use teamboard_core::{
    ClientError, Collection, FieldChange, NotFoundError, ProjectId, Session, SyncError, Task,
    TaskId, TaskPatch, TaskSubmission, UserId, ValidationError,
};
use teamboard_remote::{DocumentWrite, RemoteStore, to_object};
use teamboard_settings::ProjectDeletionPolicy;
use tracing::{debug, info, warn};

use crate::directory::DirectoryStore;
use crate::projects::{ProjectReferences, ProjectStore};
use crate::session::{SessionScoped, SessionStore};
use crate::synced::{SyncedStore, patch_payload};

/// What happened to a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActivityKind {
    /// The task was created.
    Created,
    /// One field changed.
    Changed(FieldChange),
    /// The task was deleted.
    Deleted,
}

/// One entry of a task's local history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// When the change was acknowledged.
    pub at: DateTime<Utc>,
    /// Who made it.
    pub actor: UserId,
    /// What changed.
    #[serde(flatten)]
    pub kind: ActivityKind,
}

/// Tasks of every project visible to the session.
///
/// The store registers itself with its [`ProjectStore`], so the configured
/// [`ProjectDeletionPolicy`] applies to every project deletion.
pub struct TaskStore {
    session: Arc<SessionStore>,
    projects: Arc<ProjectStore>,
    directory: Arc<DirectoryStore>,
    deletion: ProjectDeletionPolicy,
    synced: SyncedStore<Task>,
    activity: Mutex<HashMap<TaskId, Vec<ActivityEntry>>>,
}

impl TaskStore {
    /// Create an unloaded store.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        session: Arc<SessionStore>,
        projects: Arc<ProjectStore>,
        directory: Arc<DirectoryStore>,
        deletion: ProjectDeletionPolicy,
    ) -> Arc<Self> {
        let store = Arc::new(Self {
            session,
            projects,
            directory,
            deletion,
            synced: SyncedStore::new(remote),
            activity: Mutex::new(HashMap::new()),
        });
        let references: Arc<dyn ProjectReferences> = store.clone();
        store.projects.set_references(&references);
        store
    }

    // ── Reads ───────────────────────────────────────────────────────────

    fn select(&self, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
        self.synced.cache().iter().filter(|t| keep(t)).cloned().collect()
    }

    /// Tasks whose project exists.
    pub fn list(&self) -> Vec<Task> {
        let live = self.projects.ids();
        self.select(|t| live.contains(&t.project_id))
    }

    /// Tasks of one project; empty if the project is gone.
    pub fn list_by_project(&self, project: &ProjectId) -> Vec<Task> {
        if !self.projects.contains(project) {
            return Vec::new();
        }
        self.select(|t| t.project_id == *project)
    }

    /// Visible tasks assigned to `user`.
    pub fn list_by_assignee(&self, user: &UserId) -> Vec<Task> {
        let live = self.projects.ids();
        self.select(|t| t.assigned_to.as_ref() == Some(user) && live.contains(&t.project_id))
    }

    /// Tasks whose project no longer exists.
    pub fn orphans(&self) -> Vec<Task> {
        let live = self.projects.ids();
        self.select(|t| !live.contains(&t.project_id))
    }

    /// Look up a task, hidden or not.
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.synced.cache().get(id.as_str()).cloned()
    }

    /// Label for the task's assignee; "Unassigned" when empty or unknown.
    pub fn assignee_label(&self, task: &Task) -> String {
        self.directory.display_name(task.assigned_to.as_ref())
    }

    /// Local history of a task, oldest first.
    pub fn activity(&self, id: &TaskId) -> Vec<ActivityEntry> {
        self.activity.lock().get(id).cloned().unwrap_or_default()
    }

    /// Whether the initial snapshot has arrived.
    pub fn is_loaded(&self) -> bool {
        self.synced.cache().is_loaded()
    }

    // ── Mutations ───────────────────────────────────────────────────────

    /// Create a task from a form submission.
    pub async fn create(&self, submission: TaskSubmission) -> Result<Task, ClientError> {
        submission.validate()?;
        let session = self.session.require_session()?;
        self.check_project(&submission.project_id)?;
        if let Some(assignee) = &submission.assigned_to {
            self.check_assignee(assignee)?;
        }
        let token = self.synced.scope_token()?;

        let task = Task::from_submission(TaskId::new(), submission);
        let ticket = self.synced.cache().insert_local(task.clone());
        debug!(task_id = %task.id, project_id = %task.project_id, "task created locally");

        let _ = self
            .synced
            .write(&token, ticket, DocumentWrite::Create(to_object(&task)))
            .await?;
        self.record(&task.id, &session, [ActivityKind::Created]);
        Ok(task)
    }

    /// Patch a task.
    ///
    /// The write is sent even when nothing changes locally; history only
    /// grows for fields whose value actually changed.
    pub async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), ClientError> {
        patch.validate()?;
        let session = self.session.require_session()?;
        if let Some(project) = &patch.project_id {
            self.check_project(project)?;
        }
        if let Some(Some(assignee)) = &patch.assigned_to {
            self.check_assignee(assignee)?;
        }
        let token = self.synced.scope_token()?;
        if patch.is_empty() {
            return Ok(());
        }

        let (ticket, payload, changes) = {
            let mut cache = self.synced.cache();
            let mut updated = cache
                .get(id.as_str())
                .cloned()
                .ok_or_else(|| NotFoundError::new(Collection::Tasks, id.as_str()))?;
            let changes = updated.apply(patch);
            let (fields, payload) = patch_payload(patch, &updated);
            let ticket = cache
                .replace_local(updated, fields)
                .ok_or_else(|| NotFoundError::new(Collection::Tasks, id.as_str()))?;
            (ticket, payload, changes)
        };

        let _ = self
            .synced
            .write(&token, ticket, DocumentWrite::Patch(payload))
            .await?;
        debug!(task_id = %id, changed = changes.len(), "task update acknowledged");
        self.record(id, &session, changes.into_iter().map(ActivityKind::Changed));
        Ok(())
    }

    /// Delete a task.
    pub async fn remove(&self, id: &TaskId) -> Result<(), ClientError> {
        let session = self.session.require_session()?;
        let token = self.synced.scope_token()?;
        let ticket = self
            .synced
            .cache()
            .remove_local(id.as_str())
            .ok_or_else(|| NotFoundError::new(Collection::Tasks, id.as_str()))?;

        self.synced.delete(&token, ticket).await?;
        self.record(id, &session, [ActivityKind::Deleted]);
        Ok(())
    }

    /// Delete a project, applying the configured policy to its tasks.
    ///
    /// - `CascadeDeleteTasks`: the project's tasks are deleted after it
    /// - `OrphanAndHide`: tasks stay remotely and become [`orphans`](Self::orphans)
    /// - `RejectWhileTasksExist`: refused with a validation error while any task remains
    ///
    /// Same as [`ProjectStore::remove`], which applies the policy through this store.
    pub async fn remove_project(&self, project: &ProjectId) -> Result<(), ClientError> {
        self.projects.remove(project).await
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn check_project(&self, project: &ProjectId) -> Result<(), ValidationError> {
        if self.projects.contains(project) {
            Ok(())
        } else {
            Err(ValidationError::new("projectId", format!("unknown project {project}")))
        }
    }

    fn check_assignee(&self, user: &UserId) -> Result<(), ValidationError> {
        if self.directory.contains(user) {
            Ok(())
        } else {
            Err(ValidationError::new("assignedTo", format!("unknown user {user}")))
        }
    }

    fn record(&self, id: &TaskId, session: &Session, kinds: impl IntoIterator<Item = ActivityKind>) {
        let at = Utc::now();
        let mut kinds = kinds.into_iter().peekable();
        if kinds.peek().is_none() {
            return;
        }
        self.activity
            .lock()
            .entry(id.clone())
            .or_default()
            .extend(kinds.map(|kind| ActivityEntry {
                at,
                actor: session.user_id.clone(),
                kind,
            }));
    }
}

#[async_trait]
impl ProjectReferences for TaskStore {
    fn prepare_removal(&self, project: &ProjectId) -> Result<Vec<TaskId>, ClientError> {
        let owned: Vec<TaskId> = self
            .synced
            .cache()
            .iter()
            .filter(|t| t.project_id == *project)
            .map(|t| t.id.clone())
            .collect();

        if self.deletion == ProjectDeletionPolicy::RejectWhileTasksExist && !owned.is_empty() {
            return Err(ValidationError::new(
                "projectId",
                format!("project still has {} task(s)", owned.len()),
            )
            .into());
        }
        Ok(owned)
    }

    async fn finish_removal(&self, project: &ProjectId, owned: Vec<TaskId>) -> Result<(), ClientError> {
        info!(project_id = %project, tasks = owned.len(), policy = ?self.deletion, "project deleted");
        if self.deletion != ProjectDeletionPolicy::CascadeDeleteTasks {
            return Ok(());
        }
        let mut first_error = None;
        for id in owned {
            match self.remove(&id).await {
                Ok(()) | Err(ClientError::NotFound(_)) => {}
                Err(err) => {
                    warn!(task_id = %id, error = %err, "cascade delete failed");
                    let _ = first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl SessionScoped for TaskStore {
    fn name(&self) -> &'static str {
        "tasks"
    }

    async fn attach(&self, _session: &Session) -> Result<(), SyncError> {
        self.synced.attach(None).await
    }

    async fn detach(&self) {
        self.synced.detach().await;
        self.activity.lock().clear();
    }
}
