//! Projects, with optimistic create/update/remove.
//!
//! Deleting a project always goes through [`ProjectStore::remove`]. Whatever
//! references projects (the task store) registers as [`ProjectReferences`]
//! and applies the configured deletion policy before and after the delete.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use teamboard_core::{
    AuthError, ClientError, Collection, NotFoundError, Project, ProjectId, ProjectInput,
    ProjectPatch, Role, Session, SyncError, TaskId, UserId, ValidationError,
};
use teamboard_remote::{DocumentWrite, RemoteStore, to_object};
use teamboard_settings::ProjectCreationPolicy;
use tracing::{debug, info};

use crate::directory::DirectoryStore;
use crate::session::{SessionScoped, SessionStore};
use crate::synced::{SyncedStore, patch_payload};

/// Something that references projects and must agree to their deletion.
#[async_trait]
pub trait ProjectReferences: Send + Sync {
    /// Called before `project` is removed. An error refuses the deletion;
    /// `Ok` carries whatever [`finish_removal`](Self::finish_removal) needs.
    fn prepare_removal(&self, project: &ProjectId) -> Result<Vec<TaskId>, ClientError>;

    /// Called once the project delete was acknowledged.
    async fn finish_removal(&self, project: &ProjectId, referencing: Vec<TaskId>) -> Result<(), ClientError>;
}

/// The set of projects visible to the session.
pub struct ProjectStore {
    session: Arc<SessionStore>,
    directory: Arc<DirectoryStore>,
    creation: ProjectCreationPolicy,
    synced: SyncedStore<Project>,
    references: Mutex<Option<Weak<dyn ProjectReferences>>>,
}

impl ProjectStore {
    /// Create an unloaded store.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        session: Arc<SessionStore>,
        directory: Arc<DirectoryStore>,
        creation: ProjectCreationPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            directory,
            creation,
            synced: SyncedStore::new(remote),
            references: Mutex::new(None),
        })
    }

    /// Route every deletion through `references`. Only a weak reference is kept.
    pub fn set_references(&self, references: &Arc<dyn ProjectReferences>) {
        *self.references.lock() = Some(Arc::downgrade(references));
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// All projects in remote insertion order.
    pub fn list(&self) -> Vec<Project> {
        self.synced.cache().list()
    }

    /// Projects `user` created or is a member of.
    pub fn list_for_member(&self, user: &UserId) -> Vec<Project> {
        self.synced
            .cache()
            .iter()
            .filter(|p| p.is_member(user))
            .cloned()
            .collect()
    }

    /// Look up a project.
    pub fn get(&self, id: &ProjectId) -> Option<Project> {
        self.synced.cache().get(id.as_str()).cloned()
    }

    /// Whether the project exists.
    pub fn contains(&self, id: &ProjectId) -> bool {
        self.synced.cache().contains(id.as_str())
    }

    /// Ids of every live project.
    pub fn ids(&self) -> HashSet<ProjectId> {
        self.synced.cache().iter().map(|p| p.id.clone()).collect()
    }

    /// Whether the initial snapshot has arrived.
    pub fn is_loaded(&self) -> bool {
        self.synced.cache().is_loaded()
    }

    // ── Mutations ───────────────────────────────────────────────────────

    /// Create a project owned by the signed-in user.
    ///
    /// The creator must be in the directory and is always a member.
    pub async fn create(&self, input: ProjectInput) -> Result<Project, ClientError> {
        input.validate()?;
        let session = self.session.require_session()?;
        if self.creation == ProjectCreationPolicy::AdminOnly && !session.role.is_admin() {
            return Err(AuthError::Forbidden {
                action: "creating a project".into(),
                required: Role::Admin,
            }
            .into());
        }
        if !self.directory.contains(&session.user_id) {
            return Err(ValidationError::new("createdBy", "creator is not in the directory").into());
        }
        self.check_members(&input.members)?;
        let token = self.synced.scope_token()?;

        let mut members = input.members;
        let _ = members.insert(session.user_id.clone());
        let project = Project {
            id: ProjectId::new(),
            name: input.name.trim().to_string(),
            description: input.description.filter(|d| !d.trim().is_empty()),
            created_by: session.user_id,
            created_at: Utc::now(),
            members,
        };

        let ticket = self.synced.cache().insert_local(project.clone());
        info!(project_id = %project.id, "project created locally");
        let _ = self
            .synced
            .write(&token, ticket, DocumentWrite::Create(to_object(&project)))
            .await?;
        Ok(project)
    }

    /// Patch a project. Requires admin, creator or membership.
    pub async fn update(&self, id: &ProjectId, patch: &ProjectPatch) -> Result<(), ClientError> {
        patch.validate()?;
        let session = self.session.require_session()?;
        if let Some(members) = &patch.members {
            self.check_members(members)?;
        }
        let token = self.synced.scope_token()?;
        if patch.is_empty() {
            return Ok(());
        }

        let (ticket, payload) = {
            let mut cache = self.synced.cache();
            let current = cache
                .get(id.as_str())
                .ok_or_else(|| NotFoundError::new(Collection::Projects, id.as_str()))?;
            authorize(&session, current, "updating a project")?;
            let mut updated = current.clone();
            let changes = updated.apply(patch);
            debug!(project_id = %id, changed = changes.len(), "project patched locally");
            let (fields, payload) = patch_payload(patch, &updated);
            let ticket = cache
                .replace_local(updated, fields)
                .ok_or_else(|| NotFoundError::new(Collection::Projects, id.as_str()))?;
            (ticket, payload)
        };

        let _ = self
            .synced
            .write(&token, ticket, DocumentWrite::Patch(payload))
            .await?;
        Ok(())
    }

    /// Delete a project. Requires admin, creator or membership.
    ///
    /// The registered [`ProjectReferences`] may refuse the deletion, and
    /// handles the project's tasks once the delete is acknowledged.
    pub async fn remove(&self, id: &ProjectId) -> Result<(), ClientError> {
        let session = self.session.require_session()?;
        let token = self.synced.scope_token()?;
        {
            let cache = self.synced.cache();
            let current = cache
                .get(id.as_str())
                .ok_or_else(|| NotFoundError::new(Collection::Projects, id.as_str()))?;
            authorize(&session, current, "deleting a project")?;
        }

        let references = self.references.lock().as_ref().and_then(Weak::upgrade);
        let referencing = match &references {
            Some(references) => references.prepare_removal(id)?,
            None => Vec::new(),
        };

        let ticket = self
            .synced
            .cache()
            .remove_local(id.as_str())
            .ok_or_else(|| NotFoundError::new(Collection::Projects, id.as_str()))?;
        info!(project_id = %id, "project removed locally");
        self.synced.delete(&token, ticket).await?;

        match references {
            Some(references) => references.finish_removal(id, referencing).await,
            None => Ok(()),
        }
    }

    fn check_members(&self, members: &BTreeSet<UserId>) -> Result<(), ValidationError> {
        match members.iter().find(|m| !self.directory.contains(m)) {
            Some(unknown) => Err(ValidationError::new(
                "members",
                format!("unknown user {unknown}"),
            )),
            None => Ok(()),
        }
    }
}

fn authorize(session: &Session, project: &Project, action: &'static str) -> Result<(), AuthError> {
    if session.role.is_admin() || project.is_member(&session.user_id) {
        return Ok(());
    }
    Err(AuthError::Forbidden {
        action: action.into(),
        required: Role::Admin,
    })
}

#[async_trait]
impl SessionScoped for ProjectStore {
    fn name(&self) -> &'static str {
        "projects"
    }

    async fn attach(&self, _session: &Session) -> Result<(), SyncError> {
        self.synced.attach(None).await
    }

    async fn detach(&self) {
        self.synced.detach().await;
    }
}
