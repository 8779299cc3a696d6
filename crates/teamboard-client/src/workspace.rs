//! Wires the stores, guard and notifications around one remote handle.

use std::sync::Arc;

use serde::Serialize;
use teamboard_core::{ClientError, Credentials, Project, Session, Task, User};
use teamboard_remote::RemoteStore;
use teamboard_settings::TeamboardSettings;
use teamboard_stores::{
    DirectoryStore, ProjectStore, SessionScoped, SessionStatus, SessionStore, TaskStore,
};
use tracing::info;

use crate::guard::RouteGuard;
use crate::notify::{Notifications, Toast, ToastId};

/// Everything a client needs, constructed in dependency order.
///
/// Session comes first, then the directory, projects and tasks, each taking
/// the `Arc`s of what it depends on, then notifications and the guard.
pub struct Workspace {
    remote: Arc<dyn RemoteStore>,
    session: Arc<SessionStore>,
    directory: Arc<DirectoryStore>,
    projects: Arc<ProjectStore>,
    tasks: Arc<TaskStore>,
    notifications: Notifications,
    guard: RouteGuard,
}

/// Point-in-time copy of the client state.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    /// Live session.
    pub session: Option<Session>,
    /// Directory.
    pub users: Vec<User>,
    /// Projects.
    pub projects: Vec<Project>,
    /// Visible tasks.
    pub tasks: Vec<Task>,
    /// Tasks whose project is gone.
    pub orphans: Vec<Task>,
    /// Toasts on screen.
    pub toasts: Vec<Toast>,
}

impl Workspace {
    /// Build the store graph. Nothing is loaded until a session exists.
    pub fn new(remote: Arc<dyn RemoteStore>, settings: &TeamboardSettings) -> Self {
        let policy = &settings.policy;
        let session = SessionStore::new(remote.clone());
        let directory = DirectoryStore::new(remote.clone());
        let projects = ProjectStore::new(
            remote.clone(),
            session.clone(),
            directory.clone(),
            policy.project_creation,
        );
        let tasks = TaskStore::new(
            remote.clone(),
            session.clone(),
            projects.clone(),
            directory.clone(),
            policy.project_deletion,
        );
        let dependents: [Arc<dyn SessionScoped>; 3] =
            [directory.clone(), projects.clone(), tasks.clone()];
        for dependent in &dependents {
            session.register(dependent);
        }
        let notifications = Notifications::new(&settings.notifications);
        let guard = RouteGuard::new(session.clone(), policy.role_mismatch_redirect);

        Self {
            remote,
            session,
            directory,
            projects,
            tasks,
            notifications,
            guard,
        }
    }

    /// Resolve the initial session, loading the stores if one is restored.
    pub async fn initialize(&self) -> Result<SessionStatus, ClientError> {
        let status = self.session.initialize().await?;
        info!(?status, "workspace initialized");
        Ok(status)
    }

    /// Sign in and load the stores.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ClientError> {
        self.session.sign_in(credentials).await
    }

    /// Sign out and clear the stores.
    pub async fn sign_out(&self) {
        self.session.sign_out().await;
    }

    /// Tear everything down without signing out remotely.
    pub async fn shutdown(&self) {
        self.session.shutdown().await;
        self.notifications.confirms.reject_all();
        self.notifications.toasts.clear();
        info!("workspace shut down");
    }

    /// Show `err` as a toast if that is how it surfaces.
    pub fn report(&self, err: &ClientError) -> Option<ToastId> {
        self.notifications.toasts.notify_error(err)
    }

    /// Copy of the current state.
    pub fn state(&self) -> WorkspaceState {
        WorkspaceState {
            session: self.session.current_session(),
            users: self.directory.list_users(),
            projects: self.projects.list(),
            tasks: self.tasks.list(),
            orphans: self.tasks.orphans(),
            toasts: self.notifications.toasts.visible(),
        }
    }

    /// The remote handle shared by every store.
    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Session store.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Directory store.
    pub fn directory(&self) -> &Arc<DirectoryStore> {
        &self.directory
    }

    /// Project store.
    pub fn projects(&self) -> &Arc<ProjectStore> {
        &self.projects
    }

    /// Task store.
    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.tasks
    }

    /// Toasts and confirmations.
    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    /// Navigation guard.
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }
}
