use serde::{Deserialize, Serialize};

/// What happens to a project's tasks when the project is deleted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectDeletionPolicy {
    /// Delete every task of the project along with it.
    #[default]
    CascadeDeleteTasks,
    /// Keep the tasks remotely but tag them orphaned and hide them.
    OrphanAndHide,
    /// Refuse to delete a project that still has tasks.
    RejectWhileTasksExist,
}

/// Who may create projects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectCreationPolicy {
    /// Any signed-in user.
    #[default]
    AnyMember,
    /// Admins only.
    AdminOnly,
}

/// Where a signed-in user lacking the required role is sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoleRedirect {
    /// The default authenticated destination.
    #[default]
    Dashboard,
    /// The sign-in page, treating "wrong role" like "not signed in".
    Login,
}

/// Behaviour switches for the stores and the route guard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySettings {
    /// Project deletion cascade.
    pub project_deletion: ProjectDeletionPolicy,
    /// Project creation gate.
    pub project_creation: ProjectCreationPolicy,
    /// Role-mismatch redirect target.
    pub role_mismatch_redirect: RoleRedirect,
}
