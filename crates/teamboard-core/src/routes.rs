//! Navigation surface.
//!
//! | path | route | access |
//! |---|---|---|
//! | `/login` | [`Route::Login`] | public |
//! | `/dashboard` | [`Route::Dashboard`] | signed in |
//! | `/projects` | [`Route::Projects`] | signed in |
//! | `/projects/:projectId` | [`Route::Project`] | signed in |
//! | `/tasks/:taskId` | [`Route::Task`] | signed in |
//! | `/users` | [`Route::Users`] | admin |
//!
//! `/` and anything unrecognised resolve to the dashboard.

use std::fmt;

use crate::ids::{ProjectId, TaskId};
use crate::types::Role;

/// A destination in the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// Sign-in page.
    Login,
    /// Default authenticated destination.
    Dashboard,
    /// Project list.
    Projects,
    /// Single project board.
    Project(ProjectId),
    /// Single task detail.
    Task(TaskId),
    /// User roster (admin only).
    Users,
}

/// Result of resolving a raw path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// The path names a route directly.
    Exact(Route),
    /// The path is `/` or unknown and redirects to the given route.
    Redirect(Route),
}

impl Resolved {
    /// The route ultimately shown.
    pub fn route(&self) -> &Route {
        match self {
            Self::Exact(route) | Self::Redirect(route) => route,
        }
    }
}

impl Route {
    /// Where signed-in users land by default.
    pub const DEFAULT_AUTHENTICATED: Route = Route::Dashboard;

    /// Parse a path. Query strings, fragments and a trailing slash are ignored.
    ///
    /// Returns `None` for `/` and unknown paths.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        let route = match (segments.next()?, segments.next()) {
            ("login", None) => Route::Login,
            ("dashboard", None) => Route::Dashboard,
            ("projects", None) => Route::Projects,
            ("projects", Some(id)) => Route::Project(ProjectId::from(id)),
            ("tasks", Some(id)) => Route::Task(TaskId::from(id)),
            ("users", None) => Route::Users,
            _ => return None,
        };
        segments.next().is_none().then_some(route)
    }

    /// Parse a path, applying the catch-all redirect.
    pub fn resolve(path: &str) -> Resolved {
        match Self::parse(path) {
            Some(route) => Resolved::Exact(route),
            None => Resolved::Redirect(Self::DEFAULT_AUTHENTICATED),
        }
    }

    /// Canonical path.
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Dashboard => "/dashboard".to_string(),
            Self::Projects => "/projects".to_string(),
            Self::Project(id) => format!("/projects/{id}"),
            Self::Task(id) => format!("/tasks/{id}"),
            Self::Users => "/users".to_string(),
        }
    }

    /// Reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Login)
    }

    /// Role a session must hold, beyond being signed in.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Self::Users => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
