//! # teamboard-client
//!
//! The client surface over the Teamboard stores.
//!
//! - [`Workspace`]: builds the store graph around one remote handle and owns
//!   its lifecycle (`initialize`, `shutdown`)
//! - [`RouteGuard`]: admits or redirects navigation from session and role
//! - [`notify`]: toast stack and confirmation queue
//! - [`forms`]: task and project forms that validate input and emit intents

#![deny(unsafe_code)]

pub mod forms;
pub mod guard;
pub mod notify;
pub mod workspace;

pub use forms::{ProjectForm, ProjectIntent, TaskForm, TaskIntent};
pub use guard::{Decision, GuardState, RouteGuard};
pub use notify::{Notifications, Toast, ToastLevel, ToastQueue};
pub use workspace::{Workspace, WorkspaceState};
