//! # teamboard-stores
//!
//! Session-scoped client stores backed by a [`RemoteStore`](teamboard_remote::RemoteStore).
//!
//! - [`SessionStore`]: sign-in lifecycle; attaches and detaches every
//!   registered [`SessionScoped`] store
//! - [`DirectoryStore`]: read-only user roster
//! - [`ProjectStore`] and [`TaskStore`]: optimistic mutations with rollback
//!   on rejection and field-level reconciliation against live snapshots
//! - [`SyncedCollection`]: the cache and pending-write bookkeeping shared by
//!   the collection stores

#![deny(unsafe_code)]

pub mod collection;
pub mod directory;
pub mod entity;
pub mod projects;
pub mod session;
pub mod subscription;
mod synced;
pub mod tasks;

pub use collection::{ReconcileOutcome, SyncedCollection, Ticket};
pub use directory::DirectoryStore;
pub use entity::Entity;
pub use projects::{ProjectReferences, ProjectStore};
pub use session::{SessionEvent, SessionScoped, SessionStatus, SessionStore};
pub use subscription::Subscription;
pub use tasks::{ActivityEntry, ActivityKind, TaskStore};
