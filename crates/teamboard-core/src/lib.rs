//! # teamboard-core
//!
//! Foundation types, errors, branded IDs, and logging for the Teamboard client.
//!
//! This crate provides the shared vocabulary every other Teamboard crate
//! depends on:
//!
//! - **Branded IDs**: `UserId`, `ProjectId`, `TaskId` as newtypes for type safety
//! - **Domain types**: sessions, directory users, projects, tasks, patches
//! - **Errors**: the `ClientError` taxonomy (`AuthError`, `ValidationError`,
//!   `NotFoundError`, `SyncError`) via `thiserror`
//! - **Routes**: the navigation surface and its access rules
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod routes;
pub mod types;

pub use errors::{AuthError, ClientError, NotFoundError, Surface, SyncError, ValidationError};
pub use ids::{ProjectId, TaskId, UserId};
pub use routes::{Resolved, Route};
pub use types::*;
