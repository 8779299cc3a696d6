//! # teamboard-remote
//!
//! The boundary between the client stores and the hosted real-time
//! document/auth service.
//!
//! - [`RemoteStore`]: the capability set the stores rely on (auth, live
//!   collection snapshots, document writes)
//! - Wire types: [`Document`], [`Snapshot`], [`DocumentWrite`], [`WriteAck`],
//!   [`AuthState`]
//! - [`MemoryRemote`]: an in-process implementation with fault injection,
//!   used by tests and the CLI

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod store;
pub mod types;

pub use errors::{RemoteError, Result};
pub use memory::{MemoryRemote, to_object};
pub use store::{RemoteStore, SnapshotFeed};
pub use types::{
    AuthGrant, AuthState, Document, DocumentWrite, Filter, Identity, Snapshot, WriteAck,
};
