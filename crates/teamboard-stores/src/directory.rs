//! Read-only mirror of the team roster.

use std::sync::Arc;

use async_trait::async_trait;
use teamboard_core::constants::UNASSIGNED_LABEL;
use teamboard_core::{Session, SyncError, User, UserId};
use teamboard_remote::RemoteStore;

use crate::session::SessionScoped;
use crate::synced::SyncedStore;

/// Known users, in remote insertion order.
///
/// Loaded when a session starts and cleared when it ends. Users are created
/// and removed by other clients; this store never writes.
pub struct DirectoryStore {
    synced: SyncedStore<User>,
}

impl DirectoryStore {
    /// Create an unloaded directory.
    pub fn new(remote: Arc<dyn RemoteStore>) -> Arc<Self> {
        Arc::new(Self {
            synced: SyncedStore::new(remote),
        })
    }

    /// All users.
    pub fn list_users(&self) -> Vec<User> {
        self.synced.cache().list()
    }

    /// Look up a user.
    pub fn get(&self, id: &UserId) -> Option<User> {
        self.synced.cache().get(id.as_str()).cloned()
    }

    /// Whether `id` is a known user.
    pub fn contains(&self, id: &UserId) -> bool {
        self.synced.cache().contains(id.as_str())
    }

    /// Name to show for an optional user reference.
    ///
    /// Empty or dangling references render as "Unassigned".
    pub fn display_name(&self, id: Option<&UserId>) -> String {
        id.and_then(|id| self.get(id))
            .map_or_else(|| UNASSIGNED_LABEL.to_string(), |user| user.name)
    }

    /// Whether the initial snapshot has arrived.
    pub fn is_loaded(&self) -> bool {
        self.synced.cache().is_loaded()
    }

    /// Whether a live subscription is open.
    pub fn is_attached(&self) -> bool {
        self.synced.is_attached()
    }
}

#[async_trait]
impl SessionScoped for DirectoryStore {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn attach(&self, _session: &Session) -> Result<(), SyncError> {
        self.synced.attach(None).await
    }

    async fn detach(&self) {
        self.synced.detach().await;
    }
}
