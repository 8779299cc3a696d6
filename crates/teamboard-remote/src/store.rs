//! The remote store capability.

use async_trait::async_trait;
use teamboard_core::{Collection, Credentials};
use tokio::sync::{mpsc, watch};

use crate::errors::Result;
use crate::types::{AuthGrant, AuthState, DocumentWrite, Filter, Snapshot, WriteAck};

/// Live feed of full collection snapshots.
///
/// The first item is the current contents; one more arrives after every
/// change. An `Err` item ends the feed. Dropping the receiver unsubscribes.
pub type SnapshotFeed = mpsc::UnboundedReceiver<Result<Snapshot>>;

/// A real-time document store with an attached auth service.
///
/// The client treats it as the source of truth: every store keeps a local
/// cache that is fed exclusively by [`subscribe_collection`](RemoteStore::subscribe_collection).
/// One handle is shared by every store of a workspace.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Exchange credentials for a session.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthGrant>;

    /// End the remote session.
    async fn sign_out(&self) -> Result<()>;

    /// Observe the auth state. Dropping the receiver unsubscribes.
    fn watch_auth_state(&self) -> watch::Receiver<AuthState>;

    /// Open a live snapshot feed on `collection`.
    async fn subscribe_collection(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> Result<SnapshotFeed>;

    /// Create or patch a document.
    async fn write_document(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> Result<WriteAck>;

    /// Delete a document. Fails with [`RemoteError::NotFound`](crate::RemoteError::NotFound) if already gone.
    async fn delete_document(&self, collection: Collection, id: &str) -> Result<WriteAck>;
}
