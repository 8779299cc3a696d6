//! Session-scoped plumbing shared by every collection store: the live
//! subscription, the cache it feeds, and optimistic writes against it.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use serde_json::{Map, Value};
use teamboard_core::{AuthError, ClientError, SyncError};
use teamboard_remote::{DocumentWrite, Filter, RemoteStore, WriteAck, to_object};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collection::{SyncedCollection, Ticket};
use crate::entity::Entity;
use crate::subscription::Subscription;

struct Scope {
    token: CancellationToken,
    subscription: Subscription,
}

/// The live scope, plus a counter bumped by every detach. An attach only
/// installs its scope if no detach ran while it was subscribing.
#[derive(Default)]
struct Slot {
    generation: u64,
    scope: Option<Scope>,
}

pub(crate) struct SyncedStore<T: Entity> {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<Mutex<SyncedCollection<T>>>,
    slot: Mutex<Slot>,
}

impl<T: Entity> SyncedStore<T> {
    pub(crate) fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            cache: Arc::new(Mutex::new(SyncedCollection::new())),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub(crate) fn cache(&self) -> MutexGuard<'_, SyncedCollection<T>> {
        self.cache.lock()
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.slot.lock().scope.is_some()
    }

    /// Open the live subscription and wait for the initial snapshot.
    ///
    /// An existing subscription is closed first, so at most one is live.
    /// If the store is detached (or attached again) before the initial
    /// snapshot arrives, the new feed is dropped and nothing is installed.
    pub(crate) async fn attach(&self, filter: Option<Filter>) -> Result<(), SyncError> {
        self.detach().await;
        let generation = self.slot.lock().generation;

        let collection = T::COLLECTION;
        let mut feed = self
            .remote
            .subscribe_collection(collection, filter)
            .await
            .map_err(|e| e.into_subscription_error(collection))?;

        let initial = match feed.recv().await {
            Some(Ok(snapshot)) => snapshot,
            Some(Err(err)) => return Err(err.into_subscription_error(collection)),
            None => {
                return Err(SyncError::Subscription {
                    collection,
                    message: "feed closed before the first snapshot".into(),
                });
            }
        };

        let mut slot = self.slot.lock();
        if slot.generation != generation {
            debug!(%collection, "detached while subscribing, dropping feed");
            return Err(SyncError::Subscription {
                collection,
                message: "session ended while subscribing".into(),
            });
        }
        let outcome = self.cache.lock().reconcile(initial);
        info!(%collection, documents = outcome.documents, "collection loaded");

        let token = CancellationToken::new();
        let cache = Arc::clone(&self.cache);
        let subscription = Subscription::snapshots(collection, feed, token.child_token(), move |snapshot| {
            let revision = snapshot.revision;
            let outcome = cache.lock().reconcile(snapshot);
            debug!(
                %collection,
                revision,
                documents = outcome.documents,
                shielded = outcome.shielded_fields,
                kept_local = outcome.kept_local,
                skipped = outcome.skipped,
                "snapshot applied"
            );
        });
        let replaced = slot.scope.replace(Scope {
            token,
            subscription,
        });
        if let Some(replaced) = replaced {
            replaced.token.cancel();
        }
        Ok(())
    }

    /// Close the subscription, abandon in-flight writes and clear the cache.
    pub(crate) async fn detach(&self) {
        let scope = {
            let mut slot = self.slot.lock();
            slot.generation += 1;
            slot.scope.take()
        };
        if let Some(scope) = scope {
            scope.token.cancel();
            scope.subscription.close().await;
            debug!(collection = %T::COLLECTION, "subscription closed");
        }
        self.cache.lock().clear();
    }

    /// Token of the current session scope; writes started under it are
    /// abandoned once it is cancelled.
    pub(crate) fn scope_token(&self) -> Result<CancellationToken, AuthError> {
        self.slot
            .lock()
            .scope
            .as_ref()
            .map(|scope| scope.token.clone())
            .ok_or(AuthError::NotSignedIn)
    }

    /// Send an optimistic write and settle its ticket.
    pub(crate) async fn write(
        &self,
        token: &CancellationToken,
        ticket: Ticket<T>,
        write: DocumentWrite,
    ) -> Result<WriteAck, ClientError> {
        let collection = T::COLLECTION;
        let id = ticket.id().to_string();
        let result = self.remote.write_document(collection, &id, write).await;
        self.settle(token, ticket, result)
    }

    /// Send an optimistic delete and settle its ticket.
    ///
    /// A document already gone remotely counts as deleted.
    pub(crate) async fn delete(
        &self,
        token: &CancellationToken,
        ticket: Ticket<T>,
    ) -> Result<(), ClientError> {
        let collection = T::COLLECTION;
        let id = ticket.id().to_string();
        match self.remote.delete_document(collection, &id).await {
            Err(err) if err.as_not_found().is_some() && !token.is_cancelled() => {
                self.cache.lock().drop_entry(&id);
                Ok(())
            }
            result => self.settle(token, ticket, result).map(drop),
        }
    }

    fn settle(
        &self,
        token: &CancellationToken,
        ticket: Ticket<T>,
        result: teamboard_remote::Result<WriteAck>,
    ) -> Result<WriteAck, ClientError> {
        let collection = T::COLLECTION;
        let id = ticket.id().to_string();

        if token.is_cancelled() {
            warn!(%collection, %id, "session ended during write, outcome discarded");
            return Err(SyncError::Abandoned { collection, id }.into());
        }

        match result {
            Ok(ack) => {
                self.cache.lock().confirm(&ticket, ack.revision);
                debug!(%collection, %id, revision = ack.revision, "write acknowledged");
                Ok(ack)
            }
            Err(err) => {
                if let Some(not_found) = err.as_not_found() {
                    warn!(%collection, %id, "document vanished remotely, dropping local copy");
                    self.cache.lock().drop_entry(&id);
                    return Err(not_found.into());
                }
                warn!(%collection, %id, error = %err, "write rejected, rolling back");
                self.cache.lock().rollback(ticket);
                Err(err.into_sync_error(collection, &id).into())
            }
        }
    }
}

/// Wire names a patch writes, and their post-apply values in `updated`.
pub(crate) fn patch_payload<P, T>(patch: &P, updated: &T) -> (Vec<String>, Map<String, Value>)
where
    P: Serialize,
    T: Serialize,
{
    let fields: Vec<String> = to_object(patch).into_iter().map(|(field, _)| field).collect();
    let current = to_object(updated);
    let payload = fields
        .iter()
        .filter_map(|field| current.get(field).map(|value| (field.clone(), value.clone())))
        .collect();
    (fields, payload)
}
