//! In-process [`RemoteStore`] backed by ordered maps.
//!
//! Behaves like the hosted document store as far as the client can tell:
//! documents keep insertion order, every write bumps a store-wide revision,
//! subscribers receive a full snapshot after every change, and writes
//! require a signed-in session.
//!
//! It also exposes fault injection for tests and demos:
//!
//! - [`set_offline`](MemoryRemote::set_offline) fails every call with `Unavailable`
//! - [`fail_next_writes`](MemoryRemote::fail_next_writes) fails the next `n` writes
//! - [`hold_writes`](MemoryRemote::hold_writes) parks writes until [`release_writes`](MemoryRemote::release_writes)
//! - [`hold_subscriptions`](MemoryRemote::hold_subscriptions) parks new feeds on one collection;
//!   a parked feed still opens once released, even if the session ended meanwhile
//! - [`fail_subscriptions`](MemoryRemote::fail_subscriptions) refuses new feeds on one collection
//! - [`external_write`](MemoryRemote::external_write) simulates another client
//! - [`revoke_session`](MemoryRemote::revoke_session) expires the live token

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use teamboard_core::{Collection, Credentials, User};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{RemoteError, Result};
use crate::store::{RemoteStore, SnapshotFeed};
use crate::types::{
    AuthGrant, AuthState, Document, DocumentWrite, Filter, Identity, Snapshot, WriteAck,
};

struct Account {
    password: String,
    user: User,
}

struct Subscriber {
    filter: Option<Filter>,
    tx: mpsc::UnboundedSender<Result<Snapshot>>,
}

#[derive(Default)]
struct State {
    revision: u64,
    accounts: HashMap<String, Account>,
    collections: HashMap<Collection, IndexMap<String, Document>>,
    subscribers: HashMap<Collection, Vec<Subscriber>>,
    write_counts: HashMap<Collection, usize>,
    offline: bool,
    failing_writes: usize,
    failing_subscriptions: HashSet<Collection>,
}

impl State {
    fn snapshot(&self, collection: Collection, filter: Option<&Filter>) -> Snapshot {
        let documents = self
            .collections
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.is_none_or(|f| f.matches(&doc.data)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Snapshot {
            collection,
            revision: self.revision,
            documents,
        }
    }

    fn broadcast(&mut self, collection: Collection) {
        let Some(mut subscribers) = self.subscribers.remove(&collection) else {
            return;
        };
        subscribers.retain(|sub| {
            let snapshot = self.snapshot(collection, sub.filter.as_ref());
            sub.tx.send(Ok(snapshot)).is_ok()
        });
        debug!(%collection, subscribers = subscribers.len(), revision = self.revision, "snapshot broadcast");
        let _ = self.subscribers.insert(collection, subscribers);
    }

    fn apply_write(&mut self, collection: Collection, id: &str, write: DocumentWrite) -> Result<WriteAck> {
        let revision = self.revision + 1;
        let updated_at = Utc::now();
        let docs = self.collections.entry(collection).or_default();

        match write {
            DocumentWrite::Create(data) => {
                let doc = Document {
                    id: id.to_string(),
                    revision,
                    updated_at,
                    data,
                };
                // Replacing keeps the original insertion slot.
                let _ = docs.insert(id.to_string(), doc);
            }
            DocumentWrite::Patch(fields) => {
                let doc = docs.get_mut(id).ok_or_else(|| RemoteError::NotFound {
                    collection,
                    id: id.to_string(),
                })?;
                for (field, value) in fields {
                    let _ = doc.data.insert(field, value);
                }
                doc.revision = revision;
                doc.updated_at = updated_at;
            }
        }

        self.revision = revision;
        self.broadcast(collection);
        Ok(WriteAck {
            revision,
            updated_at,
        })
    }

    fn apply_delete(&mut self, collection: Collection, id: &str) -> Result<WriteAck> {
        let removed = self
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.shift_remove(id));
        if removed.is_none() {
            return Err(RemoteError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        self.revision += 1;
        self.broadcast(collection);
        Ok(WriteAck {
            revision: self.revision,
            updated_at: Utc::now(),
        })
    }
}

/// In-process remote document/auth store.
pub struct MemoryRemote {
    state: Mutex<State>,
    auth: watch::Sender<AuthState>,
    gate: watch::Sender<bool>,
    held: AtomicUsize,
    subscribe_gate: watch::Sender<Option<Collection>>,
    held_subscriptions: AtomicUsize,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Create an empty store with nobody signed in.
    pub fn new() -> Self {
        let (auth, _) = watch::channel(AuthState::SignedOut);
        let (gate, _) = watch::channel(true);
        let (subscribe_gate, _) = watch::channel(None);
        Self {
            state: Mutex::new(State::default()),
            auth,
            gate,
            held: AtomicUsize::new(0),
            subscribe_gate,
            held_subscriptions: AtomicUsize::new(0),
        }
    }

    // ── Seeding ─────────────────────────────────────────────────────────

    /// Register a sign-in account and publish its user in the directory.
    pub fn add_account(&self, email: &str, password: &str, user: User) {
        let data = to_object(&user);
        let mut state = self.state.lock();
        let _ = state.accounts.insert(
            email.trim().to_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        let _ = state.apply_write(Collection::Users, user.id.as_str(), DocumentWrite::Create(data));
    }

    /// Write as another client would: no session, no gate, no injected failures.
    pub fn external_write(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> Result<WriteAck> {
        self.state.lock().apply_write(collection, id, write)
    }

    /// Delete as another client would.
    pub fn external_delete(&self, collection: Collection, id: &str) -> Result<WriteAck> {
        self.state.lock().apply_delete(collection, id)
    }

    // ── Fault injection ─────────────────────────────────────────────────

    /// Fail every call with `Unavailable` while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Fail the next `count` writes or deletes.
    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().failing_writes = count;
    }

    /// Park every subsequent write before it is applied.
    pub fn hold_writes(&self) {
        let _ = self.gate.send_replace(false);
    }

    /// Let parked and future writes proceed.
    pub fn release_writes(&self) {
        let _ = self.gate.send_replace(true);
    }

    /// Number of writes currently parked.
    pub fn held_writes(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Park new subscriptions to `collection` after the session check.
    pub fn hold_subscriptions(&self, collection: Collection) {
        let _ = self.subscribe_gate.send_replace(Some(collection));
    }

    /// Let parked and future subscriptions proceed.
    pub fn release_subscriptions(&self) {
        let _ = self.subscribe_gate.send_replace(None);
    }

    /// Number of subscriptions currently parked.
    pub fn held_subscriptions(&self) -> usize {
        self.held_subscriptions.load(Ordering::SeqCst)
    }

    /// Refuse new subscriptions to `collection` with `Unavailable` while `fail` is set.
    pub fn fail_subscriptions(&self, collection: Collection, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            let _ = state.failing_subscriptions.insert(collection);
        } else {
            let _ = state.failing_subscriptions.remove(&collection);
        }
    }

    /// Expire the live session: auth watchers see `Revoked` and every feed
    /// receives a terminal error.
    pub fn revoke_session(&self) {
        let mut state = self.state.lock();
        for (_, subscribers) in state.subscribers.drain() {
            for sub in subscribers {
                let _ = sub.tx.send(Err(RemoteError::Revoked));
            }
        }
        drop(state);
        let _ = self.auth.send_replace(AuthState::Revoked);
        info!("session revoked");
    }

    // ── Inspection ──────────────────────────────────────────────────────

    /// Live subscriptions on `collection`.
    pub fn subscriber_count(&self, collection: Collection) -> usize {
        let mut state = self.state.lock();
        state.subscribers.get_mut(&collection).map_or(0, |subs| {
            subs.retain(|sub| !sub.tx.is_closed());
            subs.len()
        })
    }

    /// Successful client writes and deletes on `collection`.
    pub fn write_count(&self, collection: Collection) -> usize {
        self.state
            .lock()
            .write_counts
            .get(&collection)
            .copied()
            .unwrap_or_default()
    }

    /// A stored document.
    pub fn document(&self, collection: Collection, id: &str) -> Option<Document> {
        self.state
            .lock()
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id).cloned())
    }

    /// Current contents of `collection`.
    pub fn snapshot(&self, collection: Collection) -> Snapshot {
        self.state.lock().snapshot(collection, None)
    }

    /// Current store revision.
    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn ensure_online(&self) -> Result<()> {
        if self.state.lock().offline {
            return Err(RemoteError::Unavailable("remote store is offline".into()));
        }
        Ok(())
    }

    fn ensure_signed_in(&self) -> Result<()> {
        match &*self.auth.borrow() {
            AuthState::SignedIn(_) => Ok(()),
            AuthState::Revoked => Err(RemoteError::Revoked),
            AuthState::SignedOut => Err(RemoteError::Unauthenticated),
        }
    }

    async fn pass_gate(&self) {
        park(self.gate.subscribe(), &self.held, |open| *open).await;
    }

    async fn pass_subscribe_gate(&self, collection: Collection) {
        park(
            self.subscribe_gate.subscribe(),
            &self.held_subscriptions,
            |held| *held != Some(collection),
        )
        .await;
    }

    fn admit_write(&self, collection: Collection) -> Result<()> {
        self.ensure_online()?;
        self.ensure_signed_in()?;
        let mut state = self.state.lock();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(RemoteError::Unavailable(format!(
                "write to {collection} failed"
            )));
        }
        Ok(())
    }
}

/// Wait until `open` holds for the gate's value, counting the wait in `held`.
async fn park<T>(mut gate: watch::Receiver<T>, held: &AtomicUsize, open: impl Fn(&T) -> bool) {
    if open(&gate.borrow_and_update()) {
        return;
    }
    let _ = held.fetch_add(1, Ordering::SeqCst);
    loop {
        if gate.changed().await.is_err() {
            break;
        }
        if open(&gate.borrow_and_update()) {
            break;
        }
    }
    let _ = held.fetch_sub(1, Ordering::SeqCst);
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthGrant> {
        self.ensure_online()?;
        let grant = {
            let state = self.state.lock();
            let account = state
                .accounts
                .get(&credentials.email.trim().to_lowercase())
                .filter(|account| account.password == credentials.password)
                .ok_or(RemoteError::InvalidCredentials)?;
            AuthGrant {
                identity: Identity {
                    user_id: account.user.id.clone(),
                    display_name: account.user.name.clone(),
                    role: account.user.role,
                },
                token: Uuid::now_v7().to_string(),
            }
        };
        info!(user_id = %grant.identity.user_id, "account authenticated");
        let _ = self.auth.send_replace(AuthState::SignedIn(grant.clone()));
        Ok(grant)
    }

    async fn sign_out(&self) -> Result<()> {
        let _ = self.auth.send_replace(AuthState::SignedOut);
        Ok(())
    }

    fn watch_auth_state(&self) -> watch::Receiver<AuthState> {
        self.auth.subscribe()
    }

    async fn subscribe_collection(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> Result<SnapshotFeed> {
        self.ensure_online()?;
        self.ensure_signed_in()?;
        self.pass_subscribe_gate(collection).await;
        if self.state.lock().failing_subscriptions.contains(&collection) {
            return Err(RemoteError::Unavailable(format!(
                "subscription to {collection} failed"
            )));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let initial = state.snapshot(collection, filter.as_ref());
        let _ = tx.send(Ok(initial));
        state
            .subscribers
            .entry(collection)
            .or_default()
            .push(Subscriber { filter, tx });
        debug!(%collection, "subscription opened");
        Ok(rx)
    }

    async fn write_document(
        &self,
        collection: Collection,
        id: &str,
        write: DocumentWrite,
    ) -> Result<WriteAck> {
        self.pass_gate().await;
        self.admit_write(collection)?;
        let mut state = self.state.lock();
        let ack = state.apply_write(collection, id, write)?;
        *state.write_counts.entry(collection).or_default() += 1;
        Ok(ack)
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<WriteAck> {
        self.pass_gate().await;
        self.admit_write(collection)?;
        let mut state = self.state.lock();
        let ack = state.apply_delete(collection, id)?;
        *state.write_counts.entry(collection).or_default() += 1;
        Ok(ack)
    }
}

/// Serialize a value into a document body.
///
/// Non-object values produce an empty body.
pub fn to_object<T: serde::Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;
    use teamboard_core::{Role, UserId};

    use super::*;

    fn remote_with_account() -> MemoryRemote {
        let remote = MemoryRemote::new();
        remote.add_account(
            "ada@example.com",
            "secret",
            User {
                id: UserId::from("u1"),
                name: "Ada".into(),
                role: Role::Admin,
                email: Some("ada@example.com".into()),
            },
        );
        remote
    }

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn signed_in() -> MemoryRemote {
        let remote = remote_with_account();
        let _ = remote
            .authenticate(&Credentials::new("ada@example.com", "secret"))
            .await
            .unwrap();
        remote
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let remote = remote_with_account();
        let err = remote
            .authenticate(&Credentials::new("ada@example.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::InvalidCredentials);

        let grant = remote
            .authenticate(&Credentials::new("ADA@example.com", "secret"))
            .await
            .unwrap();
        assert_eq!(grant.identity.role, Role::Admin);
        assert_matches!(&*remote.watch_auth_state().borrow(), AuthState::SignedIn(_));
    }

    #[tokio::test]
    async fn writes_require_session() {
        let remote = remote_with_account();
        let err = remote
            .write_document(Collection::Tasks, "t1", DocumentWrite::Create(Map::new()))
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::Unauthenticated);
    }

    #[tokio::test]
    async fn subscribers_see_initial_and_updates() {
        let remote = signed_in().await;
        let mut feed = remote
            .subscribe_collection(Collection::Users, None)
            .await
            .unwrap();
        let initial = feed.recv().await.unwrap().unwrap();
        assert_eq!(initial.documents.len(), 1);

        let ack = remote
            .write_document(
                Collection::Users,
                "u2",
                DocumentWrite::Create(body(json!({"id": "u2", "name": "Grace"}))),
            )
            .await
            .unwrap();
        let next = feed.recv().await.unwrap().unwrap();
        assert_eq!(next.revision, ack.revision);
        let ids: Vec<_> = next.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["u1", "u2"]);
    }

    #[tokio::test]
    async fn filtered_subscription() {
        let remote = signed_in().await;
        for (id, project) in [("t1", "p1"), ("t2", "p2")] {
            let _ = remote
                .external_write(
                    Collection::Tasks,
                    id,
                    DocumentWrite::Create(body(json!({"id": id, "projectId": project}))),
                )
                .unwrap();
        }
        let mut feed = remote
            .subscribe_collection(Collection::Tasks, Some(Filter::field_equals("projectId", "p2")))
            .await
            .unwrap();
        let snapshot = feed.recv().await.unwrap().unwrap();
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(snapshot.documents[0].id, "t2");
    }

    #[tokio::test]
    async fn patch_missing_document_is_not_found() {
        let remote = signed_in().await;
        let err = remote
            .write_document(
                Collection::Projects,
                "gone",
                DocumentWrite::Patch(body(json!({"name": "x"}))),
            )
            .await
            .unwrap_err();
        assert_matches!(err, RemoteError::NotFound { collection: Collection::Projects, .. });
    }

    #[tokio::test]
    async fn patch_keeps_null_fields() {
        let remote = signed_in().await;
        let _ = remote
            .external_write(
                Collection::Tasks,
                "t1",
                DocumentWrite::Create(body(json!({"id": "t1", "deadline": "2030-01-01"}))),
            )
            .unwrap();
        let _ = remote
            .write_document(
                Collection::Tasks,
                "t1",
                DocumentWrite::Patch(body(json!({"deadline": null}))),
            )
            .await
            .unwrap();
        let doc = remote.document(Collection::Tasks, "t1").unwrap();
        assert_eq!(doc.data.get("deadline"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let remote = signed_in().await;
        remote.fail_next_writes(1);
        let write = || DocumentWrite::Create(body(json!({"id": "p1"})));
        assert_matches!(
            remote.write_document(Collection::Projects, "p1", write()).await,
            Err(RemoteError::Unavailable(_))
        );
        assert!(remote.write_document(Collection::Projects, "p1", write()).await.is_ok());
        assert_eq!(remote.write_count(Collection::Projects), 1);
    }

    #[tokio::test]
    async fn held_writes_wait_for_release() {
        let remote = std::sync::Arc::new(signed_in().await);
        remote.hold_writes();
        let pending = tokio::spawn({
            let remote = remote.clone();
            async move {
                remote
                    .write_document(
                        Collection::Projects,
                        "p1",
                        DocumentWrite::Create(body(json!({"id": "p1"}))),
                    )
                    .await
            }
        });
        while remote.held_writes() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(remote.document(Collection::Projects, "p1").is_none());

        remote.release_writes();
        assert!(pending.await.unwrap().is_ok());
        assert!(remote.document(Collection::Projects, "p1").is_some());
        assert_eq!(remote.held_writes(), 0);
    }

    #[tokio::test]
    async fn revoke_ends_feeds() {
        let remote = signed_in().await;
        let mut feed = remote
            .subscribe_collection(Collection::Users, None)
            .await
            .unwrap();
        let _ = feed.recv().await;
        remote.revoke_session();
        assert_matches!(feed.recv().await, Some(Err(RemoteError::Revoked)));
        assert_eq!(remote.subscriber_count(Collection::Users), 0);
        assert_eq!(*remote.watch_auth_state().borrow(), AuthState::Revoked);
    }

    #[tokio::test]
    async fn dropped_feed_is_not_counted() {
        let remote = signed_in().await;
        let feed = remote
            .subscribe_collection(Collection::Tasks, None)
            .await
            .unwrap();
        assert_eq!(remote.subscriber_count(Collection::Tasks), 1);
        drop(feed);
        assert_eq!(remote.subscriber_count(Collection::Tasks), 0);
    }

    #[tokio::test]
    async fn offline_rejects_everything() {
        let remote = signed_in().await;
        remote.set_offline(true);
        assert_matches!(
            remote.subscribe_collection(Collection::Users, None).await,
            Err(RemoteError::Unavailable(_))
        );
        assert_matches!(
            remote.delete_document(Collection::Users, "u1").await,
            Err(RemoteError::Unavailable(_))
        );
    }

    #[tokio::test]
    async fn held_subscription_opens_after_release() {
        let remote = std::sync::Arc::new(signed_in().await);
        remote.hold_subscriptions(Collection::Tasks);
        assert!(remote.subscribe_collection(Collection::Users, None).await.is_ok());

        let pending = tokio::spawn({
            let remote = remote.clone();
            async move { remote.subscribe_collection(Collection::Tasks, None).await }
        });
        while remote.held_subscriptions() == 0 {
            tokio::task::yield_now().await;
        }
        remote.sign_out().await.unwrap();
        remote.release_subscriptions();

        let mut feed = pending.await.unwrap().unwrap();
        assert_matches!(feed.recv().await, Some(Ok(_)));
        assert_eq!(remote.held_subscriptions(), 0);
    }

    #[tokio::test]
    async fn failing_subscriptions_are_per_collection() {
        let remote = signed_in().await;
        remote.fail_subscriptions(Collection::Tasks, true);
        assert_matches!(
            remote.subscribe_collection(Collection::Tasks, None).await,
            Err(RemoteError::Unavailable(_))
        );
        assert!(remote.subscribe_collection(Collection::Projects, None).await.is_ok());

        remote.fail_subscriptions(Collection::Tasks, false);
        assert!(remote.subscribe_collection(Collection::Tasks, None).await.is_ok());
    }
}
