//! Local cache of one remote collection with optimistic writes.
//!
//! Every local mutation is tagged with a sequence number and leaves a
//! pending mark on what it touched: individual fields for an update, the
//! whole document for a create or delete. A mark shields the local value
//! from incoming snapshots until the write is acknowledged with a revision
//! *and* a snapshot at or past that revision arrives. From then on the
//! remote value wins again.
//!
//! Marks are keyed by field, so a snapshot carrying another client's edit
//! to a different field of the same document still applies that edit.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use teamboard_remote::{Snapshot, to_object};
use tracing::warn;

use crate::entity::Entity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Mark {
    seq: u64,
    ack: Option<u64>,
}

impl Mark {
    fn new(seq: u64) -> Self {
        Self { seq, ack: None }
    }

    fn settled_by(self, revision: u64) -> bool {
        self.ack.is_some_and(|ack| revision >= ack)
    }
}

#[derive(Debug, Default)]
struct Pending {
    create: Option<Mark>,
    delete: Option<Mark>,
    fields: HashMap<String, Mark>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.create.is_none() && self.delete.is_none() && self.fields.is_empty()
    }

    fn marks_mut(&mut self) -> impl Iterator<Item = &mut Mark> {
        self.create
            .iter_mut()
            .chain(self.delete.iter_mut())
            .chain(self.fields.values_mut())
    }

    /// Record the ack only on marks still owned by `seq`; a newer local
    /// write to the same field waits for its own ack.
    fn acknowledge(&mut self, seq: u64, revision: u64) {
        for mark in self.marks_mut().filter(|m| m.seq == seq) {
            mark.ack = Some(revision);
        }
    }

    fn settle(&mut self, revision: u64) {
        self.create = self.create.filter(|m| !m.settled_by(revision));
        self.delete = self.delete.filter(|m| !m.settled_by(revision));
        self.fields.retain(|_, m| !m.settled_by(revision));
    }

    fn forget(&mut self, seq: u64) {
        self.create = self.create.filter(|m| m.seq != seq);
        self.delete = self.delete.filter(|m| m.seq != seq);
        self.fields.retain(|_, m| m.seq != seq);
    }

    fn shields_document(mark: Option<Mark>, revision: u64) -> bool {
        mark.is_some_and(|m| !m.settled_by(revision))
    }
}

enum Change<T> {
    Created,
    Updated { before: T, fields: Vec<String> },
    Removed { before: T, index: usize },
}

/// Handle for one optimistic mutation, used to confirm or roll it back.
#[must_use = "a ticket must be confirmed or rolled back"]
pub struct Ticket<T> {
    id: String,
    seq: u64,
    change: Change<T>,
}

impl<T> Ticket<T> {
    /// Document id touched.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Local sequence number of the mutation.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What applying a snapshot did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Documents in the snapshot.
    pub documents: usize,
    /// Fields where a pending local value was kept over the remote one.
    pub shielded_fields: usize,
    /// Local creates kept although the snapshot does not have them yet.
    pub kept_local: usize,
    /// Local deletes kept although the snapshot still has the document.
    pub kept_deleted: usize,
    /// Documents that could not be decoded.
    pub skipped: usize,
}

/// Insertion-ordered cache of a remote collection.
pub struct SyncedCollection<T> {
    entries: IndexMap<String, T>,
    pending: HashMap<String, Pending>,
    next_seq: u64,
    last_snapshot: Option<Snapshot>,
}

impl<T> Default for SyncedCollection<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            pending: HashMap::new(),
            next_seq: 0,
            last_snapshot: None,
        }
    }
}

impl<T: Entity> SyncedCollection<T> {
    /// Create an empty, unloaded cache.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Whether a snapshot has been applied since the last clear.
    pub fn is_loaded(&self) -> bool {
        self.last_snapshot.is_some()
    }

    /// Revision of the last applied snapshot.
    pub fn revision(&self) -> Option<u64> {
        self.last_snapshot.as_ref().map(|s| s.revision)
    }

    /// Look up a document.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    /// Whether the document is present.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Documents in remote insertion order, local-only creates last.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Cloned contents.
    pub fn list(&self) -> Vec<T> {
        self.entries.values().cloned().collect()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no documents.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Documents with at least one unsettled local write.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ── Local mutations ─────────────────────────────────────────────────

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Optimistically add a new document.
    pub fn insert_local(&mut self, entity: T) -> Ticket<T> {
        let seq = self.next_seq();
        let id = entity.key().to_string();
        let _ = self.entries.insert(id.clone(), entity);
        self.pending.entry(id.clone()).or_default().create = Some(Mark::new(seq));
        Ticket {
            id,
            seq,
            change: Change::Created,
        }
    }

    /// Optimistically replace a document; `fields` are the wire names written.
    ///
    /// Returns `None` if the document is not cached.
    pub fn replace_local(&mut self, updated: T, fields: Vec<String>) -> Option<Ticket<T>> {
        let id = updated.key().to_string();
        let slot = self.entries.get_mut(&id)?;
        let before = std::mem::replace(slot, updated);
        let seq = self.next_seq();
        let pending = self.pending.entry(id.clone()).or_default();
        for field in &fields {
            let _ = pending.fields.insert(field.clone(), Mark::new(seq));
        }
        Some(Ticket {
            id,
            seq,
            change: Change::Updated { before, fields },
        })
    }

    /// Optimistically delete a document.
    ///
    /// Returns `None` if the document is not cached.
    pub fn remove_local(&mut self, id: &str) -> Option<Ticket<T>> {
        let (index, _, before) = self.entries.shift_remove_full(id)?;
        let seq = self.next_seq();
        self.pending.entry(id.to_string()).or_default().delete = Some(Mark::new(seq));
        Some(Ticket {
            id: id.to_string(),
            seq,
            change: Change::Removed { before, index },
        })
    }

    // ── Remote outcomes ─────────────────────────────────────────────────

    /// Record the revision that acknowledged a mutation.
    pub fn confirm(&mut self, ticket: &Ticket<T>, revision: u64) {
        if let Some(pending) = self.pending.get_mut(&ticket.id) {
            pending.acknowledge(ticket.seq, revision);
        }
        if self.revision().is_some_and(|applied| applied >= revision) {
            self.replay();
        }
    }

    /// Undo a mutation the remote rejected.
    ///
    /// Only what the mutation still owns is restored: a field overwritten by
    /// a newer local write keeps the newer value.
    pub fn rollback(&mut self, ticket: Ticket<T>) {
        let Ticket { id, seq, change } = ticket;
        let owns = |mark: Option<&Mark>| mark.is_some_and(|m| m.seq == seq);
        let pending = self.pending.get(&id);

        match change {
            Change::Created => {
                if owns(pending.and_then(|p| p.create.as_ref())) {
                    let _ = self.entries.shift_remove(&id);
                }
            }
            Change::Updated { before, fields } => {
                let owned: Vec<&String> = fields
                    .iter()
                    .filter(|f| owns(pending.and_then(|p| p.fields.get(*f))))
                    .collect();
                if let Some(current) = self.entries.get_mut(&id) {
                    let old = to_object(&before);
                    let mut data = to_object(&*current);
                    for field in owned {
                        match old.get(field) {
                            Some(value) => {
                                let _ = data.insert(field.clone(), value.clone());
                            }
                            None => {
                                let _ = data.remove(field);
                            }
                        }
                    }
                    match serde_json::from_value(Value::Object(data)) {
                        Ok(restored) => *current = restored,
                        Err(err) => warn!(%id, error = %err, "could not restore fields, keeping current"),
                    }
                }
            }
            Change::Removed { before, index } => {
                if owns(pending.and_then(|p| p.delete.as_ref())) && !self.entries.contains_key(&id) {
                    let index = index.min(self.entries.len());
                    let _ = self.entries.shift_insert(index, id.clone(), before);
                }
            }
        }

        if let Some(pending) = self.pending.get_mut(&id) {
            pending.forget(seq);
            if pending.is_empty() {
                let _ = self.pending.remove(&id);
            }
        }
        self.replay();
    }

    /// Forget a document the remote no longer has.
    pub fn drop_entry(&mut self, id: &str) {
        let _ = self.entries.shift_remove(id);
        let _ = self.pending.remove(id);
    }

    /// Apply a full remote snapshot.
    pub fn reconcile(&mut self, snapshot: Snapshot) -> ReconcileOutcome {
        let revision = snapshot.revision;
        let mut outcome = ReconcileOutcome {
            documents: snapshot.documents.len(),
            ..ReconcileOutcome::default()
        };
        let mut next = IndexMap::with_capacity(snapshot.documents.len());

        for doc in &snapshot.documents {
            let pending = self.pending.get(&doc.id);
            if Pending::shields_document(pending.and_then(|p| p.delete), revision) {
                outcome.kept_deleted += 1;
                continue;
            }

            let mut data = doc.data.clone();
            let _ = data
                .entry("id")
                .or_insert_with(|| Value::String(doc.id.clone()));

            if let (Some(pending), Some(local)) = (pending, self.entries.get(&doc.id)) {
                let local = to_object(local);
                for (field, mark) in &pending.fields {
                    if mark.settled_by(revision) {
                        continue;
                    }
                    if let Some(value) = local.get(field) {
                        let _ = data.insert(field.clone(), value.clone());
                        outcome.shielded_fields += 1;
                    }
                }
            }

            match serde_json::from_value::<T>(Value::Object(data)) {
                Ok(entity) => {
                    let _ = next.insert(doc.id.clone(), entity);
                }
                Err(err) => {
                    warn!(collection = %snapshot.collection, id = %doc.id, error = %err, "skipping malformed document");
                    outcome.skipped += 1;
                }
            }
        }

        for (id, entity) in self.entries.drain(..) {
            if next.contains_key(&id) {
                continue;
            }
            let unsent = self
                .pending
                .get(&id)
                .is_some_and(|p| Pending::shields_document(p.create, revision));
            if unsent {
                let _ = next.insert(id, entity);
                outcome.kept_local += 1;
            }
        }

        self.pending.retain(|_, pending| {
            pending.settle(revision);
            !pending.is_empty()
        });
        self.entries = next;
        self.last_snapshot = Some(snapshot);
        outcome
    }

    fn replay(&mut self) {
        if let Some(snapshot) = self.last_snapshot.take() {
            let _ = self.reconcile(snapshot);
        }
    }

    /// Drop everything; the cache reads as unloaded.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
        self.last_snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use teamboard_core::{Collection, ProjectId, Task, TaskId, TaskPatch, TaskStatus, TaskSubmission};
    use teamboard_remote::Document;

    use super::*;

    fn task(id: &str, title: &str) -> Task {
        Task::from_submission(TaskId::from(id), TaskSubmission::new(title, ProjectId::from("p1")))
    }

    fn doc(entity: &Task, revision: u64) -> Document {
        Document {
            id: entity.id.to_string(),
            revision,
            updated_at: Utc::now(),
            data: to_object(entity),
        }
    }

    fn snapshot(revision: u64, documents: Vec<Document>) -> Snapshot {
        Snapshot {
            collection: Collection::Tasks,
            revision,
            documents,
        }
    }

    fn loaded(tasks: &[Task], revision: u64) -> SyncedCollection<Task> {
        let mut cache = SyncedCollection::new();
        let docs = tasks.iter().map(|t| doc(t, revision)).collect();
        let _ = cache.reconcile(snapshot(revision, docs));
        cache
    }

    fn update(cache: &mut SyncedCollection<Task>, id: &str, patch: &TaskPatch) -> Ticket<Task> {
        let mut next = cache.get(id).cloned().unwrap();
        let _ = next.apply(patch);
        let fields = to_object(patch).keys().cloned().collect();
        cache.replace_local(next, fields).unwrap()
    }

    #[test]
    fn snapshot_defines_order_and_skips_malformed() {
        let mut cache: SyncedCollection<Task> = SyncedCollection::new();
        assert!(!cache.is_loaded());

        let bad = Document {
            id: "broken".into(),
            revision: 1,
            updated_at: Utc::now(),
            data: to_object(&json!({"title": 7})),
        };
        let outcome = cache.reconcile(snapshot(
            2,
            vec![doc(&task("b", "B"), 1), bad, doc(&task("a", "A"), 2)],
        ));

        assert!(cache.is_loaded());
        assert_eq!(outcome.skipped, 1);
        let ids: Vec<_> = cache.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn pending_field_is_shielded_until_acked_revision_arrives() {
        let original = task("t1", "Draft");
        let mut cache = loaded(&[original.clone()], 1);

        let patch = TaskPatch {
            title: Some("Final".into()),
            ..TaskPatch::default()
        };
        let ticket = update(&mut cache, "t1", &patch);

        // Another client edits a different field before our write lands.
        let mut remote = original.clone();
        remote.status = TaskStatus::Review;
        let outcome = cache.reconcile(snapshot(2, vec![doc(&remote, 2)]));
        assert_eq!(outcome.shielded_fields, 1);
        let local = cache.get("t1").unwrap();
        assert_eq!(local.title, "Final");
        assert_eq!(local.status, TaskStatus::Review);

        // Ack at revision 3; a snapshot older than that still cannot clobber.
        cache.confirm(&ticket, 3);
        assert_eq!(cache.get("t1").unwrap().title, "Final");
        assert_eq!(cache.pending_count(), 1);

        remote.title = "Final".into();
        let _ = cache.reconcile(snapshot(3, vec![doc(&remote, 3)]));
        assert_eq!(cache.pending_count(), 0);

        remote.title = "Renamed elsewhere".into();
        let _ = cache.reconcile(snapshot(4, vec![doc(&remote, 4)]));
        assert_eq!(cache.get("t1").unwrap().title, "Renamed elsewhere");
    }

    #[test]
    fn ack_after_snapshot_replays_remote_state() {
        let original = task("t1", "Draft");
        let mut cache = loaded(&[original.clone()], 1);
        let ticket = update(&mut cache, "t1", &TaskPatch::status(TaskStatus::Done));

        // Snapshot at revision 3 already contains our write (2) and a later
        // remote change to the same field (3), but the ack arrives after it.
        let mut remote = original;
        remote.status = TaskStatus::Review;
        let _ = cache.reconcile(snapshot(3, vec![doc(&remote, 3)]));
        assert_eq!(cache.get("t1").unwrap().status, TaskStatus::Done);

        cache.confirm(&ticket, 2);
        assert_eq!(cache.get("t1").unwrap().status, TaskStatus::Review);
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn stale_ack_does_not_release_newer_write() {
        let mut cache = loaded(&[task("t1", "Draft")], 1);
        let first = update(&mut cache, "t1", &TaskPatch::status(TaskStatus::Review));
        let _second = update(&mut cache, "t1", &TaskPatch::status(TaskStatus::Done));

        cache.confirm(&first, 2);
        let mut remote = task("t1", "Draft");
        remote.status = TaskStatus::Review;
        let _ = cache.reconcile(snapshot(2, vec![doc(&remote, 2)]));
        assert_eq!(cache.get("t1").unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn unsent_create_survives_snapshot_until_settled() {
        let mut cache = loaded(&[], 1);
        let created = task("t1", "New");
        let ticket = cache.insert_local(created.clone());

        let outcome = cache.reconcile(snapshot(1, vec![]));
        assert_eq!(outcome.kept_local, 1);
        assert!(cache.contains("t1"));

        cache.confirm(&ticket, 2);
        let _ = cache.reconcile(snapshot(2, vec![doc(&created, 2)]));
        assert_eq!(cache.pending_count(), 0);

        // Deleted remotely afterwards: gone.
        let _ = cache.reconcile(snapshot(3, vec![]));
        assert!(!cache.contains("t1"));
    }

    #[test]
    fn pending_delete_is_not_resurrected() {
        let existing = task("t1", "Old");
        let mut cache = loaded(&[existing.clone()], 1);
        let ticket = cache.remove_local("t1").unwrap();

        let outcome = cache.reconcile(snapshot(1, vec![doc(&existing, 1)]));
        assert_eq!(outcome.kept_deleted, 1);
        assert!(!cache.contains("t1"));

        cache.confirm(&ticket, 2);
        let _ = cache.reconcile(snapshot(2, vec![]));
        assert!(cache.is_empty());
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn rollback_restores_each_kind() {
        let a = task("a", "A");
        let b = task("b", "B");
        let mut cache = loaded(&[a.clone(), b.clone()], 1);
        let before = cache.list();

        let created = cache.insert_local(task("c", "C"));
        cache.rollback(created);
        assert_eq!(cache.list(), before);

        let updated = update(&mut cache, "a", &TaskPatch::status(TaskStatus::Done));
        cache.rollback(updated);
        assert_eq!(cache.list(), before);

        let removed = cache.remove_local("a").unwrap();
        cache.rollback(removed);
        assert_eq!(cache.list(), before);
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn rollback_keeps_newer_local_write() {
        let mut cache = loaded(&[task("t1", "Draft")], 1);
        let older = update(&mut cache, "t1", &TaskPatch::status(TaskStatus::Review));
        let _newer = update(&mut cache, "t1", &TaskPatch::status(TaskStatus::Done));

        cache.rollback(older);
        assert_eq!(cache.get("t1").unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn clear_unloads() {
        let mut cache = loaded(&[task("t1", "Draft")], 1);
        let _ticket = cache.insert_local(task("t2", "Other"));
        cache.clear();
        assert!(!cache.is_loaded());
        assert!(cache.is_empty());
        assert_eq!(cache.pending_count(), 0);
    }
}
