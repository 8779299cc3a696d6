//! Wire types exchanged with the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use teamboard_core::{Collection, Role, UserId};

/// A stored document: id, the revision of its last write, and its fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document id, unique within its collection.
    pub id: String,
    /// Store revision of the write that last touched this document.
    pub revision: u64,
    /// Server timestamp of that write.
    pub updated_at: DateTime<Utc>,
    /// Field values (camelCase keys).
    pub data: Map<String, Value>,
}

/// Full contents of a collection at one store revision.
///
/// Documents are listed in insertion order. Every write with a revision at
/// or below `revision` is reflected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Collection described.
    pub collection: Collection,
    /// Store revision this snapshot reflects.
    pub revision: u64,
    /// Documents in insertion order.
    pub documents: Vec<Document>,
}

/// Restricts a subscription to documents whose `field` equals `value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Top-level field name.
    pub field: String,
    /// Required value.
    pub value: Value,
}

impl Filter {
    /// Filter on `field == value`.
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `data` passes the filter.
    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

/// A write request.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentWrite {
    /// Store the full document, replacing anything at the id.
    Create(Map<String, Value>),
    /// Replace the listed top-level fields; fails if the document is gone.
    ///
    /// A `null` value stores `null`, it does not remove the field.
    Patch(Map<String, Value>),
}

impl DocumentWrite {
    /// Field names written.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        match self {
            Self::Create(data) | Self::Patch(data) => data.keys().map(String::as_str),
        }
    }
}

/// Acknowledgement of an applied write or delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteAck {
    /// Store revision assigned to the write.
    pub revision: u64,
    /// Server timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Who the auth service says is signed in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Directory id of the account.
    pub user_id: UserId,
    /// Display name.
    pub display_name: String,
    /// Role claim.
    pub role: Role,
}

/// Successful authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthGrant {
    /// Authenticated identity.
    pub identity: Identity,
    /// Opaque session token.
    pub token: String,
}

/// Auth state as observed through the watch channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    /// Nobody is signed in.
    #[default]
    SignedOut,
    /// A session is live.
    SignedIn(AuthGrant),
    /// The live session was revoked or expired remotely.
    Revoked,
}

impl AuthState {
    /// The live grant, if any.
    pub fn grant(&self) -> Option<&AuthGrant> {
        match self {
            Self::SignedIn(grant) => Some(grant),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filter_matches_field() {
        let filter = Filter::field_equals("projectId", "p1");
        let Value::Object(yes) = json!({"projectId": "p1"}) else {
            unreachable!()
        };
        let Value::Object(no) = json!({"projectId": "p2"}) else {
            unreachable!()
        };
        assert!(filter.matches(&yes));
        assert!(!filter.matches(&no));
    }

    #[test]
    fn write_fields_listed() {
        let Value::Object(data) = json!({"status": "done", "deadline": null}) else {
            unreachable!()
        };
        let write = DocumentWrite::Patch(data);
        let mut fields: Vec<_> = write.fields().collect();
        fields.sort_unstable();
        assert_eq!(fields, ["deadline", "status"]);
    }

    #[test]
    fn snapshot_wire_shape() {
        let snapshot = Snapshot {
            collection: Collection::Tasks,
            revision: 3,
            documents: vec![],
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value, json!({"collection": "tasks", "revision": 3, "documents": []}));
    }
}
