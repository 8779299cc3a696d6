//! Project documents and their create/patch payloads.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FieldChange, render_opt, set_field};
use crate::errors::ValidationError;
use crate::ids::{ProjectId, UserId};

/// A project document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Document id.
    pub id: ProjectId,
    /// Project name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// User who created the project.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Users allowed to edit the project.
    #[serde(default)]
    pub members: BTreeSet<UserId>,
}

impl Project {
    /// Whether `user` may edit this project (creator or member).
    #[must_use]
    pub fn is_member(&self, user: &UserId) -> bool {
        self.created_by == *user || self.members.contains(user)
    }

    /// Apply a patch in place, returning the fields that actually changed.
    pub fn apply(&mut self, patch: &ProjectPatch) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        if let Some(name) = &patch.name {
            set_field(&mut changes, "name", &mut self.name, name.trim().to_string(), String::clone);
        }
        if let Some(description) = &patch.description {
            set_field(
                &mut changes,
                "description",
                &mut self.description,
                description.clone(),
                render_opt,
            );
        }
        if let Some(members) = &patch.members {
            set_field(&mut changes, "members", &mut self.members, members.clone(), |m| {
                m.iter().map(UserId::as_str).collect::<Vec<_>>().join(",")
            });
        }
        changes
    }
}

/// Input for creating a project. The creator comes from the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectInput {
    /// Project name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial members besides the creator.
    pub members: BTreeSet<UserId>,
}

impl ProjectInput {
    /// Shape validation that needs no other store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "project name is required"));
        }
        Ok(())
    }
}

/// Partial update of a project. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description (`Some(None)` clears it).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    /// Replacement member set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<BTreeSet<UserId>>,
}

impl ProjectPatch {
    /// Whether the patch touches no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.members.is_none()
    }

    /// Shape validation that needs no other store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ValidationError::new("name", "project name is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            id: ProjectId::from("p1"),
            name: "Website".into(),
            description: None,
            created_by: UserId::from("u1"),
            created_at: Utc::now(),
            members: BTreeSet::from([UserId::from("u1")]),
        }
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::to_value(project()).unwrap();
        assert_eq!(json["createdBy"], "u1");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["members"], serde_json::json!(["u1"]));
    }

    #[test]
    fn apply_reports_only_real_changes() {
        let mut p = project();
        let patch = ProjectPatch {
            name: Some("Website".into()),
            description: Some(Some("Relaunch".into())),
            ..Default::default()
        };
        let changes = p.apply(&patch);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "description");
        assert!(p.apply(&patch).is_empty());
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = ProjectPatch {
            description: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"description": null}));
    }

    #[test]
    fn membership_includes_creator() {
        let mut p = project();
        p.members.clear();
        assert!(p.is_member(&UserId::from("u1")));
        assert!(!p.is_member(&UserId::from("u2")));
    }

    #[test]
    fn blank_names_rejected() {
        let input = ProjectInput {
            name: "   ".into(),
            ..Default::default()
        };
        assert_eq!(input.validate().unwrap_err().field, "name");
        let patch = ProjectPatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }
}
