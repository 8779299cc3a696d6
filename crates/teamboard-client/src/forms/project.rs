//! Project create/edit form.

use std::collections::BTreeSet;

use teamboard_core::{
    ClientError, Project, ProjectId, ProjectInput, ProjectPatch, UserId, ValidationError,
};
use teamboard_stores::ProjectStore;

use super::optional_text;

/// What a submitted project form asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectIntent {
    /// Create a project.
    Create(ProjectInput),
    /// Patch an existing project.
    Update {
        /// Project edited.
        id: ProjectId,
        /// Fields that changed.
        patch: ProjectPatch,
    },
}

impl ProjectIntent {
    /// Hand the intent to the project store. Returns the project's id.
    pub async fn send(self, projects: &ProjectStore) -> Result<ProjectId, ClientError> {
        match self {
            Self::Create(input) => Ok(projects.create(input).await?.id),
            Self::Update { id, patch } => {
                projects.update(&id, &patch).await?;
                Ok(id)
            }
        }
    }
}

/// Raw project form input.
#[derive(Clone, Debug, Default)]
pub struct ProjectForm {
    original: Option<Box<Project>>,
    /// Name as typed.
    pub name: String,
    /// Description as typed; blank means none.
    pub description: String,
    /// Selected members.
    pub members: BTreeSet<UserId>,
}

impl ProjectForm {
    /// Blank form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Form pre-filled from an existing project.
    pub fn edit(project: &Project) -> Self {
        Self {
            original: Some(Box::new(project.clone())),
            name: project.name.clone(),
            description: project.description.clone().unwrap_or_default(),
            members: project.members.clone(),
        }
    }

    /// Add or remove a member. Returns whether `user` is now selected.
    pub fn toggle_member(&mut self, user: &UserId) -> bool {
        if self.members.remove(user) {
            false
        } else {
            self.members.insert(user.clone())
        }
    }

    /// Validate and build the intent.
    pub fn submit(&self) -> Result<ProjectIntent, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::new("name", "project name is required"));
        }
        let description = optional_text(&self.description);

        let Some(original) = &self.original else {
            return Ok(ProjectIntent::Create(ProjectInput {
                name: name.to_string(),
                description,
                members: self.members.clone(),
            }));
        };
        Ok(ProjectIntent::Update {
            id: original.id.clone(),
            patch: ProjectPatch {
                name: (name != original.name).then(|| name.to_string()),
                description: (description != original.description).then_some(description),
                members: (self.members != original.members).then(|| self.members.clone()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    #[test]
    fn create_trims_input() {
        let mut form = ProjectForm::new();
        form.name = " Website ".into();
        assert!(form.toggle_member(&UserId::from("u2")));
        assert_eq!(
            form.submit().unwrap(),
            ProjectIntent::Create(ProjectInput {
                name: "Website".into(),
                description: None,
                members: BTreeSet::from([UserId::from("u2")]),
            })
        );
    }

    #[test]
    fn blank_name_blocks_submit() {
        let form = ProjectForm::new();
        assert_matches!(form.submit(), Err(ValidationError { field: "name", .. }));
    }

    #[test]
    fn edit_patches_changed_fields_only() {
        let project = Project {
            id: ProjectId::from("p1"),
            name: "Website".into(),
            description: Some("Marketing site".into()),
            created_by: UserId::from("u1"),
            created_at: Utc::now(),
            members: BTreeSet::from([UserId::from("u2")]),
        };
        let mut form = ProjectForm::edit(&project);
        assert!(!form.toggle_member(&UserId::from("u2")));
        form.description.clear();

        assert_eq!(
            form.submit().unwrap(),
            ProjectIntent::Update {
                id: ProjectId::from("p1"),
                patch: ProjectPatch {
                    description: Some(None),
                    members: Some(BTreeSet::new()),
                    ..ProjectPatch::default()
                },
            }
        );
    }
}
