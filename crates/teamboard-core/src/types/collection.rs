use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote collections mirrored by the client stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Directory of team members.
    Users,
    /// Projects.
    Projects,
    /// Tasks.
    Tasks,
}

impl Collection {
    /// Remote collection name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Projects => "projects",
            Self::Tasks => "tasks",
        }
    }

    /// Singular noun used in error messages.
    #[must_use]
    pub const fn entity(self) -> &'static str {
        match self {
            Self::Users => "user",
            Self::Projects => "project",
            Self::Tasks => "task",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
