//! Identity types: roles, the signed-in session, credentials, directory users.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::ids::UserId;

/// Team role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including the user roster.
    Admin,
    /// Regular team member.
    #[default]
    Member,
}

impl Role {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Whether this role is `Admin`.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(ValidationError::new("role", format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated identity of this client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Directory id of the signed-in user.
    pub user_id: UserId,
    /// Name shown in the header and used as the default assignee label.
    pub display_name: String,
    /// Role resolved at sign-in.
    pub role: Role,
    /// `true` while the remote token is valid.
    pub authenticated: bool,
}

impl Session {
    /// Whether the session satisfies `required`.
    #[must_use]
    pub fn has_role(&self, required: Role) -> bool {
        self.authenticated && self.role == required
    }
}

/// Email/password credentials for sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Local shape check, run before anything is sent to the auth service.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::new("email", "email is required"));
        }
        if !email.contains('@') {
            return Err(ValidationError::new("email", "email address is malformed"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::new("password", "password is required"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A directory entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Directory id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Team role.
    #[serde(default)]
    pub role: Role,
    /// Contact email, when the directory publishes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!("Member".parse::<Role>().unwrap(), Role::Member);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn has_role_requires_authentication() {
        let mut session = Session {
            user_id: UserId::from("u1"),
            display_name: "Ada".into(),
            role: Role::Admin,
            authenticated: true,
        };
        assert!(session.has_role(Role::Admin));
        assert!(!session.has_role(Role::Member));
        session.authenticated = false;
        assert!(!session.has_role(Role::Admin));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("a@b.co", "hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("a@b.co"));
    }

    #[test]
    fn credentials_validation() {
        assert!(Credentials::new("a@b.co", "pw").validate().is_ok());
        assert_eq!(
            Credentials::new("  ", "pw").validate().unwrap_err().field,
            "email"
        );
        assert_eq!(
            Credentials::new("nobody", "pw").validate().unwrap_err().field,
            "email"
        );
        assert_eq!(
            Credentials::new("a@b.co", "").validate().unwrap_err().field,
            "password"
        );
    }

    #[test]
    fn user_defaults_to_member_role() {
        let user: User = serde_json::from_str(r#"{"id":"u1","name":"Ada"}"#).unwrap();
        assert_eq!(user.role, Role::Member);
        assert!(user.email.is_none());
    }
}
