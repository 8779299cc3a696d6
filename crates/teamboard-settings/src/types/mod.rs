//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file may specify any subset of fields.

mod policy;

pub use policy::*;

use serde::{Deserialize, Serialize};
use teamboard_core::constants::{DEFAULT_MAX_VISIBLE_TOASTS, DEFAULT_TOAST_DURATION_MS};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamboardSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Remote document/auth store connection.
    pub remote: RemoteSettings,
    /// Store and guard behaviour.
    pub policy: PolicySettings,
    /// Toast and confirm behaviour.
    pub notifications: NotificationSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl Default for TeamboardSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "teamboard".to_string(),
            remote: RemoteSettings::default(),
            policy: PolicySettings::default(),
            notifications: NotificationSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl TeamboardSettings {
    /// Reject values the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.notifications.toast_duration_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "notifications.toastDurationMs must be positive".into(),
            ));
        }
        if self.notifications.max_visible == 0 {
            return Err(SettingsError::InvalidValue(
                "notifications.maxVisible must be at least 1".into(),
            ));
        }
        if self.remote.project_id.trim().is_empty() {
            return Err(SettingsError::InvalidValue("remote.projectId is empty".into()));
        }
        Ok(())
    }
}

/// Process-wide remote store configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteSettings {
    /// Endpoint of the document/auth service. `memory://` selects the in-process store.
    pub endpoint: String,
    /// Remote project identifier.
    pub project_id: String,
    /// Public API key of the remote project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: "memory://local".to_string(),
            project_id: "teamboard".to_string(),
            api_key: None,
        }
    }
}

/// Toast and confirm dialog settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    /// How long a toast stays visible.
    pub toast_duration_ms: u64,
    /// Maximum toasts visible at once; older ones are dropped first.
    pub max_visible: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            toast_duration_ms: DEFAULT_TOAST_DURATION_MS,
            max_visible: DEFAULT_MAX_VISIBLE_TOASTS,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`..`error`); `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let settings: TeamboardSettings =
            serde_json::from_str(r#"{"notifications":{"maxVisible":2}}"#).unwrap();
        assert_eq!(settings.notifications.max_visible, 2);
        assert_eq!(settings.notifications.toast_duration_ms, 3_000);
        assert_eq!(settings.remote.endpoint, "memory://local");
    }

    #[test]
    fn api_key_omitted_when_absent() {
        let json = serde_json::to_value(TeamboardSettings::default()).unwrap();
        assert!(json["remote"].get("apiKey").is_none());
        assert_eq!(json["policy"]["projectDeletion"], "cascadeDeleteTasks");
    }

    #[test]
    fn zero_toast_duration_rejected() {
        let mut settings = TeamboardSettings::default();
        settings.notifications.toast_duration_ms = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }
}
