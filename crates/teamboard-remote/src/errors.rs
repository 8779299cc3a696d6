//! Transport-level failures reported by a [`RemoteStore`](crate::RemoteStore).
//!
//! These never reach store callers directly; the conversion helpers map them
//! into the client taxonomy at the store boundary.

use teamboard_core::{AuthError, Collection, NotFoundError, SyncError};
use thiserror::Error;

/// Errors reported by the remote document/auth service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Email/password pair was not accepted.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The request carried no valid session.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The session token was revoked or has expired.
    #[error("session revoked")]
    Revoked,

    /// The backing store's security rules refused the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The document does not exist.
    #[error("{collection}/{id} does not exist")]
    NotFound {
        /// Collection addressed.
        collection: Collection,
        /// Document id.
        id: String,
    },

    /// The service could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

impl RemoteError {
    /// Map a failure during sign-in or auth-state handling.
    pub fn into_auth_error(self) -> AuthError {
        match self {
            Self::InvalidCredentials => AuthError::InvalidCredentials,
            Self::Revoked => AuthError::Revoked,
            Self::Unauthenticated => AuthError::NotSignedIn,
            Self::Unavailable(message) => AuthError::Network(message),
            other => AuthError::Network(other.to_string()),
        }
    }

    /// Map a failed write of `collection/id`.
    pub fn into_sync_error(self, collection: Collection, id: &str) -> SyncError {
        SyncError::Rejected {
            collection,
            id: id.to_string(),
            message: self.to_string(),
        }
    }

    /// Map a subscription that could not be opened or was cut off.
    pub fn into_subscription_error(self, collection: Collection) -> SyncError {
        SyncError::Subscription {
            collection,
            message: self.to_string(),
        }
    }

    /// The not-found payload, if this is a missing-document failure.
    pub fn as_not_found(&self) -> Option<NotFoundError> {
        match self {
            Self::NotFound { collection, id } => Some(NotFoundError::new(*collection, id.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mapping() {
        assert_eq!(
            RemoteError::InvalidCredentials.into_auth_error(),
            AuthError::InvalidCredentials
        );
        assert_eq!(RemoteError::Revoked.into_auth_error(), AuthError::Revoked);
        assert_eq!(
            RemoteError::Unavailable("offline".into()).into_auth_error(),
            AuthError::Network("offline".into())
        );
    }

    #[test]
    fn sync_mapping_keeps_message() {
        let err = RemoteError::Unavailable("offline".into()).into_sync_error(Collection::Tasks, "t1");
        assert_eq!(err.to_string(), "failed to sync task t1: service unavailable: offline");
    }

    #[test]
    fn not_found_payload() {
        let err = RemoteError::NotFound {
            collection: Collection::Projects,
            id: "p1".into(),
        };
        assert_eq!(
            err.as_not_found(),
            Some(NotFoundError::new(Collection::Projects, "p1"))
        );
        assert_eq!(RemoteError::Revoked.as_not_found(), None);
    }
}
