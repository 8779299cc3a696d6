//! Error hierarchy for the Teamboard client.
//!
//! Four kinds reach callers, each with a fixed user-visible treatment:
//!
//! - [`AuthError`]: credentials or role problems; the user is sent to sign-in
//! - [`ValidationError`]: malformed input; shown inline, never sent remote
//! - [`NotFoundError`]: the entity vanished between read and write; toast
//! - [`SyncError`]: the remote rejected an optimistic write; rolled back, toast
//!
//! [`ClientError`] wraps all four. Raw transport failures never escape a
//! store: they are converted to one of these kinds at the store boundary.

use std::borrow::Cow;

use thiserror::Error;

use crate::types::{Collection, Role};

/// Authentication and authorization failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong email or password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The auth service could not be reached.
    #[error("network error during authentication: {0}")]
    Network(String),

    /// The session token expired or was revoked remotely.
    #[error("session token was revoked or expired")]
    Revoked,

    /// An operation needed a session and there is none.
    #[error("not signed in")]
    NotSignedIn,

    /// A sign-out or newer sign-in ended this sign-in before it finished.
    #[error("sign-in interrupted by another session change")]
    Interrupted,

    /// The session's role does not allow the operation.
    #[error("{action} requires the {required} role")]
    Forbidden {
        /// What was attempted.
        action: Cow<'static, str>,
        /// Role that would have been allowed.
        required: Role,
    },
}

/// Malformed input, caught locally.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Wire name of the offending field.
    pub field: &'static str,
    /// Message shown next to the field.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for `field`.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// The target entity does not exist (locally or remotely).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{} {id} not found", .collection.entity())]
pub struct NotFoundError {
    /// Collection that was searched.
    pub collection: Collection,
    /// Missing document id.
    pub id: String,
}

impl NotFoundError {
    /// Create a not-found error.
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

/// Remote synchronization failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The remote rejected or failed the write; the local change was rolled back.
    #[error("failed to sync {} {id}: {message}", .collection.entity())]
    Rejected {
        /// Collection written.
        collection: Collection,
        /// Document id.
        id: String,
        /// Remote failure description.
        message: String,
    },

    /// The session ended while the write was in flight; its outcome was discarded.
    #[error("{} {id} write abandoned after sign-out", .collection.entity())]
    Abandoned {
        /// Collection written.
        collection: Collection,
        /// Document id.
        id: String,
    },

    /// The live subscription could not be opened.
    #[error("could not subscribe to {collection}: {message}")]
    Subscription {
        /// Collection subscribed.
        collection: Collection,
        /// Remote failure description.
        message: String,
    },
}

/// How an error is shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Surface {
    /// Inline message at the form; submission blocked.
    Inline,
    /// Non-blocking toast.
    Toast,
    /// Redirect to the sign-in page.
    SignIn,
}

/// Any error a store operation can return.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Authentication or authorization failure.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Invalid input.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Missing entity.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    /// Remote write failure.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl ClientError {
    /// User-visible treatment of this error.
    #[must_use]
    pub fn surface(&self) -> Surface {
        match self {
            Self::Auth(AuthError::Forbidden { .. }) => Surface::Toast,
            Self::Auth(_) => Surface::SignIn,
            Self::Validation(_) => Surface::Inline,
            Self::NotFound(_) | Self::Sync(_) => Surface::Toast,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH",
            Self::Validation(_) => "VALIDATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Sync(_) => "SYNC",
        }
    }
}
