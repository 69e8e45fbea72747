//! Error types for the authsync engine

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthSyncError {
    /// Network or service failure talking to the identity service.
    #[error("Remote identity service unavailable: {message}")]
    RemoteUnavailable { message: String },

    /// The identity service refused the request (validation, permissions).
    #[error("Remote identity service rejected request (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// A referenced object does not exist on the remote side yet.
    #[error("Dependency not found: {kind} '{name}'")]
    DependencyNotFound { kind: String, name: String },

    /// Optimistic-concurrency failure on a local record.
    #[error("Conflict updating {kind} {key}: {message}")]
    LocalConflict {
        kind: String,
        key: String,
        message: String,
    },

    #[error("Resource not found: {kind} {key}")]
    NotFound { kind: String, key: String },

    #[error("Invalid resource spec: {message}")]
    InvalidSpec { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthSyncError {
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    pub fn remote_rejected(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            status,
            message: message.into(),
        }
    }

    pub fn dependency_not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DependencyNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn local_conflict(
        kind: impl ToString,
        key: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::LocalConflict {
            kind: kind.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl ToString, key: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            key: key.to_string(),
        }
    }

    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether redelivering the same event can succeed without a spec change.
    ///
    /// `RemoteRejected` is reported as retryable too: the engine does not
    /// tell validation failures apart from transient ones and leaves the
    /// decision to the caller's backoff.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidSpec { .. } | Self::Config { .. })
    }

    /// Conflicts are retried straight away with a fresh read.
    pub fn requeue_immediately(&self) -> bool {
        matches!(self, Self::LocalConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, AuthSyncError>;
