//! Provisioner error types.
//!
//! All errors in the `libnfs` crate are represented by the [`NfsError`] enum,
//! which derives [`thiserror::Error`] and also implements
//! [`Serialize`]/[`Deserialize`] so errors can travel back to the orchestrator
//! inside a [`crate::message::ProvisionerMessage`].
//!
//! Every variant belongs to one of three classes (see [`ErrorKind`]):
//! configuration errors are never retried, mount and I/O errors are.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for provisioner operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
pub enum NfsError {
    /// A required parameter is missing or invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The volume was not provisioned by this provisioner instance.
    #[error("volume {volume} is not owned by provisioner {expected} (found {found:?})")]
    OwnershipMismatch {
        /// Descriptor name of the volume.
        volume: String,
        /// Identity of the provisioner handling the call.
        expected: String,
        /// Identity recorded on the descriptor, if any.
        found: Option<String>,
    },

    /// The mount executor failed or could not be started.
    #[error("mount {remote} at {path} failed: {reason}")]
    MountFailed {
        /// Remote spec, `server:export_path`.
        remote: String,
        /// Local mount point.
        path: String,
        /// Executor diagnostic text.
        reason: String,
    },

    /// The mount executor did not finish within its deadline.
    #[error("mount {remote} at {path} timed out after {timeout_ms}ms")]
    MountTimedOut {
        /// Remote spec, `server:export_path`.
        remote: String,
        /// Local mount point.
        path: String,
        /// Deadline that expired.
        timeout_ms: u64,
    },

    /// A local directory create/remove failed.
    #[error("{op} {path}: {reason}")]
    Io {
        /// Operation that failed, e.g. `"create volume dir"`.
        op: String,
        /// Path the operation targeted.
        path: String,
        /// Underlying OS error text.
        reason: String,
    },
}

/// Retry class of an [`NfsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; the caller must correct the request.
    Config,
    /// The export could not be mounted (yet).
    Mount,
    /// Local filesystem failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => f.write_str("config"),
            Self::Mount => f.write_str("mount"),
            Self::Io => f.write_str("io"),
        }
    }
}

impl NfsError {
    /// Create a [`NfsError::InvalidArgument`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn invalid<E: fmt::Display>(e: E) -> Self {
        Self::InvalidArgument(e.to_string())
    }

    /// Create a [`NfsError::Io`] for `op` on `path`.
    pub fn io<E: fmt::Display>(op: &str, path: &Path, e: E) -> Self {
        Self::Io {
            op: op.to_owned(),
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    }

    /// Retry class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::OwnershipMismatch { .. } => ErrorKind::Config,
            Self::MountFailed { .. } | Self::MountTimedOut { .. } => ErrorKind::Mount,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether repeating the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Config
    }
}
