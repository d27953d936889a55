//! Brick engine error types.
//!
//! All errors in the `libbrick` crate are represented by the [`BrickError`]
//! enum, which derives [`thiserror::Error`] for ergonomic error handling and
//! also implements [`Serialize`]/[`Deserialize`] so errors can travel across
//! the QUIC transport layer between the manager and the node agents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for brick lifecycle operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
pub enum BrickError {
    /// The caller supplied a malformed request (programmer error).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The executor could not complete the batch; the commands may never
    /// have run on the remote side.
    #[error("transport error: {0}")]
    Transport(String),

    /// A remote command exited non-zero. `output` carries the stderr the
    /// provisioning tool produced.
    #[error("command `{command}` failed: {output}")]
    CommandFailed {
        /// The shell command that was dispatched.
        command: String,
        /// What the tool printed on failure.
        output: String,
    },

    /// The thin-volume count of a pool could not be determined.
    #[error("unable to determine number of thin volumes in pool {pool} on host {host}: {reason}")]
    PoolCountUnreadable {
        /// Thin pool in `<vg>/<tp>` form.
        pool: String,
        /// Host the query ran on.
        host: String,
        /// Underlying query or parse failure.
        reason: String,
    },

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BrickError {
    /// Create a [`BrickError::Transport`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    /// Create a [`BrickError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// True when the error means "the object you asked me to remove is
    /// already gone".
    ///
    /// LVM tools report missing objects with messages such as
    /// `Failed to find logical volume "vg_x/lv_y"` or
    /// `Volume group "vg_x" not found`; the destroyer treats those as
    /// success so that teardown stays idempotent.
    pub fn is_absent(&self) -> bool {
        let message = self.to_string().to_lowercase();
        message.contains("not found") || message.contains("failed to find")
    }
}
