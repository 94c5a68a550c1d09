//! # Error Module
//!
//! Error types for the photo triage engine.
//!
//! ## Design Principles
//! - **Two failure tiers** - only a library permission refusal or a worker
//!   environment that cannot start aborts an operation; everything that goes
//!   wrong with a single asset stays with that asset as a [`TaskFailure`]
//! - **Never panic** on user data - return errors instead
//! - **Include context** - asset ids, album names, paths

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::library::AssetId;

/// Top-level error for orchestrated operations
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Photo library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Worker environment error: {0}")]
    Environment(#[from] PoolError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TriageError {
    /// True when the underlying cause is a library permission refusal.
    ///
    /// Callers surface this case distinctly (prompting the user to grant
    /// access) instead of treating it as a generic failure.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            TriageError::Library(LibraryError::PermissionDenied { .. })
        )
    }
}

/// Errors reported by a photo library backend
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Permission denied accessing the photo library: {detail}")]
    PermissionDenied { detail: String },

    #[error("Library root not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Album not found: {name}")]
    AlbumNotFound { name: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare thumbnail for {id}: {reason}")]
    Thumbnail { id: AssetId, reason: String },

    #[error("Failed to save '{title}' into album '{album}': {reason}")]
    Save {
        title: String,
        album: String,
        reason: String,
    },
}

/// Errors establishing or talking to a worker pool
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to spawn worker thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker pool disconnected before every task settled")]
    Disconnected,
}

/// Errors from the bytes-based imaging helpers
#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Failed to decode image: {reason}")]
    Decode { reason: String },

    #[error("Failed to encode image: {reason}")]
    Encode { reason: String },

    #[error("Failed to resize image: {reason}")]
    Resize { reason: String },
}

/// Error raised by a scoring oracle
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct OracleError(pub String);

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why a single asset was skipped during a batched pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The asset could not be resolved or its bytes fetched
    AssetUnavailable,
    /// The scoring oracle rejected the asset or failed internally
    Oracle,
    /// The asset's bytes could not be decoded or re-encoded
    Decode,
    /// The re-encoded image could not be written to the destination album
    Write,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::AssetUnavailable => "asset unavailable",
            FailureKind::Oracle => "oracle failure",
            FailureKind::Decode => "decode failure",
            FailureKind::Write => "write failure",
        };
        f.write_str(label)
    }
}

/// A contained, per-asset failure inside a batched pass.
///
/// Task failures never abort a pass: the asset is logged, reported through
/// events and left out of the pass's results.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} for asset {asset_id}: {detail}")]
pub struct TaskFailure {
    pub asset_id: AssetId,
    pub kind: FailureKind,
    pub detail: String,
}

impl TaskFailure {
    pub fn new(asset_id: AssetId, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            asset_id,
            kind,
            detail: detail.into(),
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, TriageError>;
