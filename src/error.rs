//! Error types
//!
//! Resolution errors never leave the resolver: every failure there degrades to
//! the fallback display. `Error` covers the parts that can fail at start-up or
//! from the CLI (trigger file, watcher, control socket).

use std::path::PathBuf;
use thiserror::Error;

/// Failure while introspecting windows of a terminal process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The accessibility API refused the query (permission not granted).
    #[error("accessibility permission not granted")]
    PermissionDenied,

    /// Window introspection is not available on this platform.
    #[error("window introspection is not supported on this platform")]
    Unsupported,

    /// Any other platform error code.
    #[error("accessibility query failed (code {0})")]
    Platform(i32),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("agent not running ({}): {source}", path.display())]
    NotRunning {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
