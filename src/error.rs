//! Tagged error type carrying one of the six stable exit kinds.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The six stable exit codes the core can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Usage,
    NotFound,
    Io,
    Integrity,
    Schema,
}

impl ExitKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ExitKind::Usage => 2,
            ExitKind::NotFound => 3,
            ExitKind::Io => 4,
            ExitKind::Integrity => 5,
            ExitKind::Schema => 6,
        }
    }
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitKind::Usage => "USAGE",
            ExitKind::NotFound => "NOTFOUND",
            ExitKind::Io => "IO",
            ExitKind::Integrity => "INTEGRITY",
            ExitKind::Schema => "SCHEMA",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum TablinumError {
    #[error("{0}")]
    Usage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    IoMsg(String),

    #[error("{0}")]
    Integrity(String),

    #[error("{0}")]
    Schema(String),
}

impl TablinumError {
    pub fn kind(&self) -> ExitKind {
        match self {
            TablinumError::Usage(_) => ExitKind::Usage,
            TablinumError::NotFound(_) => ExitKind::NotFound,
            TablinumError::Io { .. } | TablinumError::IoMsg(_) => ExitKind::Io,
            TablinumError::Integrity(_) => ExitKind::Integrity,
            TablinumError::Schema(_) => ExitKind::Schema,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TablinumError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        TablinumError::NotFound(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        TablinumError::Integrity(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        TablinumError::Schema(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        TablinumError::Usage(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TablinumError>;
