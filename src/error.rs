use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort an extraction run.
///
/// Each variant names the stage that failed so the message printed by the
/// binary is enough to tell a bad connection string from a full disk.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("metadata service error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Service {
        status: Option<u16>,
        message: String,
    },

    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("xml serialization failed: {0}")]
    Serialization(String),
}

impl ExtractError {
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            status: None,
            message: message.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
