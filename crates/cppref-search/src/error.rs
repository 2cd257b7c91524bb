use std::path::PathBuf;

use mcp_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("malformed record #{record} in {origin}: {reason}")]
    MalformedRecord {
        origin: String,
        record: usize,
        reason: String,
    },

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("symbol not found: {0}")]
    NotFound(String),

    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AppError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
