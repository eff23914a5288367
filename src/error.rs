use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeysError>;

#[derive(Debug, Error)]
pub enum KeysError {
    #[error("malformed public key: {0}")]
    MalformedKey(String),

    #[error("unsafe username in key file: {0:?}")]
    UnsafeIdentity(String),

    #[error("{}:{line_no}: key line is not valid UTF-8", path.display())]
    UndecodableLine { path: PathBuf, line_no: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl KeysError {
    /// Problems confined to a single key line or key file.
    ///
    /// A synthesis run logs these, skips the offending input and keeps
    /// going; everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KeysError::MalformedKey(_)
                | KeysError::UnsafeIdentity(_)
                | KeysError::UndecodableLine { .. }
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        KeysError::MalformedKey(reason.into())
    }
}

/// Attach the offending path to an I/O error.
pub(crate) fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> KeysError {
    let path = path.into();
    move |source| KeysError::FileIo { path, source }
}
