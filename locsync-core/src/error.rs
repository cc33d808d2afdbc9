//! Error taxonomy shared by the cache, filters, transport and transfer pool.

use thiserror::Error;

/// Every failure the core can surface to a caller.
///
/// Per-task failures inside the transfer pool are not raised through this
/// type; they are folded into [`crate::pool::TaskOutcome`] so one bad file
/// never stops the others.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON from the server or the cache file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered 401.
    #[error("User is not authorised for this request. Check `access_token` in configuration.")]
    Unauthorized,

    /// A workspace, file or segment does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-2xx response.
    #[error("Request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// A workspace page failed twice in a row.
    #[error("Workspace pagination aborted at offset {offset}: {source}")]
    PaginationAborted {
        offset: usize,
        #[source]
        source: Box<SyncError>,
    },

    /// A configured blacklist entry is not a valid regular expression.
    #[error("invalid blacklist regexp '{pattern}': {source}")]
    InvalidBlacklist {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// `--file-path-pattern` is not one of the recognised tokens.
    #[error(
        "Invalid file-path-pattern \"{0}\"; please provide one of: language_code, language_lang_code, language_name, language_name_cap, language_name_allcap, local_capitalized"
    )]
    InvalidFilePathPattern(String),

    /// Missing or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A transfer task panicked; the pool converted it into this error.
    #[error("Task panicked: {0}")]
    TaskPanicked(String),
}

impl SyncError {
    pub fn is_auth_error(&self) -> bool {
        match self {
            SyncError::Unauthorized => true,
            SyncError::Status { status: 401, .. } => true,
            SyncError::PaginationAborted { source, .. } => source.is_auth_error(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::NotFound(_) | SyncError::Status { status: 404, .. }
        )
    }
}
