use std::io;

/// All error kinds produced by the library.
///
/// Parser and validator failures are returned immediately. Transport errors
/// may be swallowed by the retry loop and resurface wrapped in
/// [`Error::RetriesExhausted`]. Cancellation and deadline expiry always
/// short-circuit the pipeline and are never produced by retry exhaustion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Preprocessor, tokenizer, interpolator, or flag parser failure.
    /// `position` is a 0-based byte offset into the input where known.
    #[error("parse error{}: {reason}", fmt_position(.position))]
    Parse {
        position: Option<usize>,
        reason: String,
    },

    /// A `RequestOptions` invariant failed before sending.
    #[error("invalid request: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The transport returned an error (DNS, TLS, connection, protocol).
    #[error("transport error")]
    Transport(#[source] reqwest::Error),

    /// Non-2xx status, only produced by helpers that opt into treating
    /// those as errors.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The caller's cancellation handle was signalled.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline expired.
    #[error("deadline exceeded")]
    Timeout,

    /// All attempts failed; wraps the final transport error or the last
    /// retryable status.
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    #[error("i/o error")]
    Io(#[from] io::Error),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn parse(position: impl Into<Option<usize>>, reason: impl Into<String>) -> Error {
        Error::Parse {
            position: position.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Error {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// The innermost error after unwrapping retry exhaustion.
    pub fn root(&self) -> &Error {
        match self {
            Error::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Transport(err) => err.is_timeout(),
            Error::RetriesExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }
}

// `Error::Timeout` is reserved for the caller's deadline; a transport-level
// timeout stays a transport error and is visible via `is_timeout()`.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Transport(err)
    }
}

fn fmt_position(position: &Option<usize>) -> String {
    match position {
        Some(pos) => format!(" at byte {pos}"),
        None => String::new(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
