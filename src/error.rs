//! Error types shared by backends, jobs and the model.

use std::fmt;

/// Coarse classification of an [`Error`], stable across detail changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SpawnFailure,
    ProcessFailure,
    ParseFailure,
    UnsupportedOperation,
    Busy,
    InvalidInput,
    Cancelled,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SpawnFailure => "spawn failure",
            ErrorKind::ProcessFailure => "process failure",
            ErrorKind::ParseFailure => "parse failure",
            ErrorKind::UnsupportedOperation => "unsupported operation",
            ErrorKind::Busy => "busy",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "i/o error",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by archive operations.
///
/// The type is `Clone` so a job can keep its terminal error while also
/// handing a copy to observers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The archiver program could not be started.
    #[error("could not start {program}: {detail}")]
    Spawn { program: String, detail: String },

    /// The archiver ran but reported failure.
    #[error("{program} failed ({}): {detail}", exit_description(*.code))]
    Process {
        program: String,
        code: Option<i32>,
        detail: String,
    },

    /// A listing row could not be interpreted.
    #[error("malformed listing row: {0}")]
    Parse(String),

    /// A read-only backend was asked to modify its archive.
    #[error("{operation} is not supported for {backend} archives")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// Another operation is still running against the same archive.
    #[error("another operation is already running on this archive")]
    Busy,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(String),
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Spawn { .. } => ErrorKind::SpawnFailure,
            Error::Process { .. } => ErrorKind::ProcessFailure,
            Error::Parse(_) => ErrorKind::ParseFailure,
            Error::Unsupported { .. } => ErrorKind::UnsupportedOperation,
            Error::Busy => ErrorKind::Busy,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Tool output or other context that helps explain the failure.
    pub fn detail(&self) -> Option<&str> {
        let detail = match self {
            Error::Spawn { detail, .. } | Error::Process { detail, .. } => detail.as_str(),
            Error::Parse(msg) | Error::InvalidInput(msg) | Error::Io(msg) => msg.as_str(),
            Error::Unsupported { .. } | Error::Busy | Error::Cancelled => return None,
        };
        (!detail.is_empty()).then_some(detail)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
