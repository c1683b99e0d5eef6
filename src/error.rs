mod error_kind;

pub use self::error_kind::ErrorKind;
use std::fmt::{Debug, Display};

/// Error returned by the worker handles.
#[derive(thiserror::Error, Debug)]
#[error("{root_cause}")]
pub struct Error {
    root_cause: anyhow::Error,
    kind: ErrorKind,
}

impl Error {
    /// Creates an error caused by an invalid argument supplied by the caller.
    pub fn invalid_argument<M>(message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self {
            root_cause: anyhow::Error::msg(message),
            kind: ErrorKind::InvalidArgument,
        }
    }

    /// Creates an error indicating that the worker has already been terminated.
    pub fn terminated() -> Self {
        Self {
            root_cause: anyhow::Error::msg("Worker has been terminated."),
            kind: ErrorKind::Terminated,
        }
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the underlying error.
    pub fn root_cause(&self) -> &anyhow::Error {
        &self.root_cause
    }
}

impl From<anyhow::Error> for Error {
    fn from(root_cause: anyhow::Error) -> Self {
        Self {
            root_cause,
            kind: ErrorKind::Unknown,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        anyhow::Error::new(err)
            .context("Failed to serialize worker message.")
            .into()
    }
}
