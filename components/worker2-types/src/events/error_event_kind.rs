use serde::{Deserialize, Serialize};

/// Describes what went wrong inside the worker.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ErrorEventKind {
    /// The worker script couldn't be loaded.
    Load,
    /// An uncaught exception in the worker code, or a failed operation.
    Exception,
    /// The worker exceeded its execution time limit and was shut down.
    TimeLimit,
    /// The worker exceeded its heap size limit and was shut down.
    MemoryLimit,
    /// The worker environment itself failed.
    Internal,
}

impl ErrorEventKind {
    /// Indicates whether the worker is shut down after reporting an error of this kind.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Exception)
    }
}
