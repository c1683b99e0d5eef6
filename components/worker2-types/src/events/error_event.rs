use crate::events::ErrorEventKind;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;
use uuid::Uuid;

/// Event delivered to the host when a worker fails. Handlers receive it as is, no interpretation
/// is applied on the way.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    /// Unique id of the worker that failed.
    pub worker_id: Uuid,
    /// Category of the failure.
    pub kind: ErrorEventKind,
    /// Human readable error message.
    pub message: String,
    /// Name of the script where the error occurred, if known.
    pub filename: Option<String>,
    /// Line number where the error occurred, if known.
    pub lineno: Option<u32>,
    /// Column number where the error occurred, if known.
    pub colno: Option<u32>,
    /// The moment the error was observed.
    #[serde(with = "time::serde::rfc3339")]
    pub time_stamp: OffsetDateTime,
}

impl ErrorEvent {
    /// Creates a new error event without location information, stamped with the current time.
    pub fn new(worker_id: Uuid, kind: ErrorEventKind, message: impl Into<String>) -> Self {
        Self {
            worker_id,
            kind,
            message: message.into(),
            filename: None,
            lineno: None,
            colno: None,
            time_stamp: OffsetDateTime::now_utc(),
        }
    }

    /// Attaches the location of the error within the worker script.
    pub fn with_location(
        mut self,
        filename: Option<String>,
        lineno: Option<u32>,
        colno: Option<u32>,
    ) -> Self {
        self.filename = filename;
        self.lineno = lineno;
        self.colno = colno;
        self
    }
}
