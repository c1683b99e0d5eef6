use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

/// Event delivered to the host when a worker posts a message back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Unique id of the worker that posted the message.
    pub worker_id: Uuid,
    /// Message payload, passed through unchanged.
    pub data: JsonValue,
    /// The moment the worker posted the message.
    #[serde(with = "time::serde::rfc3339")]
    pub time_stamp: OffsetDateTime,
}

impl MessageEvent {
    /// Creates a new message event stamped with the current time.
    pub fn new(worker_id: Uuid, data: JsonValue) -> Self {
        Self {
            worker_id,
            data,
            time_stamp: OffsetDateTime::now_utc(),
        }
    }
}
