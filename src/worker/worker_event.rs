use worker2_types::events::{ErrorEvent, MessageEvent};

/// An event emitted by the worker thread towards the host.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// The worker posted a message.
    Message(MessageEvent),
    /// The worker failed.
    Error(ErrorEvent),
}
