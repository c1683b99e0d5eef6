use serde_json::Value as JsonValue;
use std::fmt::{Debug, Formatter};
use worker2_types::events::{ErrorEvent, MessageEvent};

/// Handler invoked with the message payload and the full event.
pub type MessageHandler = Box<dyn FnMut(JsonValue, &MessageEvent) + Send + 'static>;

/// Handler invoked with the raw error event.
pub type ErrorHandler = Box<dyn FnMut(&ErrorEvent) + Send + 'static>;

/// Optional caller callbacks for the worker events. Handlers are invoked on the worker event
/// thread, never on the thread that created the worker.
#[derive(Default)]
pub struct WorkerHandlers {
    pub(crate) on_message: Option<MessageHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
}

impl WorkerHandlers {
    /// Creates a set of handlers with no callbacks registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for the messages posted by the worker.
    pub fn on_message(
        mut self,
        handler: impl FnMut(JsonValue, &MessageEvent) + Send + 'static,
    ) -> Self {
        self.on_message = Some(Box::new(handler));
        self
    }

    /// Registers a handler for the errors raised inside the worker.
    pub fn on_error(mut self, handler: impl FnMut(&ErrorEvent) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }
}

impl Debug for WorkerHandlers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandlers")
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
