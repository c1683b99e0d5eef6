use crate::worker::WorkerEvent;
use deno_core::{op2, OpState};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use worker2_types::events::MessageEvent;

/// A message sent by the worker script to the host through `Deno.core.ops.op_worker_send`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Result of `postMessage(data)`.
    Message { data: JsonValue },
    /// Result of `console.*(...)`.
    Log { level: String, message: String },
    /// Result of `close()`.
    Close,
}

/// The channel from the worker script back to the host, stored in the isolate `OpState`.
#[derive(Clone)]
pub struct WorkerOutbound {
    worker_id: Uuid,
    events: mpsc::UnboundedSender<WorkerEvent>,
    closed: Arc<AtomicBool>,
}

impl WorkerOutbound {
    pub fn new(worker_id: Uuid, events: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self {
            worker_id,
            events,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Indicates whether the worker script closed itself with `close()`.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sends an event to the host. Events are dropped once the host stopped listening.
    pub fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            debug!(worker_id = %self.worker_id, "Worker event channel is closed, dropping event.");
        }
    }

    pub fn handle(&self, message: OutboundMessage) {
        match message {
            OutboundMessage::Message { data } => {
                if !self.is_closed() {
                    self.emit(WorkerEvent::Message(MessageEvent::new(self.worker_id, data)));
                }
            }
            OutboundMessage::Log { level, message } => match level.as_str() {
                "error" => error!(worker_id = %self.worker_id, "{message}"),
                "warn" => warn!(worker_id = %self.worker_id, "{message}"),
                "debug" => debug!(worker_id = %self.worker_id, "{message}"),
                _ => info!(worker_id = %self.worker_id, "{message}"),
            },
            OutboundMessage::Close => {
                self.closed.store(true, Ordering::Release);
            }
        }
    }
}

#[op2]
fn op_worker_send(state: &mut OpState, #[serde] message: OutboundMessage) {
    state.borrow::<WorkerOutbound>().handle(message);
}

deno_core::extension!(
    worker2_ext,
    ops = [op_worker_send],
    options = { outbound: WorkerOutbound },
    state = |state, options| {
        state.put(options.outbound);
    },
);
