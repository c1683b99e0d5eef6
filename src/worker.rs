mod event_dispatcher;
mod payload;
mod worker_event;
mod worker_handlers;
mod worker_lifecycle;

pub(crate) use self::{
    event_dispatcher::EventDispatcher, payload::normalize_payload, worker_event::WorkerEvent,
    worker_lifecycle::WorkerLifecycle,
};
pub use self::worker_handlers::{ErrorHandler, MessageHandler, WorkerHandlers};

use crate::error::Error;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// The host side of a worker: the inbound message channel plus the lifecycle shared with the
/// worker and event threads. Both worker handles are built on top of it.
pub(crate) struct WorkerPort<M> {
    id: Uuid,
    inbound: Mutex<Option<mpsc::UnboundedSender<M>>>,
    lifecycle: Arc<WorkerLifecycle>,
}

impl<M> WorkerPort<M> {
    pub fn new(
        id: Uuid,
        inbound: mpsc::UnboundedSender<M>,
        lifecycle: Arc<WorkerLifecycle>,
    ) -> Self {
        Self {
            id,
            inbound: Mutex::new(Some(inbound)),
            lifecycle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Forwards a message to the worker. Fails only if the worker has been terminated by the
    /// host, messages to a worker that stopped on its own are dropped.
    pub fn send(&self, message: M) -> Result<(), Error> {
        let inbound = self.inbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(ref inbound) = *inbound else {
            return Err(Error::terminated());
        };

        if inbound.send(message).is_err() {
            debug!(worker_id = %self.id, "Worker has stopped, message is dropped.");
        }

        Ok(())
    }

    /// Terminates the worker: no events are delivered after this call returns.
    pub fn terminate(&self) {
        if self.lifecycle.terminate() {
            debug!(worker_id = %self.id, "Worker has been terminated.");
        }

        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
