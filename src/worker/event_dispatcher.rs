use crate::worker::{WorkerEvent, WorkerHandlers, WorkerLifecycle};
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Delivers worker events to the caller handlers on a dedicated thread.
pub struct EventDispatcher {
    worker_id: Uuid,
    handlers: WorkerHandlers,
    lifecycle: Arc<WorkerLifecycle>,
}

impl EventDispatcher {
    /// Spawns the event thread and returns the channel the worker should send its events to. The
    /// thread exits once all senders are dropped or the worker is terminated.
    pub fn spawn(
        worker_id: Uuid,
        handlers: WorkerHandlers,
        lifecycle: Arc<WorkerLifecycle>,
    ) -> anyhow::Result<mpsc::UnboundedSender<WorkerEvent>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerEvent>();
        let mut dispatcher = Self {
            worker_id,
            handlers,
            lifecycle,
        };

        std::thread::Builder::new()
            .name(format!("worker2-events-{worker_id}"))
            .spawn(move || {
                while let Some(event) = rx.blocking_recv() {
                    if dispatcher.lifecycle.is_terminated() {
                        break;
                    }
                    dispatcher.dispatch(event);
                }

                debug!(worker_id = %dispatcher.worker_id, "Worker event thread stopped.");
            })
            .context("Unable to spawn worker event thread.")?;

        Ok(tx)
    }

    fn dispatch(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Message(event) => {
                if let Some(ref mut on_message) = self.handlers.on_message {
                    on_message(event.data.clone(), &event);
                } else {
                    debug!(worker_id = %self.worker_id, "Worker message has no handler, dropping.");
                }
            }
            WorkerEvent::Error(event) => {
                if let Some(ref mut on_error) = self.handlers.on_error {
                    on_error(&event);
                } else {
                    warn!(
                        worker_id = %self.worker_id,
                        kind = ?event.kind,
                        "Unhandled worker error: {}",
                        event.message
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EventDispatcher;
    use crate::worker::{WorkerEvent, WorkerHandlers, WorkerLifecycle};
    use serde_json::json;
    use std::{sync::Arc, time::Duration};
    use uuid::Uuid;
    use worker2_types::events::{ErrorEvent, ErrorEventKind, MessageEvent};

    #[test]
    fn delivers_events_to_handlers() -> anyhow::Result<()> {
        let worker_id = Uuid::now_v7();
        let (messages_tx, messages_rx) = std::sync::mpsc::channel();
        let (errors_tx, errors_rx) = std::sync::mpsc::channel();
        let handlers = WorkerHandlers::new()
            .on_message(move |data, event| {
                messages_tx.send((data, event.clone())).unwrap();
            })
            .on_error(move |event| {
                errors_tx.send(event.clone()).unwrap();
            });

        let events =
            EventDispatcher::spawn(worker_id, handlers, Arc::new(WorkerLifecycle::default()))?;

        let message = MessageEvent::new(worker_id, json!(5));
        events.send(WorkerEvent::Message(message.clone()))?;
        let (data, event) = messages_rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(data, json!(5));
        assert_eq!(event, message);

        let error = ErrorEvent::new(worker_id, ErrorEventKind::Exception, "Uh oh.");
        events.send(WorkerEvent::Error(error.clone()))?;
        assert_eq!(errors_rx.recv_timeout(Duration::from_secs(5))?, error);

        Ok(())
    }

    #[test]
    fn tolerates_missing_handlers() -> anyhow::Result<()> {
        let worker_id = Uuid::now_v7();
        let (errors_tx, errors_rx) = std::sync::mpsc::channel();
        let handlers = WorkerHandlers::new().on_error(move |event| {
            errors_tx.send(event.clone()).unwrap();
        });

        let events =
            EventDispatcher::spawn(worker_id, handlers, Arc::new(WorkerLifecycle::default()))?;
        events.send(WorkerEvent::Message(MessageEvent::new(worker_id, json!(1))))?;

        // Dispatcher is still alive after the unhandled message.
        let error = ErrorEvent::new(worker_id, ErrorEventKind::Exception, "Uh oh.");
        events.send(WorkerEvent::Error(error.clone()))?;
        assert_eq!(errors_rx.recv_timeout(Duration::from_secs(5))?, error);

        Ok(())
    }

    #[test]
    fn stops_delivering_events_after_termination() -> anyhow::Result<()> {
        let worker_id = Uuid::now_v7();
        let lifecycle = Arc::new(WorkerLifecycle::default());
        let (messages_tx, messages_rx) = std::sync::mpsc::channel();
        let handlers = WorkerHandlers::new().on_message(move |data, _| {
            messages_tx.send(data).unwrap();
        });

        let events = EventDispatcher::spawn(worker_id, handlers, lifecycle.clone())?;
        lifecycle.terminate();

        // The thread exits on the first event after termination, the channel closes afterwards.
        let _ = events.send(WorkerEvent::Message(MessageEvent::new(worker_id, json!(1))));
        assert!(messages_rx.recv_timeout(Duration::from_secs(1)).is_err());

        Ok(())
    }
}
