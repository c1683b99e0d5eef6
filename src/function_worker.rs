mod command_table;

pub use self::command_table::CommandTable;
use crate::{
    config::{PayloadNormalization, WorkerConfig},
    error::Error,
    worker::{
        normalize_payload, EventDispatcher, WorkerEvent, WorkerHandlers, WorkerLifecycle,
        WorkerPort,
    },
};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;
use worker2_types::{
    events::{ErrorEvent, ErrorEventKind, MessageEvent},
    jobs::FunctionJob,
};

/// A handle to a worker that runs one operation from a [`CommandTable`] in a background thread.
/// Every posted payload is applied to the operation as a list of positional arguments and the
/// return value is posted back.
///
/// ```no_run
/// use worker2::{CommandTable, FunctionWorker, WorkerHandlers};
///
/// let mut table = CommandTable::default();
/// table.register("add", |(a, b): (i64, i64)| Ok(a + b));
///
/// let worker = FunctionWorker::new(
///     table,
///     "add",
///     WorkerHandlers::new().on_message(|sum, _| println!("Sum: {sum}")),
/// )?;
/// worker.post_message([2, 3])?;
/// # Ok::<(), worker2::Error>(())
/// ```
pub struct FunctionWorker {
    port: WorkerPort<FunctionJob>,
    operation: String,
    normalization: PayloadNormalization,
}

impl FunctionWorker {
    /// Starts a worker bound to the specified operation with the default configuration. Fails
    /// with `ErrorKind::InvalidArgument` if the operation name is empty or isn't registered.
    pub fn new(
        table: CommandTable,
        operation: impl Into<String>,
        handlers: WorkerHandlers,
    ) -> Result<Self, Error> {
        Self::with_config(table, operation, handlers, WorkerConfig::default())
    }

    /// Starts a worker bound to the specified operation. Only the payload normalization policy
    /// of the config applies, the operations run natively and aren't subject to JS limits.
    pub fn with_config(
        table: CommandTable,
        operation: impl Into<String>,
        handlers: WorkerHandlers,
        config: WorkerConfig,
    ) -> Result<Self, Error> {
        let operation = operation.into();
        if operation.trim().is_empty() {
            return Err(Error::invalid_argument(
                "Invalid operation: must not be empty.",
            ));
        }

        if !table.contains(&operation) {
            return Err(Error::invalid_argument(format!(
                "Invalid operation: `{operation}` isn't registered."
            )));
        }

        let id = Uuid::now_v7();
        let lifecycle = Arc::new(WorkerLifecycle::default());
        let events = EventDispatcher::spawn(id, handlers, lifecycle.clone())?;

        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<FunctionJob>();
        let worker_lifecycle = lifecycle.clone();
        std::thread::Builder::new()
            .name(format!("worker2-fn-{id}"))
            .spawn(move || {
                while let Some(job) = inbound_rx.blocking_recv() {
                    if worker_lifecycle.is_terminated() {
                        break;
                    }

                    let event = match table.execute(&job) {
                        Ok(data) => WorkerEvent::Message(MessageEvent::new(id, data)),
                        Err(err) => WorkerEvent::Error(ErrorEvent::new(
                            id,
                            ErrorEventKind::Exception,
                            format!("{err:#}"),
                        )),
                    };

                    // The worker may have been terminated while the operation was running.
                    if worker_lifecycle.is_terminated() || events.send(event).is_err() {
                        break;
                    }
                }

                debug!(worker_id = %id, "Function worker stopped.");
            })
            .context("Unable to spawn function worker thread.")?;

        debug!(worker_id = %id, operation = %operation, "Started function worker.");

        Ok(Self {
            port: WorkerPort::new(id, inbound_tx, lifecycle),
            operation,
            normalization: config.payload_normalization,
        })
    }

    /// Unique id of the worker, reported in all its events.
    pub fn id(&self) -> Uuid {
        self.port.id()
    }

    /// Name of the operation the worker is bound to.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Terminates the worker. An operation that is already running completes, but its result is
    /// discarded and no handler is invoked afterwards.
    pub fn terminate(&self) {
        self.port.terminate();
    }

    /// Alias for [`FunctionWorker::terminate`].
    pub fn stop(&self) {
        self.terminate();
    }

    /// Runs the bound operation with the specified arguments. Absent data (`null`) means no
    /// arguments, see [`PayloadNormalization`] for the other options.
    pub fn post_message<T: Serialize>(&self, data: T) -> Result<(), Error> {
        let args = normalize_payload(serde_json::to_value(data)?, self.normalization);
        self.port.send(FunctionJob::new(self.operation.as_str(), args))
    }

    /// Alias for [`FunctionWorker::post_message`].
    pub fn post<T: Serialize>(&self, data: T) -> Result<(), Error> {
        self.post_message(data)
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandTable, FunctionWorker};
    use crate::{
        config::{PayloadNormalization, WorkerConfig},
        error::ErrorKind,
        worker::WorkerHandlers,
    };
    use anyhow::anyhow;
    use serde_json::{json, Value as JsonValue};
    use std::{
        sync::mpsc::{channel, Receiver},
        time::Duration,
    };
    use worker2_types::events::{ErrorEvent, ErrorEventKind, MessageEvent};

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn table() -> CommandTable {
        let mut table = CommandTable::default();
        table
            .register("add", |(a, b): (i64, i64)| Ok(a + b))
            .register("fail", |_: Vec<JsonValue>| Err::<(), _>(anyhow!("Uh oh.")))
            .register("sleep", |(millis,): (u64,)| {
                std::thread::sleep(Duration::from_millis(millis));
                Ok(millis)
            })
            .register_raw("count", |args| Ok(json!(args.len())))
            .register_raw("explode", |_| panic!("Boom."));
        table
    }

    fn recording_handlers() -> (
        WorkerHandlers,
        Receiver<(JsonValue, MessageEvent)>,
        Receiver<ErrorEvent>,
    ) {
        let (messages_tx, messages_rx) = channel();
        let (errors_tx, errors_rx) = channel();
        let handlers = WorkerHandlers::new()
            .on_message(move |data, event| {
                let _ = messages_tx.send((data, event.clone()));
            })
            .on_error(move |event| {
                let _ = errors_tx.send(event.clone());
            });

        (handlers, messages_rx, errors_rx)
    }

    #[test]
    fn runs_operation() -> anyhow::Result<()> {
        let (handlers, messages, errors) = recording_handlers();
        let worker = FunctionWorker::new(table(), "add", handlers)?;
        assert_eq!(worker.operation(), "add");

        worker.post_message([2, 3])?;
        let (data, event) = messages.recv_timeout(RECV_TIMEOUT)?;
        assert_eq!(data, json!(5));
        assert_eq!(event.data, json!(5));
        assert_eq!(event.worker_id, worker.id());

        worker.post(json!([10, -4]))?;
        assert_eq!(messages.recv_timeout(RECV_TIMEOUT)?.0, json!(6));
        assert!(errors.try_recv().is_err());

        Ok(())
    }

    #[test]
    fn fails_for_invalid_operations() {
        let (handlers, _, _) = recording_handlers();
        let error = FunctionWorker::new(table(), "", handlers).err().unwrap();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert_eq!(error.to_string(), "Invalid operation: must not be empty.");

        let (handlers, _, _) = recording_handlers();
        let error = FunctionWorker::new(table(), "subtract", handlers)
            .err()
            .unwrap();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            error.to_string(),
            "Invalid operation: `subtract` isn't registered."
        );
    }

    #[test]
    fn reports_failed_operations() -> anyhow::Result<()> {
        let (handlers, messages, errors) = recording_handlers();
        let worker = FunctionWorker::new(table(), "fail", handlers)?;

        worker.post_message(json!([]))?;
        let event = errors.recv_timeout(RECV_TIMEOUT)?;
        assert_eq!(event.kind, ErrorEventKind::Exception);
        assert_eq!(event.message, "Uh oh.");
        assert_eq!(event.worker_id, worker.id());
        assert!(messages.recv_timeout(Duration::from_millis(200)).is_err());

        Ok(())
    }

    #[test]
    fn survives_panicking_operations() -> anyhow::Result<()> {
        let (handlers, _, errors) = recording_handlers();
        let worker = FunctionWorker::new(table(), "explode", handlers)?;

        worker.post_message(json!([]))?;
        assert_eq!(
            errors.recv_timeout(RECV_TIMEOUT)?.message,
            "Operation `explode` panicked: Boom."
        );

        // The worker thread is still alive.
        worker.post_message(json!([]))?;
        assert_eq!(
            errors.recv_timeout(RECV_TIMEOUT)?.message,
            "Operation `explode` panicked: Boom."
        );

        Ok(())
    }

    #[test]
    fn reports_non_array_payloads() -> anyhow::Result<()> {
        let (handlers, messages, errors) = recording_handlers();
        let worker = FunctionWorker::new(table(), "add", handlers)?;

        worker.post_message(5)?;
        let event = errors.recv_timeout(RECV_TIMEOUT)?;
        assert_eq!(event.kind, ErrorEventKind::Exception);
        assert_eq!(
            event.message,
            "Arguments of operation `add` must be an array, but received `5`."
        );
        assert!(messages.recv_timeout(Duration::from_millis(200)).is_err());

        Ok(())
    }

    #[test]
    fn replaces_absent_payloads_with_no_arguments() -> anyhow::Result<()> {
        let (handlers, messages, errors) = recording_handlers();
        let worker = FunctionWorker::new(table(), "count", handlers)?;

        worker.post_message(JsonValue::Null)?;
        assert_eq!(messages.recv_timeout(RECV_TIMEOUT)?.0, json!(0));

        worker.post_message(None::<Vec<u32>>)?;
        assert_eq!(messages.recv_timeout(RECV_TIMEOUT)?.0, json!(0));

        // Falsy, but not absent payloads are kept as is by default.
        worker.post_message(0)?;
        assert!(errors.recv_timeout(RECV_TIMEOUT)?.message.contains("must be an array"));

        Ok(())
    }

    #[test]
    fn can_replace_all_falsy_payloads() -> anyhow::Result<()> {
        let (handlers, messages, errors) = recording_handlers();
        let worker = FunctionWorker::with_config(
            table(),
            "count",
            handlers,
            WorkerConfig {
                payload_normalization: PayloadNormalization::Falsy,
                ..Default::default()
            },
        )?;

        for value in [json!(null), json!(0), json!(""), json!(false)] {
            worker.post_message(value)?;
            assert_eq!(messages.recv_timeout(RECV_TIMEOUT)?.0, json!(0));
        }
        assert!(errors.try_recv().is_err());

        Ok(())
    }

    #[test]
    fn terminate_and_stop_are_equivalent() -> anyhow::Result<()> {
        for use_stop in [false, true] {
            let (handlers, messages, errors) = recording_handlers();
            let worker = FunctionWorker::new(table(), "sleep", handlers)?;

            worker.post_message([200])?;
            std::thread::sleep(Duration::from_millis(50));

            if use_stop {
                worker.stop();
            } else {
                worker.terminate();
            }

            // The running operation completes, but its result is discarded.
            assert!(messages.recv_timeout(Duration::from_millis(400)).is_err());
            assert!(errors.try_recv().is_err());

            let error = worker.post_message([1]).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Terminated);

            // Terminating again is a no-op.
            worker.terminate();
        }

        Ok(())
    }

    #[test]
    fn tolerates_missing_handlers() -> anyhow::Result<()> {
        let worker = FunctionWorker::new(table(), "fail", WorkerHandlers::new())?;
        worker.post_message(json!([]))?;

        let (messages_tx, messages_rx) = channel();
        let worker = FunctionWorker::new(
            table(),
            "add",
            WorkerHandlers::new().on_message(move |data, _| {
                let _ = messages_tx.send(data);
            }),
        )?;
        worker.post_message(json!(["two", 3]))?;
        worker.post_message(json!([2, 3]))?;
        assert_eq!(messages_rx.recv_timeout(RECV_TIMEOUT)?, json!(5));

        Ok(())
    }
}
