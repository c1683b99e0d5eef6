mod script_location;

pub use self::script_location::ScriptLocation;
use crate::{
    config::{PayloadNormalization, WorkerConfig},
    error::Error,
    js_runtime::{self, JsWorker, WorkerScript},
    worker::{normalize_payload, EventDispatcher, WorkerHandlers, WorkerLifecycle, WorkerPort},
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A handle to a worker that runs a JS script in a background thread.
///
/// The script talks to the host through the familiar worker scope: it receives messages via
/// `onmessage = (e) => ...` (or `self.addEventListener("message", ...)`) and replies with
/// `postMessage(data)`.
///
/// ```no_run
/// use worker2::{ScriptWorker, WorkerHandlers};
///
/// let worker = ScriptWorker::new(
///     "./worker.js",
///     WorkerHandlers::new()
///         .on_message(|data, _| println!("Worker replied: {data}"))
///         .on_error(|event| eprintln!("Worker failed: {}", event.message)),
/// )?;
/// worker.post_message([2, 3])?;
/// # Ok::<(), worker2::Error>(())
/// ```
pub struct ScriptWorker {
    port: WorkerPort<JsonValue>,
    normalization: PayloadNormalization,
}

impl ScriptWorker {
    /// Starts a worker for the script at the specified location with the default configuration.
    /// Fails with `ErrorKind::InvalidArgument` if location is empty or isn't textual.
    pub fn new<L>(location: L, handlers: WorkerHandlers) -> Result<Self, Error>
    where
        L: TryInto<ScriptLocation, Error = Error>,
    {
        Self::with_config(location, handlers, WorkerConfig::default())
    }

    /// Starts a worker for the script at the specified location.
    pub fn with_config<L>(
        location: L,
        handlers: WorkerHandlers,
        config: WorkerConfig,
    ) -> Result<Self, Error>
    where
        L: TryInto<ScriptLocation, Error = Error>,
    {
        let location = location.try_into()?;
        Self::spawn(WorkerScript::from_location(location), handlers, config)
    }

    /// Starts a worker for the script text supplied directly, no script file is needed. The name
    /// is only used to refer to the script in error events.
    pub fn from_source(
        name: impl Into<String>,
        source: impl Into<String>,
        handlers: WorkerHandlers,
        config: WorkerConfig,
    ) -> Result<Self, Error> {
        Self::spawn(WorkerScript::inline(name, source), handlers, config)
    }

    fn spawn(
        script: WorkerScript,
        handlers: WorkerHandlers,
        config: WorkerConfig,
    ) -> Result<Self, Error> {
        js_runtime::init_platform();

        let id = Uuid::now_v7();
        let lifecycle = Arc::new(WorkerLifecycle::default());
        let events = EventDispatcher::spawn(id, handlers, lifecycle.clone())?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        debug!(worker_id = %id, script = %script.name, "Starting script worker.");
        JsWorker {
            id,
            config,
            script,
            events,
            lifecycle: lifecycle.clone(),
        }
        .spawn(inbound_rx)?;

        Ok(Self {
            port: WorkerPort::new(id, inbound_tx, lifecycle),
            normalization: config.payload_normalization,
        })
    }

    /// Unique id of the worker, reported in all its events.
    pub fn id(&self) -> Uuid {
        self.port.id()
    }

    /// Terminates the worker immediately. Code that is currently running is interrupted, pending
    /// messages are discarded and no handler is invoked afterwards.
    pub fn terminate(&self) {
        self.port.terminate();
    }

    /// Alias for [`ScriptWorker::terminate`].
    pub fn stop(&self) {
        self.terminate();
    }

    /// Sends data to the worker. Absent data (`null`) is replaced with an empty array, see
    /// [`PayloadNormalization`] for the other options.
    pub fn post_message<T: Serialize>(&self, data: T) -> Result<(), Error> {
        let data = normalize_payload(serde_json::to_value(data)?, self.normalization);
        self.port.send(data)
    }

    /// Alias for [`ScriptWorker::post_message`].
    pub fn post<T: Serialize>(&self, data: T) -> Result<(), Error> {
        self.post_message(data)
    }
}
