mod execution_watchdog;
mod script_execution_status;
mod worker_outbound;
mod worker_script;

use self::{
    execution_watchdog::ExecutionWatchdog,
    script_execution_status::ScriptExecutionStatus,
    worker_outbound::{worker2_ext, WorkerOutbound},
};
pub use self::worker_script::WorkerScript;
use crate::{
    config::WorkerConfig,
    worker::{WorkerEvent, WorkerLifecycle},
};
use anyhow::{anyhow, Context};
use deno_core::{error::CoreError, serde_v8, v8, Extension, RuntimeOptions};
use serde_json::Value as JsonValue;
use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Once,
    },
};
use tokio::{runtime::Builder, sync::mpsc, task::LocalSet};
use tracing::{debug, error};
use uuid::Uuid;
use worker2_types::events::{ErrorEvent, ErrorEventKind};

/// Defines the name of the global variable the inbound message is passed through.
const SCRIPT_INBOUND_KEY: &str = "__worker2_inbound";

/// Name of the worker script as seen by V8.
const SCRIPT_NAME: &str = "worker2:worker.js";

/// Worker scope API installed before the worker script runs.
const BOOTSTRAP_SCRIPT: &str = include_str!("js_runtime/bootstrap.js");

/// Delivers the inbound message stored under `SCRIPT_INBOUND_KEY` to the worker handlers.
const DISPATCH_SCRIPT: &str = "globalThis.__worker2.dispatch();";

/// A list of Deno Core operations that aren't available to worker scripts.
const SCRIPT_EXCLUDED_OPS: [&str; 6] = [
    "op_resources",
    "op_shutdown",
    "op_panic",
    "op_import_sync",
    "op_lazy_load_esm",
    "op_eval_context",
];

static PLATFORM: Once = Once::new();

/// Initializes the V8 platform, subsequent calls are no-op.
pub fn init_platform() {
    PLATFORM.call_once(|| deno_core::JsRuntime::init_platform(None, false));
}

/// A worker that runs a JS script in a dedicated V8 isolate on its own thread.
pub struct JsWorker {
    pub id: Uuid,
    pub config: WorkerConfig,
    pub script: WorkerScript,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
    pub lifecycle: Arc<WorkerLifecycle>,
}

impl JsWorker {
    /// Starts the worker thread. The thread keeps processing inbound messages until the channel
    /// is closed, the worker is terminated, or the script closes itself.
    pub fn spawn(self, mut inbound: mpsc::UnboundedReceiver<JsonValue>) -> anyhow::Result<()> {
        // JsRuntime will be initialized in the dedicated thread.
        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Unable to initialize JS worker runtime.")?;
        std::thread::Builder::new()
            .name(format!("worker2-js-{}", self.id))
            .spawn(move || {
                let local = LocalSet::new();
                local.spawn_local(async move {
                    let worker_id = self.id;
                    self.run(&mut inbound).await;
                    debug!(worker_id = %worker_id, "JS worker stopped.");
                });
                rt.block_on(local);
            })
            .context("Unable to spawn JS worker thread.")?;

        Ok(())
    }

    async fn run(self, inbound: &mut mpsc::UnboundedReceiver<JsonValue>) {
        let outbound = WorkerOutbound::new(self.id, self.events.clone());

        let source = match self.script.load().await {
            Ok(source) => source,
            Err(err) => {
                outbound.emit(WorkerEvent::Error(
                    ErrorEvent::new(self.id, ErrorEventKind::Load, format!("{err:#}"))
                        .with_location(Some(self.script.name.clone()), None, None),
                ));
                return;
            }
        };

        let mut runtime = match WorkerRuntime::new(&self, outbound.clone()) {
            Ok(runtime) => runtime,
            Err(err) => {
                outbound.emit(WorkerEvent::Error(ErrorEvent::new(
                    self.id,
                    ErrorEventKind::Internal,
                    format!("{err:#}"),
                )));
                return;
            }
        };

        if let Err(err) = runtime.execute(SCRIPT_NAME, source) {
            if runtime.handle_error(err).is_break() {
                return;
            }
        }

        // Whether the event loop has no pending timers or promises left.
        let mut event_loop_idle = false;
        loop {
            if outbound.is_closed() || self.lifecycle.is_terminated() {
                return;
            }

            let next = if event_loop_idle {
                WorkerStep::Inbound(inbound.recv().await)
            } else {
                tokio::select! {
                    data = inbound.recv() => WorkerStep::Inbound(data),
                    result = runtime.run_event_loop() => WorkerStep::EventLoop(result),
                }
            };

            let result = match next {
                WorkerStep::Inbound(Some(data)) => {
                    event_loop_idle = false;
                    runtime.dispatch(data)
                }
                WorkerStep::Inbound(None) => return,
                WorkerStep::EventLoop(result) => {
                    // An exception in a timer leaves other timers pending.
                    event_loop_idle = result.is_ok();
                    result
                }
            };

            if let Err(err) = result {
                if runtime.handle_error(err).is_break() {
                    return;
                }
            }
        }
    }
}

/// What woke up the worker loop.
enum WorkerStep {
    Inbound(Option<JsonValue>),
    EventLoop(Result<(), CoreError>),
}

/// A V8 isolate with the worker scope installed.
struct WorkerRuntime {
    id: Uuid,
    script_name: String,
    runtime: deno_core::JsRuntime,
    outbound: WorkerOutbound,
    status: Arc<AtomicUsize>,
    watchdog: ExecutionWatchdog,
}

impl WorkerRuntime {
    fn new(worker: &JsWorker, outbound: WorkerOutbound) -> anyhow::Result<Self> {
        let mut runtime = deno_core::JsRuntime::new(RuntimeOptions {
            create_params: Some(
                v8::Isolate::create_params().heap_limits(1_048_576, worker.config.max_heap_size),
            ),
            extensions: vec![
                worker2_ext::init_ops(outbound.clone()),
                // Disable certain built-in operations.
                Extension {
                    name: "worker2_sandbox",
                    middleware_fn: Some(Box::new(|op| {
                        if SCRIPT_EXCLUDED_OPS.contains(&op.name) {
                            op.disable()
                        } else {
                            op
                        }
                    })),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });

        let status = Arc::new(AtomicUsize::new(
            ScriptExecutionStatus::ExecutionCompleted as usize,
        ));

        // Track memory usage and terminate execution if threshold is exceeded.
        let status_clone = status.clone();
        let isolate_handle = runtime.v8_isolate().thread_safe_handle();
        let worker_id = worker.id;
        runtime.add_near_heap_limit_callback(move |current_value, _| {
            error!(
                worker_id = %worker_id,
                "Approaching the memory limit of ({current_value}), terminating execution."
            );

            // Define termination reason and terminate execution.
            isolate_handle.terminate_execution();

            status_clone.store(
                ScriptExecutionStatus::ReachedMemoryLimit as usize,
                Ordering::Relaxed,
            );

            // Give the runtime enough heap to terminate without crashing the process.
            5 * current_value
        });

        // Let the host interrupt the isolate on termination.
        let status_clone = status.clone();
        let isolate_handle = runtime.v8_isolate().thread_safe_handle();
        worker.lifecycle.set_interrupt(Box::new(move || {
            status_clone.store(ScriptExecutionStatus::Terminated as usize, Ordering::Relaxed);
            isolate_handle.terminate_execution();
        }));

        let watchdog = ExecutionWatchdog::spawn(
            worker.id,
            runtime.v8_isolate().thread_safe_handle(),
            status.clone(),
            worker.config.max_execution_time,
        )?;

        runtime
            .execute_script("worker2:bootstrap.js", BOOTSTRAP_SCRIPT.to_string())
            .map_err(|err| anyhow!(err))
            .context("Failed to install worker scope.")?;

        Ok(Self {
            id: worker.id,
            script_name: worker.script.name.clone(),
            runtime,
            outbound,
            status,
            watchdog,
        })
    }

    /// Executes a script under the execution time limit.
    fn execute(&mut self, name: &'static str, source: String) -> Result<(), CoreError> {
        self.watchdog.start();
        let result = self.runtime.execute_script(name, source).map(|_| ());
        self.watchdog.complete();
        result
    }

    /// Delivers an inbound message to the worker `onmessage` handler and message listeners.
    fn dispatch(&mut self, data: JsonValue) -> Result<(), CoreError> {
        if let Err(err) = self.set_inbound_message(&data) {
            self.outbound.emit(WorkerEvent::Error(ErrorEvent::new(
                self.id,
                ErrorEventKind::Exception,
                format!("{err:#}"),
            )));
            return Ok(());
        }

        self.execute("worker2:dispatch.js", DISPATCH_SCRIPT.to_string())
    }

    /// Runs pending timers and promises until there is nothing left to do.
    async fn run_event_loop(&mut self) -> Result<(), CoreError> {
        self.runtime.run_event_loop(Default::default()).await
    }

    fn set_inbound_message(&mut self, data: &JsonValue) -> anyhow::Result<()> {
        let scope = &mut self.runtime.handle_scope();
        let context = scope.get_current_context();
        let context_scope = &mut v8::ContextScope::new(scope, context);

        let inbound_key = v8::String::new(context_scope, SCRIPT_INBOUND_KEY)
            .ok_or_else(|| anyhow!("Cannot create inbound message key."))?;
        let inbound_value =
            serde_v8::to_v8(context_scope, data).context("Cannot serialize inbound message")?;
        context
            .global(context_scope)
            .set(context_scope, inbound_key.into(), inbound_value);

        Ok(())
    }

    /// Reports the error to the host, if needed, and decides whether the worker can keep running.
    fn handle_error(&mut self, err: CoreError) -> ControlFlow<()> {
        let (kind, message) = match ScriptExecutionStatus::from(self.status.load(Ordering::Relaxed))
        {
            ScriptExecutionStatus::Terminated => return ControlFlow::Break(()),
            ScriptExecutionStatus::ReachedMemoryLimit => {
                (ErrorEventKind::MemoryLimit, "Script exceeded memory limit.")
            }
            ScriptExecutionStatus::ReachedTimeLimit => {
                (ErrorEventKind::TimeLimit, "Script exceeded time limit.")
            }
            ScriptExecutionStatus::Running | ScriptExecutionStatus::ExecutionCompleted => {
                self.outbound
                    .emit(WorkerEvent::Error(self.to_error_event(err)));
                return ControlFlow::Continue(());
            }
        };

        debug!(worker_id = %self.id, "Worker shuts down: {err}");
        self.outbound.emit(WorkerEvent::Error(ErrorEvent::new(
            self.id, kind, message,
        )));
        ControlFlow::Break(())
    }

    fn to_error_event(&self, err: CoreError) -> ErrorEvent {
        let js_error = match err {
            CoreError::Js(js_error) => js_error,
            err => return ErrorEvent::new(self.id, ErrorEventKind::Exception, err.to_string()),
        };

        let frame = js_error.frames.iter().find(|frame| {
            frame
                .file_name
                .as_deref()
                .map_or(false, |file_name| !file_name.starts_with("ext:"))
        });
        let (filename, lineno, colno) = match frame {
            Some(frame) => (
                frame.file_name.as_deref().map(|file_name| {
                    if file_name == SCRIPT_NAME {
                        self.script_name.clone()
                    } else {
                        file_name.to_string()
                    }
                }),
                frame.line_number.and_then(|line| u32::try_from(line).ok()),
                frame.column_number.and_then(|column| u32::try_from(column).ok()),
            ),
            None => (None, None, None),
        };

        ErrorEvent::new(
            self.id,
            ErrorEventKind::Exception,
            js_error.exception_message.clone(),
        )
        .with_location(filename, lineno, colno)
    }
}
