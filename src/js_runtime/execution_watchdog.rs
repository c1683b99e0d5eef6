use crate::js_runtime::script_execution_status::ScriptExecutionStatus;
use anyhow::Context;
use deno_core::v8;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};
use uuid::Uuid;

#[derive(Default)]
struct WatchdogState {
    /// Time by which the current execution must complete, if any execution is running.
    deadline: Option<Instant>,
    stopped: bool,
}

#[derive(Default)]
struct WatchdogShared {
    state: Mutex<WatchdogState>,
    wakeup: Condvar,
}

impl WatchdogShared {
    fn lock(&self) -> MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Terminates synchronous script executions that take longer than allowed. A single thread serves
/// all executions of a worker, it sleeps until the deadline of the current execution or until it's
/// woken up by the next one.
pub struct ExecutionWatchdog {
    shared: Arc<WatchdogShared>,
    status: Arc<AtomicUsize>,
    max_execution_time: Duration,
}

impl ExecutionWatchdog {
    pub fn spawn(
        worker_id: Uuid,
        isolate_handle: v8::IsolateHandle,
        status: Arc<AtomicUsize>,
        max_execution_time: Duration,
    ) -> anyhow::Result<Self> {
        let shared = Arc::new(WatchdogShared::default());

        let thread_shared = shared.clone();
        let thread_status = status.clone();
        std::thread::Builder::new()
            .name(format!("worker2-watchdog-{worker_id}"))
            .spawn(move || {
                let mut state = thread_shared.lock();
                loop {
                    if state.stopped {
                        return;
                    }

                    let Some(deadline) = state.deadline else {
                        state = thread_shared
                            .wakeup
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                        continue;
                    };

                    let Some(time_left) = deadline.checked_duration_since(Instant::now()) else {
                        state.deadline = None;
                        if thread_status
                            .compare_exchange(
                                ScriptExecutionStatus::Running as usize,
                                ScriptExecutionStatus::ReachedTimeLimit as usize,
                                Ordering::Relaxed,
                                Ordering::Relaxed,
                            )
                            .is_ok()
                        {
                            isolate_handle.terminate_execution();
                        }
                        continue;
                    };

                    state = thread_shared
                        .wakeup
                        .wait_timeout(state, time_left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            })
            .context("Unable to spawn JS worker watchdog thread.")?;

        Ok(Self {
            shared,
            status,
            max_execution_time,
        })
    }

    /// Marks the start of the synchronous execution and arms the deadline.
    pub fn start(&self) {
        if self
            .status
            .compare_exchange(
                ScriptExecutionStatus::ExecutionCompleted as usize,
                ScriptExecutionStatus::Running as usize,
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return;
        }

        self.shared.lock().deadline = Some(Instant::now() + self.max_execution_time);
        self.shared.wakeup.notify_one();
    }

    /// Marks the end of the synchronous execution and disarms the deadline.
    pub fn complete(&self) {
        let _ = self.status.compare_exchange(
            ScriptExecutionStatus::Running as usize,
            ScriptExecutionStatus::ExecutionCompleted as usize,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );

        self.shared.lock().deadline = None;
        self.shared.wakeup.notify_one();
    }
}

impl Drop for ExecutionWatchdog {
    fn drop(&mut self) {
        self.shared.lock().stopped = true;
        self.shared.wakeup.notify_one();
    }
}
