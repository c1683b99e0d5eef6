use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard, PoisonError,
};

/// A routine that interrupts the code currently running inside the worker.
pub type WorkerInterrupt = Box<dyn Fn() + Send + Sync + 'static>;

/// Termination state shared between the worker handle, the worker thread and the event thread.
#[derive(Default)]
pub struct WorkerLifecycle {
    terminated: AtomicBool,
    interrupt: Mutex<Option<WorkerInterrupt>>,
}

impl WorkerLifecycle {
    /// Indicates whether the worker has been terminated by the host.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Marks worker as terminated and interrupts any code it's currently running. Returns `false`
    /// if the worker was already terminated.
    pub fn terminate(&self) -> bool {
        let interrupt = self.lock_interrupt();
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Some(ref interrupt) = *interrupt {
            interrupt();
        }

        true
    }

    /// Installs the routine used to interrupt the worker. If the worker has already been
    /// terminated, the routine is invoked right away.
    pub fn set_interrupt(&self, interrupt: WorkerInterrupt) {
        let mut slot = self.lock_interrupt();
        if self.is_terminated() {
            interrupt();
        }
        *slot = Some(interrupt);
    }

    fn lock_interrupt(&self) -> MutexGuard<'_, Option<WorkerInterrupt>> {
        self.interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerLifecycle;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn terminates_only_once() {
        let lifecycle = WorkerLifecycle::default();
        let interrupts = Arc::new(AtomicUsize::new(0));

        let interrupts_clone = interrupts.clone();
        lifecycle.set_interrupt(Box::new(move || {
            interrupts_clone.fetch_add(1, Ordering::Relaxed);
        }));
        assert!(!lifecycle.is_terminated());
        assert_eq!(interrupts.load(Ordering::Relaxed), 0);

        assert!(lifecycle.terminate());
        assert!(lifecycle.is_terminated());
        assert_eq!(interrupts.load(Ordering::Relaxed), 1);

        assert!(!lifecycle.terminate());
        assert_eq!(interrupts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn interrupts_immediately_if_already_terminated() {
        let lifecycle = WorkerLifecycle::default();
        assert!(lifecycle.terminate());

        let interrupts = Arc::new(AtomicUsize::new(0));
        let interrupts_clone = interrupts.clone();
        lifecycle.set_interrupt(Box::new(move || {
            interrupts_clone.fetch_add(1, Ordering::Relaxed);
        }));
        assert_eq!(interrupts.load(Ordering::Relaxed), 1);
    }
}
