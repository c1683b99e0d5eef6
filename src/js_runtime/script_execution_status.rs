/// Defines the status of the code running inside the script worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptExecutionStatus {
    /// Script is running.
    Running = 0,
    /// The script was terminated because it hit the memory limit.
    ReachedMemoryLimit = 1,
    /// The script was terminated because it hit the time limit.
    ReachedTimeLimit = 2,
    /// The script has been successfully completed, worker is idle.
    ExecutionCompleted = 3,
    /// The worker was terminated by the host.
    Terminated = 4,
}

impl From<usize> for ScriptExecutionStatus {
    fn from(value: usize) -> Self {
        match value {
            1 => Self::ReachedMemoryLimit,
            2 => Self::ReachedTimeLimit,
            3 => Self::ExecutionCompleted,
            4 => Self::Terminated,
            _ => Self::Running,
        }
    }
}
