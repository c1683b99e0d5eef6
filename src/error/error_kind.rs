/// Describes an application specific error types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Error caused by an invalid argument supplied by the caller.
    InvalidArgument,
    /// The worker has already been terminated.
    Terminated,
    /// Unknown error.
    Unknown,
}
