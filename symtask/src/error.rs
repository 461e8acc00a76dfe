use std::io;

/// Errors the task runtime can report to its host.
///
/// Init-time failures that spec.md §7 classifies as "not recoverable" (an
/// unsupported architecture, a guard page that refuses to protect) are
/// still returned here rather than panicking or aborting the process
/// directly: `symtask::init()` reports `UnsupportedArchitecture` as an
/// ordinary `Err`, leaving the decision of how to surface "nothing in the
/// runtime can run without this" to the host, rather than unilaterally
/// aborting a process the host may want to shut down some other way.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("symtask does not support this target architecture/OS")]
    UnsupportedArchitecture,

    #[error("requested stack size {requested} is below the minimum of {minimum} bytes")]
    StackTooSmall { requested: usize, minimum: usize },

    #[error("failed to protect guard page: {0}")]
    GuardPageProtect(#[source] io::Error),

    #[error("failed to allocate task stack: {0}")]
    StackAlloc(#[source] io::Error),

    #[error("a task cannot transfer control to itself")]
    NotCurrent,
}
