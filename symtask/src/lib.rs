//! `symtask` — a symmetric coroutine ("task") runtime for embedding in a
//! host language.
//!
//! A task is a suspendable computation with its own stack: control moves
//! between tasks by explicit, named transfer rather than through a
//! scheduler. The runtime provides the primitive the host builds
//! cooperative concurrency, generators, and iterator protocols out of;
//! it has no scheduler, no I/O, and no opinion about what a task's body
//! actually does — that's the host's job.
//!
//! ```no_run
//! use symtask::{init, yieldto, Task, Value};
//!
//! init().expect("supported platform");
//!
//! let worker = Task::new(|arg| {
//!     println!("worker received {arg:?}");
//!     Value::host("done")
//! }).expect("allocate task");
//!
//! let result = yieldto(&worker, vec![Value::host(1i32)]).expect("transfer");
//! println!("caller received {result:?}");
//! ```

mod context;
mod error;
mod gc;
mod raise;
mod runtime;
mod stack;
mod task;
mod transfer;
mod value;

pub use error::TaskError;
pub use gc::{HostGc, NullGc, RootChainHead};
pub use raise::{raise, try_catch};
pub use task::Task;
pub use transfer::yieldto;
pub use value::Value;

/// Minimum stack size the runtime will allocate for a task (spec.md §6).
pub fn min_stack() -> usize {
    stack::min_stack()
}

/// Default stack size used by [`Task::new`] (spec.md §6).
pub fn default_stack() -> usize {
    stack::default_stack()
}

/// Initialize the calling OS thread's task graph (spec.md §4.D "Root
/// task"). Must run once per thread before any other call in this crate;
/// safe to call more than once.
pub fn init() -> Result<(), TaskError> {
    runtime::init()
}

/// The task currently executing on this thread.
pub fn current_task() -> Task {
    runtime::current()
}

/// This thread's root task.
pub fn root_task() -> Task {
    runtime::root()
}

/// Install the garbage collector this thread's task graph reports stack
/// transitions to (spec.md §5 GC contract). Defaults to [`NullGc`].
pub fn set_host_gc(gc: std::rc::Rc<dyn HostGc>) {
    runtime::set_host_gc(gc)
}
