//! Per-thread runtime state (spec.md §5): the current task, the root
//! task, and the small transit slots a transfer uses to hand a value (or
//! an in-flight exception) from the task giving up control to the one
//! receiving it.
//!
//! spec.md models these as process-wide globals; this runtime is
//! explicitly single-threaded (spec.md §5 Non-goals), but nothing stops a
//! host from driving more than one OS thread, each running its own
//! independent task graph. `thread_local!` gives each such thread its own
//! copy of exactly the state spec.md describes, which is the smallest
//! change that keeps the single-task-graph-per-thread invariant spec.md
//! relies on while still being safe to use from more than one thread in
//! the same process.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context;
use crate::error::TaskError;
use crate::gc::{HostGc, NullGc};
use crate::task::{self, Task};
use crate::value::Value;

struct State {
    current: Task,
    root: Task,
    host_gc: Rc<dyn HostGc>,
}

thread_local! {
    static STATE: RefCell<Option<State>> = const { RefCell::new(None) };
    static ARG_IN_TRANSIT: RefCell<Option<Value>> = const { RefCell::new(None) };
    static EXCEPTION_IN_TRANSIT: RefCell<Option<Value>> = const { RefCell::new(None) };
}

/// Initialize the calling thread's task graph. Idempotent: a second call
/// on an already-initialized thread is a no-op success, mirroring
/// `jl_init_tasks`'s guard against double initialization.
pub fn init() -> Result<(), TaskError> {
    context::validate_supported()?;
    STATE.with(|s| {
        if s.borrow().is_some() {
            return Ok(());
        }
        let root = task::new_root();
        *s.borrow_mut() = Some(State {
            current: root.clone(),
            root,
            host_gc: Rc::new(NullGc::default()),
        });
        Ok(())
    })
}

pub(crate) fn ensure_initialized() -> Result<(), TaskError> {
    if STATE.with(|s| s.borrow().is_some()) {
        Ok(())
    } else {
        init()
    }
}

fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        let state = s
            .as_mut()
            .expect("symtask::init() must run on this thread before any other call");
        f(state)
    })
}

/// The task currently executing on this thread.
pub fn current() -> Task {
    with_state(|s| s.current.clone())
}

pub(crate) fn set_current(t: Task) {
    with_state(|s| s.current = t);
}

/// This thread's root task — the implicit task a freshly initialized
/// thread starts in, and the final link in every `on_exit` chain.
pub fn root() -> Task {
    with_state(|s| s.root.clone())
}

/// Install the garbage collector a thread's task graph reports stack
/// transitions to (spec.md §5 GC contract). Defaults to `NullGc`.
pub fn set_host_gc(gc: Rc<dyn HostGc>) {
    with_state(|s| s.host_gc = gc);
}

pub(crate) fn host_gc() -> Rc<dyn HostGc> {
    with_state(|s| Rc::clone(&s.host_gc))
}

pub(crate) fn set_arg_in_transit(v: Value) {
    ARG_IN_TRANSIT.with(|slot| *slot.borrow_mut() = Some(v));
}

pub(crate) fn take_arg_in_transit() -> Value {
    ARG_IN_TRANSIT
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or(Value::Unit)
}

pub(crate) fn set_exception_in_transit(v: Value) {
    EXCEPTION_IN_TRANSIT.with(|slot| *slot.borrow_mut() = Some(v));
}

pub(crate) fn take_exception_in_transit() -> Option<Value> {
    EXCEPTION_IN_TRANSIT.with(|slot| slot.borrow_mut().take())
}
