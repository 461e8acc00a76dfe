//! Exception handling (spec.md §4.F).
//!
//! A task installs itself as its own handler for the dynamic extent of a
//! closure via [`try_catch`]. `raise` delivers a value to whichever task
//! is currently registered as the handler:
//!
//! - if that's the calling task itself, `raise` is a same-stack
//!   non-local jump back into the matching `try_catch` — the same
//!   `capture`/`restore` pair `transfer_to` uses for a cross-task switch,
//!   just without changing which task is "current";
//! - if it's a different (and therefore currently suspended) task —
//!   which happens because a task inherits its creator's handler at
//!   creation time (spec.md §4.D step 3) — the raising task dies
//!   carrying the exception as its `result`, exactly like an ordinary
//!   uncaught error, and control transfers to the handler task the same
//!   way a normal `yieldto` would. `transfer_to` notices the delivered
//!   exception on the other side and re-raises it there, so it keeps
//!   walking outward until some `try_catch` catches it or it reaches the
//!   root task.
//!
//! One pair of primitives, `capture`/`restore`, covers both cases — there
//! is no `catch_unwind`-based path here, because the cross-task case
//! isn't an unwind: the handler task isn't on the current call stack at
//! all, so there is nothing to unwind through.

use crate::context::{self, Context};
use crate::runtime;
use crate::task::{self, Task};
use crate::value::Value;

/// Run `body`, catching any exception raised by it — or by a task it
/// creates, down through however many `yieldto` hops — before it escapes
/// the current task.
///
/// Returns `Ok` with `body`'s return value on normal completion, or `Err`
/// with the raised value if one was caught.
pub fn try_catch(body: impl FnOnce() -> Value) -> Result<Value, Value> {
    let current = runtime::current();
    let prev_handler = current.eh_task();
    current.set_eh_task(Some(current.clone()));

    let mut ctx = Context::default();
    // Safety: `ctx` lives in this stack frame for as long as `try_catch`
    // hasn't returned, which covers every point `raise` might jump back
    // to it from (see the module doc).
    let resumed = unsafe { context::capture(&mut ctx as *mut Context) };

    if resumed {
        current.set_eh_task(prev_handler);
        current.set_eh_ctx(None);
        let exn = runtime::take_exception_in_transit()
            .expect("raise always populates the transit slot before jumping back here");
        return Err(exn);
    }

    current.set_eh_ctx(Some(ctx));
    let result = body();

    current.set_eh_task(prev_handler);
    current.set_eh_ctx(None);
    Ok(result)
}

/// Deliver `exn` to the current handler (spec.md §4.F `raise`). Never
/// returns: either it jumps back into a same-task `try_catch`, or the
/// current task dies and control transfers elsewhere.
pub fn raise(exn: Value) -> ! {
    let current = runtime::current();

    match current.eh_task() {
        Some(h) if h == current => {
            let ctx = current
                .eh_ctx()
                .expect("a task that is its own handler always has a captured resume point");
            runtime::set_exception_in_transit(exn);
            // Safety: `ctx` was captured by the still-live `try_catch`
            // frame that installed this handler; restoring it is a
            // same-stack non-local jump, not a task switch.
            unsafe { context::restore(&ctx as *const Context) }
        }
        Some(h) if h.is_done() || h.eh_ctx().is_none() => {
            // The nominal handler task is unusable: either it has already
            // finished, or it isn't currently inside the `try_catch` that
            // made it a handler in the first place (spec.md §4.F step 4:
            // "If h.done or h.state.eh_ctx == null: the nominal handler is
            // unusable... redirect h <- root_task"). Bypass it entirely
            // rather than resuming it at whatever unrelated point it's
            // suspended and hoping `transfer_to`'s re-check sorts it out.
            log::warn!("raise: handler task is unusable, redirecting to root");
            deliver_and_die(&current, &runtime::root(), exn)
        }
        Some(h) => {
            log::debug!("raise: propagating to handler task");
            deliver_and_die(&current, &h, exn)
        }
        None => {
            log::error!("raise: no handler installed, task is terminating");
            let target = match current.on_exit() {
                Some(parent) => task::first_live(parent),
                None => {
                    // The root task has no handler and nowhere further to
                    // propagate to.
                    panic!("unhandled exception on the root task: {exn:?}");
                }
            };
            deliver_and_die(&current, &target, exn)
        }
    }
}

fn deliver_and_die(current: &Task, target: &Task, exn: Value) -> ! {
    let target = task::first_live(target.clone());
    current.finish(exn.clone());
    runtime::set_exception_in_transit(exn);
    crate::transfer::transfer_to(&target);
    unreachable!("a finished task was resumed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime;
    use crate::task::Task;

    #[test]
    fn catches_a_same_task_raise() {
        runtime::init().expect("init");
        let outcome = try_catch(|| {
            raise(Value::host("boom"));
        });
        match outcome {
            Err(Value::Host(h)) => assert_eq!(*h.downcast::<&str>().expect("str"), "boom"),
            other => panic!("expected a caught exception, got {other:?}"),
        }
    }

    #[test]
    fn catches_a_raise_from_a_child_task() {
        runtime::init().expect("init");
        let outcome = try_catch(|| {
            let child = Task::new(|_| {
                raise(Value::host("child failed"));
            })
            .expect("create");
            crate::transfer::yieldto(&child, vec![]).expect("yield")
        });
        match outcome {
            Err(Value::Host(h)) => {
                assert_eq!(*h.downcast::<&str>().expect("str"), "child failed")
            }
            other => panic!("expected a caught exception, got {other:?}"),
        }
    }

    /// spec.md §4.F step 4: if the task a child inherited as its handler
    /// has since finished (so its `eh_ctx` is no longer installed), a
    /// raise must bypass it and redirect straight to root rather than
    /// resuming it at some unrelated suspension point.
    #[test]
    fn raise_redirects_to_root_when_handler_task_has_finished() {
        use std::cell::RefCell;
        use std::rc::Rc;

        runtime::init().expect("init");
        let c_slot: Rc<RefCell<Option<Task>>> = Rc::new(RefCell::new(None));
        let c_slot_in_h = c_slot.clone();

        // `h` installs itself as a handler, creates `c` (which inherits
        // `h` as its handler), lets `c` suspend once without raising, then
        // returns — finishing `h` while `c` is still alive and suspended.
        let h = Task::new(move |_| {
            let _ = try_catch(|| {
                let h_task = runtime::current();
                let c = Task::new(move |_| {
                    crate::transfer::yieldto(&h_task, vec![]).expect("yield back to h");
                    raise(Value::host("late"));
                })
                .expect("create c");
                *c_slot_in_h.borrow_mut() = Some(c.clone());
                crate::transfer::yieldto(&c, vec![]).expect("first yield into c")
            });
            Value::Unit
        })
        .expect("create h");

        let _ = crate::transfer::yieldto(&h, vec![]).expect("run h to completion");
        assert!(h.is_done());

        let c = c_slot.borrow().clone().expect("h created c");
        assert!(!c.is_done(), "c is still suspended after yielding back to h");

        // h is done now, so resuming c (which raises) must redirect past
        // it to root instead of resuming h's stale suspension point.
        let outcome = try_catch(|| crate::transfer::yieldto(&c, vec![]).expect("resume c"));
        match outcome {
            Err(Value::Host(v)) => assert_eq!(*v.downcast::<&str>().expect("str"), "late"),
            other => panic!("expected root's handler to catch the redirected raise: {other:?}"),
        }
        assert!(c.is_done());
    }
}
