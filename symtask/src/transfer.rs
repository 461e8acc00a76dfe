//! Symmetric transfer of control between tasks (spec.md §4.E).

use crate::context;
use crate::error::TaskError;
use crate::runtime;
use crate::task::Task;
use crate::value::Value;

/// Switch execution to `t`, without first checking whether `t` is done
/// or is the current task — used internally by `task_trampoline` to hand
/// control onward once a task has already finished, where those checks
/// would be wrong (spec.md §4.D's exit loop deliberately walks past done
/// tasks).
pub(crate) fn transfer_to(t: &Task) -> Value {
    let current = runtime::current();

    runtime::host_gc().stack_bottom_hint(t.stack_top());
    runtime::host_gc().set_root_chain(t.gcstack_slot());
    runtime::set_current(t.clone());

    let old_ctx = current.context_mut_ptr();
    let new_ctx = t.context_ptr();

    // Safety: `old_ctx` belongs to the task we are suspending and stays
    // live for as long as that task exists; `new_ctx` was either built by
    // `Context::for_task` or previously populated by a `capture` of `t`'s
    // own suspension point, so it is safe to resume. `capture` returning
    // `false` means we are still on the way out; `true` means some later
    // `restore(old_ctx)` brought us back here, so we fall through instead
    // of re-entering `restore`.
    unsafe {
        if !context::capture(old_ctx) {
            context::restore(new_ctx);
        }
    }

    if let Some(exn) = runtime::take_exception_in_transit() {
        // The task we switched away from died by raising, and we
        // inherited the handler duty (spec.md §4.F "handler locality":
        // a child's handler defaults to its creator's). Re-raise in our
        // own context so it either lands in a `try_catch` we're inside
        // of, or keeps propagating further up.
        crate::raise::raise(exn);
    }

    runtime::take_arg_in_transit()
}

/// `yieldto` (spec.md §4.G): hand `args` to `t` and suspend the current
/// task until something transfers back into it.
///
/// If `t` has already finished, no switch happens at all (spec.md §4.E
/// precondition / §8 "Idempotence of done"): this just returns `t`'s
/// result, with the transit slot cleared as if a transfer had occurred.
///
/// # Errors
/// Returns [`TaskError::NotCurrent`] if `t` is already the current task —
/// there is no stack to switch away from and back to.
pub fn yieldto(t: &Task, args: Vec<Value>) -> Result<Value, TaskError> {
    let current = runtime::current();
    if *t == current {
        return Err(TaskError::NotCurrent);
    }
    if t.is_done() {
        return Ok(t.result().expect("a done task always has a result"));
    }
    runtime::set_arg_in_transit(Value::pack(args));
    Ok(transfer_to(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime;
    use crate::task::Task;

    #[test]
    fn values_round_trip_through_a_transfer() {
        runtime::init().expect("init");
        let t = Task::new(|arg| arg).expect("create");
        let got = yieldto(&t, vec![Value::host(42i32)]).expect("yield");
        match got {
            Value::Host(h) => assert_eq!(*h.downcast::<i32>().expect("i32"), 42),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn yielding_to_the_current_task_is_rejected() {
        runtime::init().expect("init");
        let here = runtime::current();
        let err = yieldto(&here, vec![]).expect_err("should reject");
        assert!(matches!(err, TaskError::NotCurrent));
    }

    #[test]
    fn yielding_to_a_done_task_returns_its_result_without_a_switch() {
        runtime::init().expect("init");
        let t = Task::new(|_| Value::host(42i32)).expect("create");
        let _ = yieldto(&t, vec![]).expect("run t to completion");
        assert!(t.is_done());

        let got = yieldto(&t, vec![Value::host(7i32)]).expect("done-task transfer");
        match got {
            Value::Host(h) => assert_eq!(*h.downcast::<i32>().expect("i32"), 42),
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
