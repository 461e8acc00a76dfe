//! The task object and its lifecycle (spec.md §3 Data Model, §4.D).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::TaskError;
use crate::gc::RootChainHead;
use crate::runtime;
use crate::stack::{self, Stack};
use crate::value::Value;

/// A suspendable computation with its own stack and saved machine
/// context (Glossary). Cheap to clone — it's a reference-counted handle
/// over shared, single-threaded state; spec.md §5 notes these slots are
/// "safe precisely because only the current task reads or writes them",
/// which is exactly the invariant `Rc`/`RefCell` (rather than `Arc`/
/// `Mutex`) encode here.
pub struct Task(pub(crate) Rc<TaskInner>);

impl Clone for Task {
    fn clone(&self) -> Self {
        Task(Rc::clone(&self.0))
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("done", &self.is_done())
            .field("ptr", &Rc::as_ptr(&self.0))
            .finish()
    }
}

pub(crate) struct TaskInner {
    /// `None` only for the root task, which adopts the host thread's
    /// native stack rather than owning an allocated one (spec.md §3
    /// "Root task").
    stack: Option<Stack>,
    pub(crate) context: RefCell<Context>,
    done: Cell<bool>,
    result: RefCell<Option<Value>>,
    start: RefCell<Option<Box<dyn FnOnce(Value) -> Value>>>,
    on_exit: Option<Task>,
    pub(crate) state: TaskState,
}

/// The per-task runtime slots of spec.md §3: the current exception
/// handler task, its installed resume context, and the per-task GC root
/// chain head. Per-task host payload (stream handles, etc.) is left to
/// the host to stash inside the `Value`s it passes through `start` and
/// `yieldto` — the runtime doesn't need a dedicated slot for it, since it
/// never reads that payload either way.
pub(crate) struct TaskState {
    pub(crate) eh_task: RefCell<Option<Task>>,
    pub(crate) eh_ctx: RefCell<Option<Context>>,
    pub(crate) gcstack: Cell<RootChainHead>,
}

impl TaskState {
    fn inherited_from(parent: &TaskState) -> Self {
        // A new task inherits its creator's current exception handler
        // (spec.md §4.D step 3 / §8 "handler locality"), but not the
        // creator's installed resume point — that point lives on the
        // creator's own stack and makes no sense to hand to a child.
        TaskState {
            eh_task: RefCell::new(parent.eh_task.borrow().clone()),
            eh_ctx: RefCell::new(None),
            gcstack: Cell::new(std::ptr::null_mut()),
        }
    }

    fn fresh_root() -> Self {
        TaskState {
            eh_task: RefCell::new(None),
            eh_ctx: RefCell::new(None),
            gcstack: Cell::new(std::ptr::null_mut()),
        }
    }
}

impl Task {
    /// Create a task with the default stack size (spec.md §6
    /// `DEFAULT_STACK`).
    pub fn new(start: impl FnOnce(Value) -> Value + 'static) -> Result<Task, TaskError> {
        Task::with_stack_size(start, stack::default_stack())
    }

    /// Create a task with an explicit stack size (spec.md §4.G
    /// `Task(fn, ssize)`).
    pub fn with_stack_size(
        start: impl FnOnce(Value) -> Value + 'static,
        ssize: usize,
    ) -> Result<Task, TaskError> {
        runtime::ensure_initialized()?;
        let min = stack::min_stack();
        if ssize < min {
            return Err(TaskError::StackTooSmall {
                requested: ssize,
                minimum: min,
            });
        }

        let current = runtime::current();
        let stack = Stack::allocate(ssize)?;
        let stack_top = stack.top();

        let inner = Rc::new(TaskInner {
            stack: Some(stack),
            context: RefCell::new(Context::default()),
            done: Cell::new(false),
            result: RefCell::new(None),
            start: RefCell::new(Some(Box::new(start))),
            on_exit: Some(current.clone()),
            state: TaskState::inherited_from(&current.0.state),
        });

        let ctx = Context::for_task(stack_top, task_trampoline);
        *inner.context.borrow_mut() = ctx;

        Ok(Task(inner))
    }

    /// `task_done` (spec.md §4.G). Monotonic: once `true`, always `true`
    /// (spec.md §3 invariant 3, §8 law).
    pub fn is_done(&self) -> bool {
        self.0.done.get()
    }

    /// The value this task finished with — its return value, or the
    /// exception that killed it (spec.md §3 `result`). `None` while the
    /// task is still running.
    pub fn result(&self) -> Option<Value> {
        self.0.result.borrow().clone()
    }

    pub(crate) fn finish(&self, result: Value) {
        debug_assert!(!self.0.done.get(), "a task can only finish once");
        *self.0.result.borrow_mut() = Some(result);
        self.0.done.set(true);
    }

    pub(crate) fn on_exit(&self) -> Option<Task> {
        self.0.on_exit.clone()
    }

    pub(crate) fn take_start(&self) -> Box<dyn FnOnce(Value) -> Value> {
        self.0
            .start
            .borrow_mut()
            .take()
            .expect("a task's body runs exactly once")
    }

    pub(crate) fn context_mut_ptr(&self) -> *mut Context {
        self.0.context.as_ptr()
    }

    pub(crate) fn context_ptr(&self) -> *const Context {
        self.0.context.as_ptr()
    }

    /// Highest address of this task's stack — `null` for the root task,
    /// which has no allocated `Stack` of its own.
    pub(crate) fn stack_top(&self) -> *mut u8 {
        self.0
            .stack
            .as_ref()
            .map(Stack::top)
            .unwrap_or(std::ptr::null_mut())
    }

    pub(crate) fn gcstack_slot(&self) -> RootChainHead {
        self.0.state.gcstack.get()
    }

    pub(crate) fn eh_task(&self) -> Option<Task> {
        self.0.state.eh_task.borrow().clone()
    }

    pub(crate) fn set_eh_task(&self, t: Option<Task>) {
        *self.0.state.eh_task.borrow_mut() = t;
    }

    pub(crate) fn eh_ctx(&self) -> Option<Context> {
        *self.0.state.eh_ctx.borrow()
    }

    pub(crate) fn set_eh_ctx(&self, ctx: Option<Context>) {
        *self.0.state.eh_ctx.borrow_mut() = ctx;
    }
}

/// Walk an `on_exit` chain forward past any already-finished tasks,
/// landing on the nearest still-live one (spec.md §4.D: "control flows
/// further up the chain, ultimately reaching the root task"). Shared by
/// a task's own normal-exit handoff and by an unhandled `raise` looking
/// for somewhere to deliver an exception.
pub(crate) fn first_live(mut t: Task) -> Task {
    while t.is_done() {
        t = t
            .on_exit()
            .expect("the root task never finishes, so this chain always terminates");
    }
    t
}

/// Construct the root task, adopting the calling OS thread's own stack
/// (spec.md §3 "Root task"): its own `on_exit` chain has nowhere further
/// to go (`None`, not the original's self-cycle — see SPEC_FULL.md §3),
/// and it never finishes.
pub(crate) fn new_root() -> Task {
    let inner = Rc::new(TaskInner {
        stack: None,
        context: RefCell::new(Context::default()),
        done: Cell::new(false),
        result: RefCell::new(None),
        start: RefCell::new(None),
        on_exit: None,
        state: TaskState::fresh_root(),
    });
    Task(inner)
}

/// Runs on the first resume of a freshly created task, on its own stack
/// (spec.md §4.D "Task body").
extern "C" fn task_trampoline() -> ! {
    let current = runtime::current();
    let arg = runtime::take_arg_in_transit();
    let start = current.take_start();
    let result = start(arg);
    current.finish(result.clone());

    // "The loop ensures that when a task exits into a parent that has
    // already died, control flows further up the chain, ultimately
    // reaching the root task" (spec.md §4.D).
    let parent = current
        .on_exit()
        .expect("a freshly created task always has an on_exit parent");
    let target = first_live(parent);
    crate::transfer::transfer_to(&target);
    unreachable!("a finished task was resumed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{runtime, yieldto};

    fn with_runtime<R>(f: impl FnOnce() -> R) -> R {
        runtime::init().expect("init");
        f()
    }

    #[test]
    fn new_task_is_not_done_until_it_returns() {
        with_runtime(|| {
            let t = Task::new(|_| Value::Unit).expect("create");
            assert!(!t.is_done());
            let _ = yieldto(&t, vec![]);
            assert!(t.is_done());
        });
    }

    #[test]
    fn rejects_stacks_smaller_than_the_minimum() {
        with_runtime(|| {
            let err = Task::with_stack_size(|_| Value::Unit, stack::min_stack() - 1)
                .expect_err("should reject");
            assert!(matches!(err, TaskError::StackTooSmall { .. }));
        });
    }
}
