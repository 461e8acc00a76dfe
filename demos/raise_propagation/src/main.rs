//! Raise propagation (spec.md §8 end-to-end scenario 4): root installs a
//! handler, creates a task P, which creates a task Q, which raises. The
//! exception should surface in root's handler, and Q alone should be left
//! terminal with the exception as its result — a raise inherits its
//! handler from the task's creator, not from who happens to be calling it.

use std::cell::RefCell;
use std::rc::Rc;

use symtask::{init, raise, try_catch, yieldto, Task, Value};

fn as_str(v: &Value) -> &'static str {
    match v {
        Value::Host(h) => *h.downcast_ref::<&'static str>().expect("str payload"),
        other => panic!("expected a string, got {other:?}"),
    }
}

fn main() {
    env_logger::init();
    init().expect("symtask supports this platform");

    let q_slot: Rc<RefCell<Option<Task>>> = Rc::new(RefCell::new(None));
    let q_slot_for_p = q_slot.clone();

    let outcome = try_catch(|| {
        let p = Task::new(move |_| {
            let q = Task::new(|_| raise(Value::host("boom"))).expect("allocate q");
            *q_slot_for_p.borrow_mut() = Some(q.clone());
            yieldto(&q, vec![]).expect("yield to q")
        })
        .expect("allocate p");

        yieldto(&p, vec![]).expect("yield to p")
    });

    let exn = outcome.expect_err("root's handler should have caught the raise");
    assert_eq!(as_str(&exn), "boom");
    println!("root caught: {}", as_str(&exn));

    let q = q_slot.borrow().clone().expect("p created q before q raised");
    assert!(q.is_done());
    let q_result = q.result().expect("a done task always has a result");
    assert_eq!(as_str(&q_result), "boom");

    println!("q.done = {}", q.is_done());
    println!("q.result = {}", as_str(&q_result));
}
