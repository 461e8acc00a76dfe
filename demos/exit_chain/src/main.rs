//! Exit-chain collapse (spec.md §8 end-to-end scenario 2): a task that
//! creates a child, hands control to it, and lets the child's normal
//! completion fall all the way back through two generations to root.

use std::cell::RefCell;
use std::rc::Rc;

use symtask::{init, yieldto, Task, Value};

fn as_i32(v: Value) -> i32 {
    match v {
        Value::Host(h) => *h.downcast::<i32>().expect("i32 payload"),
        other => panic!("expected an i32, got {other:?}"),
    }
}

fn main() {
    env_logger::init();
    init().expect("symtask supports this platform");

    let p2_slot: Rc<RefCell<Option<Task>>> = Rc::new(RefCell::new(None));
    let p2_slot_for_p1 = p2_slot.clone();

    let p1 = Task::new(move |_| {
        let p2 = Task::new(|_| Value::host(7i32)).expect("allocate p2");
        *p2_slot_for_p1.borrow_mut() = Some(p2.clone());
        yieldto(&p2, vec![]).expect("yield to p2")
    })
    .expect("allocate p1");

    let got = as_i32(yieldto(&p1, vec![]).expect("yield to p1"));
    assert_eq!(got, 7);

    let p2 = p2_slot.borrow().clone().expect("p1 created p2 before exiting");
    assert!(p2.is_done());
    assert!(p1.is_done());

    println!("root observed = {got}");
    println!("p2.done = {}", p2.is_done());
    println!("p1.done = {}", p1.is_done());
}
