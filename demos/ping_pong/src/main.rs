//! Ping-pong (spec.md §8 end-to-end scenario 1): a task that hands a
//! number back to its parent, gets one back, adds one, and repeats.

use symtask::{current_task, init, yieldto, Task, Value};

fn as_i32(v: Value) -> i32 {
    match v {
        Value::Host(h) => *h.downcast::<i32>().expect("i32 payload"),
        other => panic!("expected an i32, got {other:?}"),
    }
}

fn main() {
    env_logger::init();
    init().expect("symtask supports this platform");

    let parent = current_task();
    let p = Task::new(move |_first_arg| {
        let bounced = as_i32(yieldto(&parent, vec![Value::host(1i32)]).expect("yield to parent"));
        Value::host(bounced + 1)
    })
    .expect("allocate task");

    let a = as_i32(yieldto(&p, vec![]).expect("first yield into p"));
    assert_eq!(a, 1);
    println!("a = {a}");

    let b = as_i32(yieldto(&p, vec![Value::host(10i32)]).expect("second yield into p"));
    assert_eq!(b, 11);
    println!("b = {b}");

    assert!(p.is_done());
    println!("p.done = {}", p.is_done());
}
