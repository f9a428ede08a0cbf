use std::cell::RefCell;
use std::rc::Rc;

use strand_loop::{Clock, EventLoop};

use crate::Promise;

mod fail;

/// Run `f` with an entered loop over the system clock.
pub(crate) fn with_loop<R>(f: impl FnOnce(&EventLoop) -> R) -> R {
    let lp = EventLoop::new();
    let _cx = lp.enter();
    f(&lp)
}

/// Run `f` with an entered loop over a simulated clock; timer-driven tests
/// stay deterministic because the driver jumps between deadlines.
pub(crate) fn with_simulated_loop<R>(f: impl FnOnce(&EventLoop) -> R) -> R {
    let lp = EventLoop::with_clock(Clock::simulated());
    let _cx = lp.enter();
    f(&lp)
}

/// Drive the loop until `p` settles and return its fulfillment value.
pub(crate) fn wait_value<T: Clone + 'static>(p: &Promise<T>) -> Option<T> {
    p.wait().ok()
}

/// Drive the loop until `p` settles and return its `String` rejection
/// payload, if that is how it rejected.
pub(crate) fn wait_message<T: Clone + 'static>(p: &Promise<T>) -> Option<String> {
    p.wait()
        .err()
        .and_then(|rejection| rejection.downcast_ref::<String>().cloned())
}

/// A shared side-effect journal plus a recorder closure for it.
pub(crate) fn journal() -> (Rc<RefCell<Vec<i64>>>, impl Fn(i64) + Clone) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = {
        let seen = Rc::clone(&seen);
        move |entry| seen.borrow_mut().push(entry)
    };
    (seen, record)
}

/// Shorthand for rejecting with an owned string payload.
pub(crate) fn text(msg: &str) -> String {
    msg.to_string()
}
