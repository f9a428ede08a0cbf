//! Typed rejection recovery: concrete matching, catch chains, catch-all.
use std::cell::RefCell;
use std::rc::Rc;

use crate::{Catchable, Promise, Rejection};

use super::{text, wait_message, wait_value, with_loop};

#[derive(Debug, thiserror::Error)]
#[error("bad input")]
struct BadInput;

impl Catchable for BadInput {}

#[derive(Debug, thiserror::Error)]
#[error("out of range: {what}")]
struct OutOfRange {
    what: String,
    #[source]
    parent: BadInput,
}

impl Catchable for OutOfRange {
    fn parent(&self) -> Option<&dyn Catchable> {
        Some(&self.parent)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("no route")]
struct NoRoute;

impl Catchable for NoRoute {}

fn out_of_range(what: &str) -> Rejection {
    Rejection::from_error(OutOfRange {
        what: what.into(),
        parent: BadInput,
    })
}

fn trail() -> (Rc<RefCell<String>>, impl Fn(&str) + Clone) {
    let seen = Rc::new(RefCell::new(String::new()));
    let push = {
        let seen = Rc::clone(&seen);
        move |part: &str| seen.borrow_mut().push_str(part)
    };
    (seen, push)
}

#[test]
fn fail_matches_the_concrete_type() {
    with_loop(|_| {
        let (seen, push) = trail();
        let p: Promise<i32> = Promise::reject(out_of_range("foo"));

        let a = push.clone();
        let b = push.clone();
        let c = push;
        let tail = p
            .fail(move |_: &NoRoute| {
                a("0");
                -1
            })
            .fail(move |e: &OutOfRange| {
                b(&format!("{}1", e.what));
                -1
            })
            .fail(move |_: &Rejection| {
                c("2");
                -1
            });

        assert_eq!(wait_value(&tail), Some(-1));
        assert_eq!(*seen.borrow(), "foo1");
    });
}

#[test]
fn fail_matches_an_ancestor_in_the_catch_chain() {
    with_loop(|_| {
        let (seen, push) = trail();
        let p: Promise<i32> = Promise::reject(out_of_range("foo"));

        let a = push.clone();
        let b = push.clone();
        let c = push;
        let tail = p
            .fail(move |_: &NoRoute| {
                a("0");
                -1
            })
            .fail(move |_: &BadInput| {
                b("1");
                -1
            })
            .fail(move |_: &Rejection| {
                c("2");
                -1
            });

        wait_value(&tail);
        assert_eq!(*seen.borrow(), "1");
    });
}

#[test]
fn catch_all_matches_any_rejection() {
    with_loop(|_| {
        let (seen, push) = trail();
        let p: Promise<i32> = Promise::reject(out_of_range("foo"));

        let a = push.clone();
        let b = push.clone();
        let c = push;
        let tail = p
            .fail(move |_: &NoRoute| {
                a("0");
                -1
            })
            .fail(move |_: &Rejection| {
                b("bar");
                -1
            })
            .fail(move |_: &BadInput| {
                c("2");
                -1
            });

        wait_value(&tail);
        assert_eq!(*seen.borrow(), "bar");
    });
}

#[test]
fn plain_payloads_do_not_chain() {
    with_loop(|_| {
        // Stored without `from_error`, so only the concrete type matches.
        let p: Promise<i32> = Promise::reject(OutOfRange {
            what: "foo".into(),
            parent: BadInput,
        });
        let q = p.clone().fail(|_: &BadInput| -1);
        assert!(q.wait().is_err());

        let r = p.fail(|e: &OutOfRange| e.what.len() as i32);
        assert_eq!(wait_value(&r), Some(3));
    });
}

#[test]
fn mismatch_passes_the_rejection_through() {
    with_loop(|_| {
        let p: Promise<i32> = Promise::reject(text("foo"));
        let q = p.fail(|_: &i32| -1);
        assert_eq!(wait_message(&q), Some(text("foo")));
        assert!(q.is_rejected());
    });
}

#[test]
fn fail_skips_fulfillments() {
    with_loop(|_| {
        let called = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&called);
        let p = Promise::resolve(3).fail(move |_: &String| {
            *flag.borrow_mut() = true;
            -1
        });
        assert_eq!(wait_value(&p), Some(3));
        assert!(!*called.borrow());
    });
}

#[test]
fn recovery_fulfills_downstream() {
    with_loop(|_| {
        let (seen, push) = trail();
        let p: Promise<i32> = Promise::reject(text("foo"));
        let later = push.clone();
        let tail = p.fail(|_: &String| 7).fail(move |_: &Rejection| {
            later("unreachable");
            -1
        });
        assert_eq!(wait_value(&tail), Some(7));
        assert!(seen.borrow().is_empty());
    });
}

#[test]
fn fail_with_adopts_a_recovery_promise() {
    with_loop(|_| {
        let p: Promise<i32> = Promise::reject(text("foo"));
        let q = p.fail_with(|_: &String| Promise::resolve(7));
        assert_eq!(wait_value(&q), Some(7));
    });
}

#[test]
fn fail_with_can_re_reject() {
    with_loop(|_| {
        let p: Promise<i32> = Promise::reject(text("foo"));
        let q = p.fail_with(|_: &String| Err::<i32, _>(text("again")));
        assert_eq!(wait_message(&q), Some(text("again")));
    });
}

#[test]
fn fail_with_passes_mismatches_through() {
    with_loop(|_| {
        let p: Promise<i32> = Promise::reject(text("foo"));
        let q = p.fail_with(|_: &NoRoute| Promise::resolve(0));
        assert_eq!(wait_message(&q), Some(text("foo")));
    });
}

#[test]
fn rethrown_rejection_stays_matchable() {
    with_loop(|_| {
        let p: Promise<i32> = Promise::reject(out_of_range("foo"));
        // Catch everything, re-reject with the same carrier.
        let q = p.then(|outcome: Result<i32, Rejection>| match outcome {
            Ok(n) => Ok(n),
            Err(rejection) => Err(rejection),
        });
        let r = q.fail(|e: &OutOfRange| e.what.len() as i32);
        assert_eq!(wait_value(&r), Some(3));
    });
}
