use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::rejection::Rejection;

/// A settlement outcome: the fulfillment value or the rejection carrier.
pub(crate) type Settled<T> = Result<T, Rejection>;

/// A callback queued against a cell, fired exactly once at settlement.
pub(crate) type Waiter<T> = Box<dyn FnOnce(&Settled<T>)>;

/// The shared record behind every promise handle and chain link.
///
/// A cell settles at most once: the first `settle` freezes the outcome and
/// drains the waiter list in registration order. Waiters run inline — chain
/// links decide for themselves whether to bounce through the event loop.
pub(crate) struct Cell<T> {
    inner: RefCell<Inner<T>>,
}

enum Inner<T> {
    Pending(Vec<Waiter<T>>),
    Settled(Settled<T>),
}

impl<T> Cell<T> {
    pub(crate) fn pending() -> Rc<Self> {
        Rc::new(Self {
            inner: RefCell::new(Inner::Pending(Vec::new())),
        })
    }

    pub(crate) fn settled(outcome: Settled<T>) -> Rc<Self> {
        Rc::new(Self {
            inner: RefCell::new(Inner::Settled(outcome)),
        })
    }

    /// Freeze the outcome and drain waiters; a no-op once settled.
    pub(crate) fn settle(&self, outcome: Settled<T>) {
        let waiters = {
            let mut inner = self.inner.borrow_mut();
            match &mut *inner {
                Inner::Settled(_) => return,
                Inner::Pending(waiters) => {
                    let waiters = std::mem::take(waiters);
                    trace!(
                        "promise {} ({} waiters)",
                        if outcome.is_ok() { "fulfilled" } else { "rejected" },
                        waiters.len()
                    );
                    *inner = Inner::Settled(outcome);
                    waiters
                }
            }
        };

        let inner = self.inner.borrow();
        let Inner::Settled(outcome) = &*inner else {
            unreachable!("cell settled above");
        };
        for waiter in waiters {
            waiter(outcome);
        }
    }

    /// Queue `waiter`, or fire it immediately if the cell has settled.
    pub(crate) fn subscribe(&self, waiter: Waiter<T>) {
        {
            let mut inner = self.inner.borrow_mut();
            if let Inner::Pending(waiters) = &mut *inner {
                waiters.push(waiter);
                return;
            }
        }
        let inner = self.inner.borrow();
        let Inner::Settled(outcome) = &*inner else {
            unreachable!("cell checked settled above");
        };
        waiter(outcome);
    }

    pub(crate) fn is_settled(&self) -> bool {
        matches!(&*self.inner.borrow(), Inner::Settled(_))
    }

    pub(crate) fn is_fulfilled(&self) -> bool {
        matches!(&*self.inner.borrow(), Inner::Settled(Ok(_)))
    }

    pub(crate) fn is_rejected(&self) -> bool {
        matches!(&*self.inner.borrow(), Inner::Settled(Err(_)))
    }

    /// Snapshot of the outcome, if settled.
    pub(crate) fn outcome(&self) -> Option<Settled<T>>
    where
        T: Clone,
    {
        match &*self.inner.borrow() {
            Inner::Pending(_) => None,
            Inner::Settled(outcome) => Some(outcome.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn settlement_is_write_once() {
        let cell: Rc<Cell<i32>> = Cell::pending();
        cell.settle(Ok(1));
        cell.settle(Ok(2));
        cell.settle(Err(Rejection::new("late")));
        assert_eq!(cell.outcome().unwrap().ok(), Some(1));
    }

    #[test]
    fn waiters_drain_in_registration_order() {
        let cell: Rc<Cell<i32>> = Cell::pending();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..4 {
            let order = Rc::clone(&order);
            cell.subscribe(Box::new(move |_| order.borrow_mut().push(tag)));
        }
        cell.settle(Ok(0));
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn late_subscription_fires_at_once() {
        let cell: Rc<Cell<i32>> = Cell::pending();
        cell.settle(Ok(9));
        let seen = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        cell.subscribe(Box::new(move |outcome| {
            *slot.borrow_mut() = outcome.as_ref().ok().copied();
        }));
        assert_eq!(*seen.borrow(), Some(9));
    }

    #[test]
    fn waiters_fire_exactly_once() {
        let cell: Rc<Cell<i32>> = Cell::pending();
        let count = Rc::new(RefCell::new(0));
        let slot = Rc::clone(&count);
        cell.subscribe(Box::new(move |_| *slot.borrow_mut() += 1));
        cell.settle(Ok(1));
        cell.settle(Ok(2));
        assert_eq!(*count.borrow(), 1);
    }
}
