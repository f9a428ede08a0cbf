use std::cell::RefCell;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::cell::Cell;
use crate::rejection::Rejection;
use crate::Promise;

/// Awaitable view of a [`Promise`], produced by its [`IntoFuture`] impl.
///
/// Resolves to the promise's outcome. The settlement still happens on the
/// event loop; the future only parks the most recent waker and wakes it
/// when the cell settles.
pub struct PromiseFuture<T> {
    cell: Rc<Cell<T>>,
    waker: Rc<RefCell<Option<Waker>>>,
    registered: bool,
}

impl<T: Clone + 'static> Future for PromiseFuture<T> {
    type Output = Result<T, Rejection>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.cell.outcome() {
            return Poll::Ready(outcome);
        }
        *this.waker.borrow_mut() = Some(cx.waker().clone());
        if !this.registered {
            this.registered = true;
            let slot = Rc::clone(&this.waker);
            this.cell.subscribe(Box::new(move |_| {
                if let Some(waker) = slot.borrow_mut().take() {
                    waker.wake();
                }
            }));
        }
        Poll::Pending
    }
}

impl<T: Clone + 'static> IntoFuture for Promise<T> {
    type Output = Result<T, Rejection>;
    type IntoFuture = PromiseFuture<T>;

    fn into_future(self) -> PromiseFuture<T> {
        PromiseFuture {
            cell: self.cell,
            waker: Rc::new(RefCell::new(None)),
            registered: false,
        }
    }
}

impl<T> std::fmt::Debug for PromiseFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseFuture").finish()
    }
}
