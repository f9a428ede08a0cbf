use std::any::Any;
use std::rc::Rc;

use crate::cell::Cell;
use crate::rejection::Rejection;

/// The fulfillment capability of a promise.
///
/// Cloneable and write-once: the first firing of either half of the pair
/// settles the promise, every later call is a no-op.
pub struct Resolver<T> {
    cell: Rc<Cell<T>>,
}

/// The rejection capability of a promise.
///
/// Accepts any `'static` payload; see [`Rejection`] for how typed handlers
/// match it later. Write-once alongside its [`Resolver`].
pub struct Rejector<T> {
    cell: Rc<Cell<T>>,
}

impl<T: 'static> Resolver<T> {
    pub(crate) fn new(cell: Rc<Cell<T>>) -> Self {
        Self { cell }
    }

    /// Fulfill the promise with `value`.
    pub fn resolve(&self, value: T) {
        self.cell.settle(Ok(value));
    }
}

impl<T: 'static> Rejector<T> {
    pub(crate) fn new(cell: Rc<Cell<T>>) -> Self {
        Self { cell }
    }

    /// Reject the promise with `error`.
    ///
    /// Pass a [`Rejection`] (for example from [`Rejection::from_error`]) to
    /// keep a catch chain attached; any other payload matches only its
    /// concrete type.
    pub fn reject<E: Any>(&self, error: E) {
        self.cell.settle(Err(Rejection::new(error)));
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> Clone for Rejector<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish()
    }
}

impl<T> std::fmt::Debug for Rejector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejector").finish()
    }
}
