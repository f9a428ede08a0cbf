use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use strand_loop::Handle;

use crate::cell::Cell;
use crate::chain::IntoPromise;
use crate::error::TimeoutError;
use crate::rejection::Rejection;
use crate::resolver::{Rejector, Resolver};

/// A handle to a value of type `T` that settles on a later turn of the
/// event loop.
///
/// Handles are cheap: cloning one yields another view onto the same
/// settlement record, so a clone observes exactly the state and outcome of
/// the original. Once settled — fulfilled with a `T` or rejected with a
/// [`Rejection`] — a promise never changes again.
///
/// Combinators ([`map`], [`and_then`], [`fail`], [`finally`], [`tap`],
/// [`delay`], [`timeout`]) each return a new promise linked to this one.
/// Their handlers are always dispatched through [`Handle::defer`], never
/// from the call stack that registered them, even when the upstream has
/// already settled. Registering a combinator therefore requires an entered
/// [`EventLoop`](strand_loop::EventLoop) on the current thread.
///
/// ```rust
/// use strand_loop::EventLoop;
/// use strand_promise::Promise;
///
/// let lp = EventLoop::new();
/// let _cx = lp.enter();
///
/// let p = Promise::new(|resolve, _reject| resolve.resolve(6));
/// let q = p.map(|n| n * 7);
/// assert_eq!(q.wait().ok(), Some(42));
/// ```
///
/// [`map`]: Promise::map
/// [`and_then`]: Promise::and_then
/// [`fail`]: Promise::fail
/// [`finally`]: Promise::finally
/// [`tap`]: Promise::tap
/// [`delay`]: Promise::delay
/// [`timeout`]: Promise::timeout
pub struct Promise<T> {
    pub(crate) cell: Rc<Cell<T>>,
}

/// Settle `downstream` with whatever `inner` settles with.
fn adopt<V: Clone + 'static>(inner: Promise<V>, downstream: Rc<Cell<V>>) {
    inner
        .cell
        .subscribe(Box::new(move |outcome| downstream.settle(outcome.clone())));
}

impl<T: 'static> Promise<T> {
    /// Run `producer` with the resolver pair of a fresh promise.
    ///
    /// The producer may settle synchronously or hand the capabilities to
    /// deferred work; only the first firing of either capability counts.
    pub fn new(producer: impl FnOnce(Resolver<T>, Rejector<T>)) -> Self {
        let (promise, resolver, rejector) = Self::make();
        producer(resolver, rejector);
        promise
    }

    /// Like [`Promise::new`], for producers that can fail before handing
    /// off: an `Err` return rejects the promise, unless the producer
    /// already settled it (the first settlement wins).
    pub fn try_new<E: Any>(
        producer: impl FnOnce(Resolver<T>, Rejector<T>) -> Result<(), E>,
    ) -> Self {
        let (promise, resolver, rejector) = Self::make();
        if let Err(error) = producer(resolver, rejector.clone()) {
            rejector.reject(error);
        }
        promise
    }

    /// A pending promise together with its detached resolver pair.
    pub fn make() -> (Self, Resolver<T>, Rejector<T>) {
        let cell = Cell::pending();
        let resolver = Resolver::new(Rc::clone(&cell));
        let rejector = Rejector::new(Rc::clone(&cell));
        (Self { cell }, resolver, rejector)
    }

    /// A promise already fulfilled with `value`.
    pub fn resolve(value: T) -> Self {
        Self {
            cell: Cell::settled(Ok(value)),
        }
    }

    /// A promise already rejected with `error`.
    pub fn reject<E: Any>(error: E) -> Self {
        Self {
            cell: Cell::settled(Err(Rejection::new(error))),
        }
    }

    /// True until the promise settles.
    pub fn is_pending(&self) -> bool {
        !self.cell.is_settled()
    }

    /// True once the promise has fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        self.cell.is_fulfilled()
    }

    /// True once the promise has rejected.
    pub fn is_rejected(&self) -> bool {
        self.cell.is_rejected()
    }

    /// True once the promise has settled either way.
    pub fn is_settled(&self) -> bool {
        self.cell.is_settled()
    }

    /// Non-blocking snapshot of the outcome.
    pub fn outcome(&self) -> Option<Result<T, Rejection>>
    where
        T: Clone,
    {
        self.cell.outcome()
    }

    /// Spin the current event loop until this promise settles, then return
    /// the outcome.
    ///
    /// This is the synchronization primitive of test code; it re-enters the
    /// loop driver, so calling it from inside a handler nests cleanly.
    ///
    /// # Panics
    ///
    /// Panics if the loop runs out of work before settlement, or if no loop
    /// is entered on this thread.
    pub fn wait(&self) -> Result<T, Rejection>
    where
        T: Clone,
    {
        let cell = Rc::clone(&self.cell);
        Handle::current().run_until(move || cell.is_settled());
        self.cell.outcome().expect("promise settled after run_until")
    }

    /// Map the fulfillment value through `on_fulfilled`.
    ///
    /// Rejections skip the handler and flow through unchanged. The handler
    /// runs on a later loop turn even if this promise is already settled.
    pub fn map<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        T: Clone,
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        let handle = Handle::current();
        let cell = Cell::pending();
        let downstream = Rc::clone(&cell);
        self.cell.subscribe(Box::new(move |outcome| {
            let outcome = outcome.clone();
            handle.defer(move || match outcome {
                Ok(value) => downstream.settle(Ok(on_fulfilled(value))),
                Err(rejection) => downstream.settle(Err(rejection)),
            });
        }));
        Promise { cell }
    }

    /// Chain a handler that itself produces a promise (or a `Result`).
    ///
    /// The returned promise adopts whatever the handler's promise settles
    /// with; an `Err` return rejects it. Rejections skip the handler.
    pub fn and_then<R, F>(&self, on_fulfilled: F) -> Promise<R::Value>
    where
        T: Clone,
        R: IntoPromise,
        R::Value: Clone,
        F: FnOnce(T) -> R + 'static,
    {
        let handle = Handle::current();
        let cell = Cell::pending();
        let downstream = Rc::clone(&cell);
        self.cell.subscribe(Box::new(move |outcome| {
            let outcome = outcome.clone();
            handle.defer(move || match outcome {
                Ok(value) => adopt(on_fulfilled(value).into_promise(), downstream),
                Err(rejection) => downstream.settle(Err(rejection)),
            });
        }));
        Promise { cell }
    }

    /// Chain a handler that observes the settlement whichever way it went.
    ///
    /// The single-handler equivalent of registering both a fulfillment and
    /// a rejection continuation.
    pub fn then<R, F>(&self, on_settled: F) -> Promise<R::Value>
    where
        T: Clone,
        R: IntoPromise,
        R::Value: Clone,
        F: FnOnce(Result<T, Rejection>) -> R + 'static,
    {
        let handle = Handle::current();
        let cell = Cell::pending();
        let downstream = Rc::clone(&cell);
        self.cell.subscribe(Box::new(move |outcome| {
            let outcome = outcome.clone();
            handle.defer(move || adopt(on_settled(outcome).into_promise(), downstream));
        }));
        Promise { cell }
    }

    /// Recover from a rejection whose payload matches type `E`.
    ///
    /// A matching handler's return value becomes the fulfillment of the
    /// returned promise; a mismatched rejection flows through untouched,
    /// and fulfillments always do. `E = Rejection` matches any rejection
    /// and is the catch-all form. See [`Rejection::downcast_ref`] for the
    /// matching rules, including [`Catchable`](crate::Catchable) chains.
    ///
    /// ```rust
    /// use strand_loop::EventLoop;
    /// use strand_promise::Promise;
    ///
    /// let lp = EventLoop::new();
    /// let _cx = lp.enter();
    ///
    /// let p: Promise<i32> = Promise::reject("offline".to_string());
    /// let q = p
    ///     .fail(|&code: &i32| code)          // skipped: wrong payload type
    ///     .fail(|msg: &String| msg.len() as i32);
    /// assert_eq!(q.wait().ok(), Some(7));
    /// ```
    pub fn fail<E, F>(&self, on_rejected: F) -> Promise<T>
    where
        T: Clone,
        E: Any,
        F: FnOnce(&E) -> T + 'static,
    {
        let handle = Handle::current();
        let cell = Cell::pending();
        let downstream = Rc::clone(&cell);
        self.cell.subscribe(Box::new(move |outcome| {
            let outcome = outcome.clone();
            handle.defer(move || match outcome {
                Ok(value) => downstream.settle(Ok(value)),
                Err(rejection) => {
                    let recovered = rejection.downcast_ref::<E>().map(on_rejected);
                    match recovered {
                        Some(value) => downstream.settle(Ok(value)),
                        None => downstream.settle(Err(rejection)),
                    }
                }
            });
        }));
        Promise { cell }
    }

    /// Like [`Promise::fail`], for recoveries that are themselves
    /// asynchronous: the handler returns a promise (adopted) or a `Result`
    /// (an `Err` re-rejects).
    pub fn fail_with<E, R, F>(&self, on_rejected: F) -> Promise<T>
    where
        T: Clone,
        E: Any,
        R: IntoPromise<Value = T>,
        F: FnOnce(&E) -> R + 'static,
    {
        let handle = Handle::current();
        let cell = Cell::pending();
        let downstream = Rc::clone(&cell);
        self.cell.subscribe(Box::new(move |outcome| {
            let outcome = outcome.clone();
            handle.defer(move || match outcome {
                Ok(value) => downstream.settle(Ok(value)),
                Err(rejection) => {
                    let recovered = rejection.downcast_ref::<E>().map(on_rejected);
                    match recovered {
                        Some(recovery) => adopt(recovery.into_promise(), downstream),
                        None => downstream.settle(Err(rejection)),
                    }
                }
            });
        }));
        Promise { cell }
    }

    /// Run `on_settled` whichever way this promise settles, preserving the
    /// outcome.
    ///
    /// The handler's return value is ignored, with two exceptions: an
    /// `Err`-shaped return rejects the result instead, and a returned
    /// promise delays propagation until it settles — overriding the
    /// outcome only if it rejects.
    pub fn finally<R, F>(&self, on_settled: F) -> Promise<T>
    where
        T: Clone,
        R: IntoPromise,
        F: FnOnce() -> R + 'static,
    {
        let handle = Handle::current();
        let cell = Cell::pending();
        let downstream = Rc::clone(&cell);
        self.cell.subscribe(Box::new(move |outcome| {
            let outcome = outcome.clone();
            handle.defer(move || {
                let cleanup = on_settled().into_promise();
                cleanup.cell.subscribe(Box::new(move |probe| match probe {
                    Ok(_) => downstream.settle(outcome),
                    Err(rejection) => downstream.settle(Err(rejection.clone())),
                }));
            });
        }));
        Promise { cell }
    }

    /// Observe the fulfillment value without affecting it.
    ///
    /// The handler only runs on fulfillment; rejections flow through
    /// without invoking it. Return handling matches [`Promise::finally`]:
    /// ignored unless it fails or delays.
    pub fn tap<R, F>(&self, on_value: F) -> Promise<T>
    where
        T: Clone,
        R: IntoPromise,
        F: FnOnce(&T) -> R + 'static,
    {
        let handle = Handle::current();
        let cell = Cell::pending();
        let downstream = Rc::clone(&cell);
        self.cell.subscribe(Box::new(move |outcome| {
            let outcome = outcome.clone();
            handle.defer(move || match outcome {
                Ok(value) => {
                    let probe = on_value(&value).into_promise();
                    probe.cell.subscribe(Box::new(move |cleanup| match cleanup {
                        Ok(_) => downstream.settle(Ok(value)),
                        Err(rejection) => downstream.settle(Err(rejection.clone())),
                    }));
                }
                Err(rejection) => downstream.settle(Err(rejection)),
            });
        }));
        Promise { cell }
    }

    /// Hold a fulfillment back for `delay` after the upstream fulfills.
    ///
    /// Rejections are not delayed: they propagate as soon as the upstream
    /// rejects.
    pub fn delay(&self, delay: Duration) -> Promise<T>
    where
        T: Clone,
    {
        let handle = Handle::current();
        let cell = Cell::pending();
        let downstream = Rc::clone(&cell);
        self.cell.subscribe(Box::new(move |outcome| match outcome.clone() {
            Ok(value) => handle.after(delay, move || downstream.settle(Ok(value))),
            Err(rejection) => downstream.settle(Err(rejection)),
        }));
        Promise { cell }
    }

    /// Race this promise against a timer.
    ///
    /// If the upstream settles first the timer firing is a no-op; if the
    /// timer wins, the returned promise rejects with [`TimeoutError`] and
    /// the upstream's eventual settlement is discarded. The upstream keeps
    /// running either way — a timeout does not cancel it.
    pub fn timeout(&self, limit: Duration) -> Promise<T>
    where
        T: Clone,
    {
        let handle = Handle::current();
        let cell = Cell::pending();

        let timer = Rc::clone(&cell);
        handle.after(limit, move || {
            timer.settle(Err(Rejection::from_error(TimeoutError::new(limit))));
        });

        let downstream = Rc::clone(&cell);
        self.cell
            .subscribe(Box::new(move |outcome| downstream.settle(outcome.clone())));
        Promise { cell }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.cell.is_fulfilled() {
            "fulfilled"
        } else if self.cell.is_rejected() {
            "rejected"
        } else {
            "pending"
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}
