use std::any::Any;

use crate::Promise;

/// Conversion into a promise, used by every combinator that accepts a
/// handler's return value.
///
/// Three shapes of handler return are accepted:
///
/// - a [`Promise`] — the combinator's output adopts its settlement;
/// - a [`Result`] — `Ok` fulfills, `Err` rejects with the error as payload
///   (the `Result` rendition of a thrown exception);
/// - `()` — a side-effecting handler with nothing to contribute.
pub trait IntoPromise {
    /// Value type of the produced promise.
    type Value: 'static;

    /// Convert into a promise.
    fn into_promise(self) -> Promise<Self::Value>;
}

impl<T: 'static> IntoPromise for Promise<T> {
    type Value = T;

    fn into_promise(self) -> Promise<T> {
        self
    }
}

impl<T: 'static, E: Any> IntoPromise for Result<T, E> {
    type Value = T;

    fn into_promise(self) -> Promise<T> {
        match self {
            Ok(value) => Promise::resolve(value),
            Err(error) => Promise::reject(error),
        }
    }
}

impl IntoPromise for () {
    type Value = ();

    fn into_promise(self) -> Promise<()> {
        Promise::resolve(())
    }
}
