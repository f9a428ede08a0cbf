//! Typed, composable promises on a single-threaded cooperative event loop.
//!
//! A [`Promise<T>`] is a handle to a value that arrives on a later turn of a
//! [`strand_loop::EventLoop`]. Pipelines are built from combinators — value
//! mapping, chained asynchronous steps, typed failure recovery,
//! outcome-preserving cleanup, and timing constraints — with every handler
//! dispatched through the loop, never from the call that registered it.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use strand_loop::{Clock, EventLoop};
//! use strand_promise::{Promise, TimeoutError};
//!
//! let lp = EventLoop::with_clock(Clock::simulated());
//! let _cx = lp.enter();
//!
//! let answer = Promise::new(|resolve, _reject| {
//!     strand_loop::Handle::current().after(Duration::from_secs(3), move || {
//!         resolve.resolve(42);
//!     });
//! });
//!
//! let guarded = answer
//!     .timeout(Duration::from_secs(2))
//!     .fail(|e: &TimeoutError| {
//!         assert_eq!(e.limit(), Duration::from_secs(2));
//!         -1
//!     });
//! assert_eq!(guarded.wait().ok(), Some(-1));
//! ```
//!
//! Errors travel as [`Rejection`] carriers: any `'static` value can reject a
//! promise, and [`Promise::fail`] recovers it back at a concrete type —
//! optionally through a [`Catchable`] ancestor chain.
#![deny(missing_docs, missing_debug_implementations, rust_2018_idioms)]

mod cell;
mod chain;
mod error;
mod future;
mod promise;
mod rejection;
mod resolver;

#[cfg(test)]
mod tests;

pub use chain::IntoPromise;
pub use error::TimeoutError;
pub use future::PromiseFuture;
pub use promise::Promise;
pub use rejection::{Catchable, Rejection};
pub use resolver::{Rejector, Resolver};
