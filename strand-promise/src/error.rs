use std::time::Duration;

use crate::rejection::Catchable;

/// The rejection produced when a [`timeout`] wins the race against its
/// upstream promise.
///
/// [`timeout`]: crate::Promise::timeout
#[derive(Debug, Clone, thiserror::Error)]
#[error("promise timed out after {limit:?}")]
pub struct TimeoutError {
    limit: Duration,
}

impl TimeoutError {
    pub(crate) fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// The configured limit that expired.
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl Catchable for TimeoutError {}
