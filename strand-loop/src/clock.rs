use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Millisecond-tick clock backing the loop's timers.
///
/// A clock is anchored at its creation instant; ticks count whole
/// milliseconds since that anchor. The simulated source never reads wall
/// time and only moves when [`Clock::advance`] (or the loop driver) pushes
/// it forward.
#[derive(Debug, Clone)]
pub struct Clock {
    origin: Instant,
    source: Source,
}

#[derive(Debug, Clone)]
enum Source {
    System,
    Simulated { offset: Rc<Cell<Duration>> },
}

impl Clock {
    /// A clock that follows wall time.
    pub fn system() -> Self {
        Self {
            origin: Instant::now(),
            source: Source::System,
        }
    }

    /// A clock under manual control, starting at tick zero.
    pub fn simulated() -> Self {
        Self {
            origin: Instant::now(),
            source: Source::Simulated {
                offset: Rc::new(Cell::new(Duration::ZERO)),
            },
        }
    }

    /// Current tick in milliseconds since the clock was created.
    pub fn now_ms(&self) -> u64 {
        let elapsed = match &self.source {
            Source::System => self.origin.elapsed(),
            Source::Simulated { offset } => offset.get(),
        };
        let ms = elapsed.as_millis();
        ms.try_into().expect("clock ran past u64 milliseconds")
    }

    /// Whether this clock only moves when advanced.
    pub fn is_simulated(&self) -> bool {
        matches!(self.source, Source::Simulated { .. })
    }

    /// Advances simulated time.
    ///
    /// # Panics
    ///
    /// Panics on a system clock.
    pub fn advance(&self, duration: Duration) {
        match &self.source {
            Source::System => panic!("cannot advance the system clock"),
            Source::Simulated { offset } => offset.set(offset.get() + duration),
        }
    }

    /// Jump a simulated clock forward to `tick`; no-op if already past it.
    pub(crate) fn advance_to(&self, tick: u64) {
        let now = self.now_ms();
        if tick > now {
            self.advance(Duration::from_millis(tick - now));
        }
    }

    /// Time remaining until `tick` on this clock, zero if already due.
    pub(crate) fn duration_until(&self, tick: u64) -> Duration {
        Duration::from_millis(tick.saturating_sub(self.now_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_starts_at_zero() {
        let clock = Clock::simulated();
        assert_eq!(clock.now_ms(), 0);
        assert!(clock.is_simulated());
    }

    #[test]
    fn advance_moves_simulated_time() {
        let clock = Clock::simulated();
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_ms(), 250);
        clock.advance_to(1000);
        assert_eq!(clock.now_ms(), 1000);
        // advance_to never rewinds
        clock.advance_to(500);
        assert_eq!(clock.now_ms(), 1000);
    }

    #[test]
    fn clones_share_the_offset() {
        let clock = Clock::simulated();
        let view = clock.clone();
        clock.advance(Duration::from_millis(10));
        assert_eq!(view.now_ms(), 10);
    }

    #[test]
    #[should_panic(expected = "cannot advance the system clock")]
    fn system_clock_cannot_be_advanced() {
        Clock::system().advance(Duration::from_millis(1));
    }

    #[test]
    fn system_clock_moves_on_its_own() {
        let clock = Clock::system();
        let first = clock.now_ms();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now_ms() >= first);
    }
}
