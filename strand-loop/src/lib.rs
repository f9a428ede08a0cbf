//! A single-threaded cooperative event loop.
//!
//! [`EventLoop`] runs two kinds of work: *deferred jobs* ([`Handle::defer`]),
//! which execute on the next turn in FIFO order, and *one-shot timers*
//! ([`Handle::after`]), which execute once their deadline on the loop's
//! [`Clock`] has passed. Within a turn all deferred jobs drain before due
//! timers fire.
//!
//! The loop is driven by [`Handle::run_until`], which makes progress until a
//! predicate holds. With a simulated clock the driver jumps straight to the
//! next timer deadline when it runs out of immediate work, so timer-heavy
//! code can be tested deterministically:
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let lp = strand_loop::EventLoop::with_clock(strand_loop::Clock::simulated());
//! let fired = Rc::new(Cell::new(false));
//!
//! let seen = fired.clone();
//! lp.handle().after(Duration::from_secs(5), move || seen.set(true));
//! lp.run_until(|| fired.get());
//! assert_eq!(lp.clock().now_ms(), 5000);
//! ```

use std::cell::{Cell as StdCell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use log::trace;

mod clock;

pub use clock::Clock;

type Job = Box<dyn FnOnce()>;

thread_local! {
    /// Stack of entered loops; [`Handle::current`] resolves the innermost.
    static ENTERED: RefCell<Vec<Handle>> = const { RefCell::new(Vec::new()) };
}

/// A cooperative event loop bound to the thread that created it.
pub struct EventLoop {
    shared: Rc<Shared>,
}

struct Shared {
    queue: RefCell<VecDeque<Job>>,
    timers: RefCell<BinaryHeap<TimerEntry>>,
    timer_seq: StdCell<u64>,
    clock: Clock,
}

/// A one-shot timer; the heap yields the earliest `(deadline, seq)` first.
struct TimerEntry {
    deadline: u64,
    seq: u64,
    job: Job,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the earliest deadline, FIFO within it.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop").finish()
    }
}

impl EventLoop {
    /// Construct a loop over the system clock.
    pub fn new() -> Self {
        Self::with_clock(Clock::system())
    }

    /// Construct a loop over the given clock.
    pub fn with_clock(clock: Clock) -> Self {
        let shared = Shared {
            queue: RefCell::new(VecDeque::new()),
            timers: RefCell::new(BinaryHeap::new()),
            timer_seq: StdCell::new(0),
            clock,
        };
        Self {
            shared: Rc::new(shared),
        }
    }

    /// A cloneable handle onto this loop.
    pub fn handle(&self) -> Handle {
        Handle {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Install this loop as the thread's current loop.
    ///
    /// While the returned guard is alive, [`Handle::current`] resolves to
    /// this loop. Enters nest: entering a loop while another is current
    /// shadows the outer one until the new guard drops, so a scoped loop
    /// can run inside the span of another.
    pub fn enter(&self) -> EnterGuard {
        ENTERED.with(|stack| stack.borrow_mut().push(self.handle()));
        EnterGuard {
            shared: Rc::clone(&self.shared),
        }
    }

    /// The clock this loop schedules timers against.
    pub fn clock(&self) -> &Clock {
        &self.shared.clock
    }

    /// Drive the loop until `predicate` returns true. See [`Handle::run_until`].
    pub fn run_until(&self, predicate: impl FnMut() -> bool) {
        self.handle().run_until(predicate)
    }
}

/// Marks the span during which an [`EventLoop`] is the thread's current
/// loop; dropping it restores the previously entered loop, if any.
pub struct EnterGuard {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for EnterGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnterGuard").finish()
    }
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        ENTERED.with(|stack| {
            let top = stack.borrow_mut().pop();
            let own = top.is_some_and(|handle| Rc::ptr_eq(&handle.shared, &self.shared));
            if !own {
                panic!("event loop enter guards dropped out of order");
            }
        });
    }
}

/// Handle onto an [`EventLoop`]; the scheduling interface handed to
/// producers and continuations.
#[derive(Clone)]
pub struct Handle {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").finish()
    }
}

impl Handle {
    /// The handle of the innermost loop entered on this thread.
    ///
    /// # Panics
    ///
    /// Panics if no loop has been entered.
    pub fn current() -> Handle {
        Self::try_current().expect("no event loop entered on this thread")
    }

    /// Like [`Handle::current`], but `None` instead of panicking.
    pub fn try_current() -> Option<Handle> {
        ENTERED.with(|stack| stack.borrow().last().cloned())
    }

    /// Schedule `job` to run on the next turn of the loop.
    ///
    /// Jobs run in FIFO order, always ahead of due timers.
    pub fn defer(&self, job: impl FnOnce() + 'static) {
        let mut queue = self.shared.queue.borrow_mut();
        queue.push_back(Box::new(job));
        trace!("deferred job queued (depth={})", queue.len());
    }

    /// Schedule `job` to run once `delay` has elapsed on the loop clock.
    ///
    /// Timers with equal deadlines fire in registration order. Precision is
    /// coarse: deadlines are whole milliseconds.
    pub fn after(&self, delay: Duration, job: impl FnOnce() + 'static) {
        let deadline = self.shared.clock.now_ms() + delay.as_millis() as u64;
        let seq = self.shared.timer_seq.get();
        self.shared.timer_seq.set(seq + 1);
        trace!("timer armed (deadline={}ms seq={})", deadline, seq);
        self.shared.timers.borrow_mut().push(TimerEntry {
            deadline,
            seq,
            job: Box::new(job),
        });
    }

    /// The clock this loop schedules timers against.
    pub fn clock(&self) -> Clock {
        self.shared.clock.clone()
    }

    /// Drive the loop until `predicate` returns true.
    ///
    /// Each step runs one deferred job or one due timer; when neither is
    /// available the driver advances a simulated clock to the next deadline,
    /// or sleeps until it on the system clock. Re-entrant: a job may itself
    /// call `run_until` and the nested call keeps draining the same queues.
    ///
    /// # Panics
    ///
    /// Panics if the predicate is false and the loop has no queued work —
    /// the wait could never complete.
    pub fn run_until(&self, mut predicate: impl FnMut() -> bool) {
        while !predicate() {
            if !self.turn() {
                panic!("event loop out of work while waiting on a predicate");
            }
        }
    }

    /// Make one unit of progress. Returns false when nothing is scheduled.
    fn turn(&self) -> bool {
        let job = self.shared.queue.borrow_mut().pop_front();
        if let Some(job) = job {
            job();
            return true;
        }

        let now = self.shared.clock.now_ms();
        let due = {
            let mut timers = self.shared.timers.borrow_mut();
            match timers.peek() {
                Some(entry) if entry.deadline <= now => timers.pop(),
                _ => None,
            }
        };
        if let Some(entry) = due {
            trace!("timer fired (deadline={}ms seq={})", entry.deadline, entry.seq);
            (entry.job)();
            return true;
        }

        let next_deadline = self.shared.timers.borrow().peek().map(|e| e.deadline);
        let Some(deadline) = next_deadline else {
            return false;
        };
        if self.shared.clock.is_simulated() {
            trace!("advancing simulated clock to {}ms", deadline);
            self.shared.clock.advance_to(deadline);
        } else {
            std::thread::sleep(self.shared.clock.duration_until(deadline));
        }
        true
    }
}
