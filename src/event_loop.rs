//! A single-threaded event loop: a FIFO of deferred tasks plus a timer heap.
//!
//! Every thread owns a default loop, reachable through
//! [`EventLoop::current`]. Deferreds created outside of any
//! [`EventLoop::enter`] scope schedule their deliveries there.
use crate::{
    scheduler::{self, Scheduler, Task},
    Error,
};
use futures::task::noop_waker_ref;
use std::{
    cell::{Cell, RefCell},
    cmp::Ordering,
    collections::{BinaryHeap, VecDeque},
    fmt,
    future::{Future, IntoFuture},
    pin::pin,
    rc::Rc,
    task::{Context, Poll},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, trace, warn};

/// How an [`EventLoop`] measures time for [`Scheduler::after`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// Wall-clock time. An idle loop sleeps until the next timer is due.
    #[default]
    Real,
    /// Simulated time. An idle loop jumps straight to the next deadline.
    Virtual,
}

/// Builder for configuring and creating an [`EventLoop`].
///
/// # Examples
///
/// ```
/// use deferred::{Clock, EventLoop};
///
/// let rt = EventLoop::builder()
///     .clock(Clock::Virtual)
///     .max_turns(10_000)
///     .build();
/// assert!(rt.is_idle());
/// ```
#[derive(Debug, Clone)]
pub struct EventLoopBuilder {
    clock: Clock,
    max_turns: Option<usize>,
}

impl EventLoopBuilder {
    /// A real-time loop with no turn limit.
    pub fn new() -> Self {
        Self {
            clock: Clock::Real,
            max_turns: None,
        }
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Caps the number of turns a single `run` or `block_on` call may take.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn max_turns(mut self, n: usize) -> Self {
        assert!(n > 0, "max_turns must be > 0");

        self.max_turns = Some(n);
        self
    }

    pub fn build(self) -> EventLoop {
        EventLoop {
            shared: Rc::new(Shared {
                clock: self.clock,
                max_turns: self.max_turns,
                started: Instant::now(),
                virtual_now: Cell::new(Duration::ZERO),
                queue: RefCell::new(VecDeque::new()),
                timers: RefCell::new(BinaryHeap::new()),
                next_seq: Cell::new(0),
            }),
        }
    }
}

impl Default for EventLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct TimerEntry {
    deadline: Duration,
    seq: u64,
    task: Task,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

// Reversed so the max-heap pops the earliest deadline, then the oldest timer.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Shared {
    clock: Clock,
    max_turns: Option<usize>,
    started: Instant,
    virtual_now: Cell<Duration>,
    queue: RefCell<VecDeque<Task>>,
    timers: RefCell<BinaryHeap<TimerEntry>>,
    next_seq: Cell<u64>,
}

/// Handle to a single-threaded event loop. Clones share the same queues.
#[derive(Clone)]
pub struct EventLoop {
    shared: Rc<Shared>,
}

thread_local! {
    static DEFAULT: EventLoop = EventLoop::new();
}

impl EventLoop {
    pub fn builder() -> EventLoopBuilder {
        EventLoopBuilder::new()
    }

    /// A real-time loop with default settings.
    pub fn new() -> Self {
        EventLoopBuilder::new().build()
    }

    /// This thread's default loop.
    pub fn current() -> Self {
        DEFAULT.with(EventLoop::clone)
    }

    pub fn clock(&self) -> Clock {
        self.shared.clock
    }

    /// Time elapsed on this loop's clock since it was built.
    pub fn now(&self) -> Duration {
        match self.shared.clock {
            Clock::Real => self.shared.started.elapsed(),
            Clock::Virtual => self.shared.virtual_now.get(),
        }
    }

    /// `true` when no task is queued and no timer is armed.
    pub fn is_idle(&self) -> bool {
        self.shared.queue.borrow().is_empty() && self.shared.timers.borrow().is_empty()
    }

    /// Run `f` with this loop as the thread's current scheduler.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        scheduler::enter(Rc::new(self.clone()), f)
    }

    /// Run one task, advancing the clock to the next timer if nothing is
    /// ready. Returns `false` once the loop is idle.
    pub fn turn(&self) -> bool {
        self.enter(|| self.turn_entered())
    }

    /// Run until idle. Returns the number of turns taken.
    pub fn run(&self) -> Result<usize, Error> {
        self.enter(|| {
            debug!(clock = ?self.shared.clock, "event loop run started");
            let mut turns = 0;
            while self.turn_entered() {
                turns += 1;
                self.check_turns(turns)?;
            }
            debug!(turns, now = ?self.now(), "event loop run finished");
            Ok(turns)
        })
    }

    /// Drive the loop until `future` completes.
    ///
    /// Fails with [`Error::Stalled`] if the loop runs dry first, since no
    /// queued work is left that could complete it.
    pub fn block_on<F: IntoFuture>(&self, future: F) -> Result<F::Output, Error> {
        self.enter(|| {
            let mut future = pin!(future.into_future());
            let mut cx = Context::from_waker(noop_waker_ref());
            let mut turns = 0;
            loop {
                if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                    debug!(turns, "block_on completed");
                    return Ok(output);
                }
                // Only a turn that is about to run counts against the limit.
                self.check_turns(turns)?;
                if !self.turn_entered() {
                    warn!(turns, now = ?self.now(), "block_on stalled on an idle event loop");
                    return Err(Error::Stalled);
                }
                turns += 1;
            }
        })
    }

    fn check_turns(&self, turns: usize) -> Result<(), Error> {
        match self.shared.max_turns {
            Some(limit) if turns >= limit && !self.is_idle() => {
                warn!(limit, "event loop turn limit reached");
                Err(Error::TurnLimit { limit })
            }
            _ => Ok(()),
        }
    }

    fn turn_entered(&self) -> bool {
        loop {
            self.promote_due_timers();
            let task = self.shared.queue.borrow_mut().pop_front();
            if let Some(task) = task {
                task();
                return true;
            }
            let next = self.shared.timers.borrow().peek().map(|t| t.deadline);
            match next {
                Some(deadline) => self.advance_to(deadline),
                None => return false,
            }
        }
    }

    fn promote_due_timers(&self) {
        let now = self.now();
        let mut timers = self.shared.timers.borrow_mut();
        let mut queue = self.shared.queue.borrow_mut();
        while timers.peek().is_some_and(|t| t.deadline <= now) {
            if let Some(entry) = timers.pop() {
                queue.push_back(entry.task);
            }
        }
    }

    fn advance_to(&self, deadline: Duration) {
        let now = self.now();
        if deadline <= now {
            return;
        }
        debug!(from = ?now, to = ?deadline, "advancing clock to next timer");
        match self.shared.clock {
            Clock::Real => thread::sleep(deadline - now),
            Clock::Virtual => self.shared.virtual_now.set(deadline),
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for EventLoop {
    fn defer(&self, task: Task) {
        self.shared.queue.borrow_mut().push_back(task);
    }

    fn after(&self, delay: Duration, task: Task) {
        let seq = self.shared.next_seq.get();
        self.shared.next_seq.set(seq + 1);
        let deadline = self.now() + delay;
        trace!(?delay, ?deadline, seq, "timer armed");
        self.shared.timers.borrow_mut().push(TimerEntry {
            deadline,
            seq,
            task,
        });
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("clock", &self.shared.clock)
            .field("now", &self.now())
            .field("queued", &self.shared.queue.borrow().len())
            .field("timers", &self.shared.timers.borrow().len())
            .finish()
    }
}
