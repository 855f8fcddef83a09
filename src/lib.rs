//! A single-threaded deferred value with promise-style chaining.
//!
//! A [`Deferred`] is settled exactly once by its producer, either fulfilled
//! with a value or rejected with a reason. Consumers register reactions with
//! [`Deferred::then`] and friends before or after settlement; delivery always
//! happens later, on the [`Scheduler`] that was current when the deferred
//! was created.
//!
//! # Examples
//!
//! ```
//! use deferred::{Deferred, EventLoop, Resolution};
//!
//! let rt = EventLoop::builder().build();
//! let answer = rt.enter(|| {
//!     Deferred::<i32, String>::new(|fulfill, _reject| {
//!         fulfill(20);
//!         Ok(())
//!     })
//!     .then(|v| Ok(Resolution::Value(v * 2)))
//!     .map(|v| v + 2)
//! });
//! assert_eq!(rt.block_on(answer).unwrap(), Ok(42));
//! ```
pub mod chain;
pub mod combinators;
pub mod deferred;
pub mod event_loop;
pub mod future;
mod reaction;
pub mod scheduler;

pub use deferred::{Deferred, Fulfill, Reject, Resolution, Resolver, State};
pub use event_loop::{Clock, EventLoop, EventLoopBuilder};
pub use future::Settled;
pub use scheduler::{Scheduler, Task};

use thiserror::Error;

/// Failures of the machinery driving deferreds. Rejections are never
/// reported here; they travel as the `E` of a [`Deferred`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("event loop went idle before the awaited value settled")]
    Stalled,
    #[error("event loop exceeded its limit of {limit} turns")]
    TurnLimit { limit: usize },
}
