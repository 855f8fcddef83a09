//! Awaiting a [`Deferred`] from `async` code.
//!
//! Converting a deferred into a future registers one reaction; the future
//! completes with `Ok(value)` or `Err(reason)` once that reaction is
//! delivered by the event loop.
use crate::Deferred;
use std::{
    cell::RefCell,
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

struct Slot<T, E> {
    value: Option<Result<T, E>>,
    wakers: Vec<Waker>,
}

/// Future returned by [`Deferred::settled`] and `Deferred::into_future`.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, EventLoop};
///
/// let rt = EventLoop::new();
/// let sum = rt.block_on(async {
///     let a = Deferred::<i32, ()>::resolved(1).await?;
///     let b = Deferred::<i32, ()>::resolved(2).await?;
///     Ok::<_, ()>(a + b)
/// });
/// assert_eq!(sum.unwrap(), Ok(3));
/// ```
pub struct Settled<T, E> {
    slot: Rc<RefCell<Slot<T, E>>>,
}

impl<T, E> fmt::Debug for Settled<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Settled")
            .field("ready", &slot.value.is_some())
            .field("wakers", &slot.wakers.len())
            .finish()
    }
}

fn complete<T, E>(slot: &Rc<RefCell<Slot<T, E>>>, value: Result<T, E>) {
    let wakers = {
        let mut slot = slot.borrow_mut();
        slot.value = Some(value);
        std::mem::take(&mut slot.wakers)
    };
    for waker in wakers {
        waker.wake()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    /// A future for this deferred's outcome that leaves the handle usable.
    pub fn settled(&self) -> Settled<T, E> {
        self.clone().into_future()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> IntoFuture for Deferred<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = Settled<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        let slot = Rc::new(RefCell::new(Slot {
            value: None,
            wakers: Vec::new(),
        }));
        let on_value = slot.clone();
        let on_reason = slot.clone();
        self.subscribe(
            move |value| complete(&on_value, Ok(value)),
            move |reason| complete(&on_reason, Err(reason)),
        );
        Settled { slot }
    }
}

impl<T, E> Future for Settled<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
