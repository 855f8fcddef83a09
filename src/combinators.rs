//! Combinators composing many deferreds into one, and the delayed
//! constructors.
use crate::deferred::{Deferred, Resolution};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};
use tracing::trace;

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    /// Fulfills with every value, in input order, once all inputs have
    /// fulfilled. Rejects with the first rejection observed.
    ///
    /// An empty input fulfills right away with an empty `Vec`.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, EventLoop, Resolution};
    ///
    /// let rt = EventLoop::new();
    /// let all = rt.enter(|| {
    ///     Deferred::all(vec![
    ///         Resolution::Value(1),
    ///         Deferred::<i32, ()>::resolved(2).into(),
    ///     ])
    /// });
    /// assert_eq!(rt.block_on(all).unwrap(), Ok(vec![1, 2]));
    /// ```
    pub fn all<I>(items: I) -> Deferred<Vec<T>, E>
    where
        I: IntoIterator<Item = Resolution<T, E>>,
    {
        let items: Vec<_> = items.into_iter().collect();
        let total = items.len();
        let (resolver, all) = Deferred::channel();
        if total == 0 {
            resolver.fulfill(Vec::new());
            return all;
        }
        trace!(id = all.id(), total, "all registered");

        let slots: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; total]));
        let fulfilled = Rc::new(Cell::new(0usize));
        for (index, item) in items.into_iter().enumerate() {
            let slots = slots.clone();
            let fulfilled = fulfilled.clone();
            let on_value = resolver.clone();
            let on_reason = resolver.clone();
            Deferred::resolve(item).subscribe(
                move |value| {
                    slots.borrow_mut()[index] = Some(value);
                    fulfilled.set(fulfilled.get() + 1);
                    if fulfilled.get() == total {
                        let values = std::mem::take(&mut *slots.borrow_mut());
                        on_value.fulfill(values.into_iter().flatten().collect());
                    }
                },
                move |reason| on_reason.reject(reason),
            );
        }
        all
    }

    /// Settles like whichever input settles first, fulfilled or rejected.
    ///
    /// An empty input never settles.
    pub fn race<I>(items: I) -> Deferred<T, E>
    where
        I: IntoIterator<Item = Resolution<T, E>>,
    {
        let (resolver, race) = Deferred::channel();
        for item in items {
            let on_value = resolver.clone();
            let on_reason = resolver.clone();
            Deferred::resolve(item).subscribe(
                move |value| on_value.fulfill(value),
                move |reason| on_reason.reject(reason),
            );
        }
        race
    }

    /// Like [`Deferred::resolve`], but nothing happens until `delay` has
    /// passed. Adoption of a deferred input starts only then.
    pub fn resolve_delay(resolution: Resolution<T, E>, delay: Duration) -> Self {
        let (resolver, deferred) = Self::channel();
        deferred
            .scheduler()
            .after(delay, Box::new(move || resolver.resolve(resolution)));
        deferred
    }

    /// Like [`Deferred::rejected`], but rejects only after `delay`.
    pub fn reject_delay(reason: E, delay: Duration) -> Self {
        let (resolver, deferred) = Self::channel();
        deferred
            .scheduler()
            .after(delay, Box::new(move || resolver.reject(reason)));
        deferred
    }
}
