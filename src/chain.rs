//! The chaining operator: every registration returns a new deferred settled
//! from the handler's result.
use crate::{
    deferred::{Deferred, Resolution},
    reaction,
};

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    /// Register both handlers. The derived deferred settles from whichever
    /// one runs: `Ok(Value)` fulfills, `Ok(Deferred)` is adopted, `Err`
    /// rejects.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, EventLoop, Resolution};
    ///
    /// let rt = EventLoop::new();
    /// let recovered = rt.enter(|| {
    ///     Deferred::<i32, &str>::rejected("offline").then_with(
    ///         |v| Ok::<_, String>(Resolution::Value(v)),
    ///         |e| Ok(Resolution::Value(e.len() as i32)),
    ///     )
    /// });
    /// assert_eq!(rt.block_on(recovered).unwrap(), Ok(7));
    /// ```
    pub fn then_with<U, E2, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Deferred<U, E2>
    where
        U: Clone + 'static,
        E2: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E2>, E2> + 'static,
        R: FnOnce(E) -> Result<Resolution<U, E2>, E2> + 'static,
    {
        let (resolver, derived) = Deferred::channel();
        let on_reason = resolver.clone();
        self.subscribe(
            move |value| reaction::handle(on_fulfilled, value, &resolver),
            move |reason| reaction::handle(on_rejected, reason, &on_reason),
        );
        derived
    }

    /// Register a fulfillment handler. Rejections pass through untouched.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
    {
        self.then_with(on_fulfilled, |reason| Err(reason))
    }

    /// Register a rejection handler. Values pass through untouched.
    pub fn catch<E2, R>(&self, on_rejected: R) -> Deferred<T, E2>
    where
        E2: Clone + 'static,
        R: FnOnce(E) -> Result<Resolution<T, E2>, E2> + 'static,
    {
        self.then_with(|value| Ok(Resolution::Value(value)), on_rejected)
    }

    pub fn map<U, F>(&self, f: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Ok(Resolution::Value(f(value))))
    }

    pub fn map_err<E2, F>(&self, f: F) -> Deferred<T, E2>
    where
        E2: Clone + 'static,
        F: FnOnce(E) -> E2 + 'static,
    {
        self.catch(move |reason| Err(f(reason)))
    }

    /// Chain a step that itself completes later.
    pub fn and_then<U, F>(&self, f: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Deferred<U, E> + 'static,
    {
        self.then(move |value| Ok(Resolution::Deferred(f(value))))
    }

    /// Recover from a rejection with a step that itself completes later.
    pub fn or_else<E2, F>(&self, f: F) -> Deferred<T, E2>
    where
        E2: Clone + 'static,
        F: FnOnce(E) -> Deferred<T, E2> + 'static,
    {
        self.catch(move |reason| Ok(Resolution::Deferred(f(reason))))
    }
}
