//! The settle core: a three-state cell that is fulfilled or rejected at most
//! once, plus the capabilities handed to producers.
use crate::{
    reaction::{self, Reaction},
    scheduler::{self, Scheduler},
};
use std::{
    cell::RefCell,
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::trace;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Where a [`Deferred`] is in its one-way lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

/// Either a plain value or another deferred whose outcome should be adopted.
///
/// Handlers return this so a chain can flatten nested asynchronous results
/// instead of producing a deferred of a deferred.
pub enum Resolution<T, E> {
    Value(T),
    Deferred(Deferred<T, E>),
}

impl<T, E> From<Deferred<T, E>> for Resolution<T, E> {
    fn from(deferred: Deferred<T, E>) -> Self {
        Resolution::Deferred(deferred)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
        }
    }
}

/// The fulfill capability passed to a producer callback.
pub type Fulfill<T> = Rc<dyn Fn(T)>;

/// The reject capability passed to a producer callback.
pub type Reject<E> = Rc<dyn Fn(E)>;

pub(crate) struct Inner<T, E> {
    pub(crate) id: u64,
    /// `None` while pending.
    pub(crate) outcome: Option<Result<T, E>>,
    pub(crate) reactions: Vec<Reaction<T, E>>,
    /// Captured at creation; every delivery and timer for this deferred
    /// goes here, whatever is current when it settles.
    pub(crate) scheduler: Rc<dyn Scheduler>,
}

/// The eventual result of an asynchronous operation.
///
/// A `Deferred` is a handle: clones refer to the same underlying cell. It
/// starts out [`State::Pending`] and moves to [`State::Fulfilled`] or
/// [`State::Rejected`] exactly once; every later settle attempt is ignored.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, EventLoop, State};
///
/// let rt = EventLoop::new();
/// let (resolver, deferred) = rt.enter(Deferred::<&str, ()>::channel);
/// resolver.fulfill("first");
/// resolver.fulfill("second");
/// assert_eq!(deferred.state(), State::Fulfilled);
/// assert_eq!(deferred.outcome(), Some(Ok("first")));
/// ```
pub struct Deferred<T, E> {
    pub(crate) inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Deferred")
            .field("id", &inner.id)
            .field("state", &state_of(&inner.outcome))
            .field("reactions", &inner.reactions.len())
            .finish()
    }
}

fn state_of<T, E>(outcome: &Option<Result<T, E>>) -> State {
    match outcome {
        None => State::Pending,
        Some(Ok(_)) => State::Fulfilled,
        Some(Err(_)) => State::Rejected,
    }
}

impl<T, E> Deferred<T, E> {
    /// Process-unique identifier, used in logs and `Debug` output.
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    pub fn state(&self) -> State {
        state_of(&self.inner.borrow().outcome)
    }

    pub fn is_pending(&self) -> bool {
        self.inner.borrow().outcome.is_none()
    }

    /// `true` if both handles refer to the same deferred.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    fn pending() -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        trace!(id, "deferred created");
        Self {
            inner: Rc::new(RefCell::new(Inner {
                id,
                outcome: None,
                reactions: Vec::new(),
                scheduler: scheduler::current(),
            })),
        }
    }

    /// A pending deferred together with the [`Resolver`] that settles it.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, EventLoop};
    ///
    /// let rt = EventLoop::new();
    /// let (resolver, deferred) = rt.enter(Deferred::<u32, String>::channel);
    /// resolver.reject("nope".to_string());
    /// assert_eq!(rt.block_on(deferred).unwrap(), Err("nope".to_string()));
    /// ```
    pub fn channel() -> (Resolver<T, E>, Self) {
        let deferred = Self::pending();
        (
            Resolver {
                deferred: deferred.clone(),
            },
            deferred,
        )
    }

    /// Run `producer` synchronously with the fulfill and reject capabilities.
    ///
    /// Returning `Err(reason)` from the producer is the same as calling
    /// `reject(reason)`, and is ignored if the deferred already settled.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, EventLoop, State};
    ///
    /// let rt = EventLoop::new();
    /// let failed = rt.enter(|| Deferred::<(), &str>::new(|_fulfill, _reject| Err("bad input")));
    /// assert_eq!(failed.state(), State::Rejected);
    /// ```
    pub fn new<P>(producer: P) -> Self
    where
        P: FnOnce(Fulfill<T>, Reject<E>) -> Result<(), E>,
    {
        let (resolver, deferred) = Self::channel();
        let fulfill: Fulfill<T> = {
            let resolver = resolver.clone();
            Rc::new(move |value| resolver.fulfill(value))
        };
        let reject: Reject<E> = {
            let resolver = resolver.clone();
            Rc::new(move |reason| resolver.reject(reason))
        };
        if let Err(reason) = producer(fulfill, reject) {
            resolver.reject(reason);
        }
        deferred
    }

    /// An already fulfilled deferred.
    pub fn resolved(value: T) -> Self {
        let (resolver, deferred) = Self::channel();
        resolver.fulfill(value);
        deferred
    }

    /// A deferred fulfilled with a plain value, or adopting the eventual
    /// outcome of another deferred.
    pub fn resolve(resolution: Resolution<T, E>) -> Self {
        let (resolver, deferred) = Self::channel();
        resolver.resolve(resolution);
        deferred
    }

    /// An already rejected deferred. The reason is never unwrapped, even
    /// when it is itself a deferred.
    pub fn rejected(reason: E) -> Self {
        let (resolver, deferred) = Self::channel();
        resolver.reject(reason);
        deferred
    }

    pub fn from_result(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::resolved(value),
            Err(reason) => Self::rejected(reason),
        }
    }

    /// Snapshot of the settled outcome, `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.inner.borrow().outcome.clone()
    }

    pub(crate) fn scheduler(&self) -> Rc<dyn Scheduler> {
        self.inner.borrow().scheduler.clone()
    }

    fn settle(&self, outcome: Result<T, E>) {
        let (id, scheduler, reactions) = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                trace!(id = inner.id, "ignored settle of an already settled deferred");
                return;
            }
            inner.outcome = Some(outcome.clone());
            let reactions = std::mem::take(&mut inner.reactions);
            (inner.id, inner.scheduler.clone(), reactions)
        };
        trace!(id, state = ?state_of(&Some(outcome.as_ref())), "deferred settled");
        reaction::deliver(&*scheduler, id, reactions, outcome);
    }
}

impl<T: Clone + 'static, E: Clone + 'static> From<Result<T, E>> for Deferred<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Self::from_result(result)
    }
}

/// The producer side of a [`Deferred`]. Clones settle the same deferred;
/// only the first settle call has any effect.
pub struct Resolver<T, E> {
    deferred: Deferred<T, E>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("deferred", &self.deferred)
            .finish()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Resolver<T, E> {
    pub fn fulfill(&self, value: T) {
        self.deferred.settle(Ok(value));
    }

    pub fn reject(&self, reason: E) {
        self.deferred.settle(Err(reason));
    }

    /// Fulfill with a plain value, or adopt `source`'s eventual outcome.
    ///
    /// Adoption registers a reaction on `source`, so this deferred stays
    /// pending until `source` settles and its reactions are delivered.
    pub fn resolve(&self, resolution: Resolution<T, E>) {
        match resolution {
            Resolution::Value(value) => self.fulfill(value),
            Resolution::Deferred(source) => {
                trace!(
                    id = self.deferred.id(),
                    source = source.id(),
                    "adopting outcome"
                );
                let on_value = self.clone();
                let on_reason = self.clone();
                source.subscribe(
                    move |value| on_value.fulfill(value),
                    move |reason| on_reason.reject(reason),
                );
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        !self.deferred.is_pending()
    }
}
