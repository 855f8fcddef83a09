//! Reaction registration and delivery.
//!
//! A reaction registered on a pending deferred is queued and delivered in a
//! single pass scheduled by the settle call. A reaction registered on a
//! settled deferred is delivered by the registration path itself. Either
//! way, delivery never happens on the registering call stack, and it always
//! goes to the scheduler the deferred was created under.
use crate::{
    deferred::{Deferred, Resolution, Resolver},
    scheduler::Scheduler,
};
use tracing::trace;

pub(crate) struct Reaction<T, E> {
    on_fulfilled: Box<dyn FnOnce(T)>,
    on_rejected: Box<dyn FnOnce(E)>,
}

impl<T, E> Reaction<T, E> {
    fn fire(self, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => (self.on_fulfilled)(value),
            Err(reason) => (self.on_rejected)(reason),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Deferred<T, E> {
    /// Register a raw reaction without deriving a new deferred.
    pub(crate) fn subscribe(
        &self,
        on_fulfilled: impl FnOnce(T) + 'static,
        on_rejected: impl FnOnce(E) + 'static,
    ) {
        let reaction = Reaction {
            on_fulfilled: Box::new(on_fulfilled),
            on_rejected: Box::new(on_rejected),
        };
        let (id, scheduler, outcome) = {
            let mut inner = self.inner.borrow_mut();
            match inner.outcome.clone() {
                Some(outcome) => (inner.id, inner.scheduler.clone(), outcome),
                None => {
                    inner.reactions.push(reaction);
                    trace!(id = inner.id, queued = inner.reactions.len(), "reaction queued");
                    return;
                }
            }
        };
        trace!(id, "scheduling delivery to late reaction");
        scheduler.defer(Box::new(move || reaction.fire(outcome)));
    }
}

/// Schedule one delivery pass over `reactions`, in registration order.
pub(crate) fn deliver<T: Clone + 'static, E: Clone + 'static>(
    scheduler: &dyn Scheduler,
    id: u64,
    reactions: Vec<Reaction<T, E>>,
    outcome: Result<T, E>,
) {
    if reactions.is_empty() {
        return;
    }
    trace!(id, reactions = reactions.len(), "scheduling delivery pass");
    scheduler.defer(Box::new(move || {
        for reaction in reactions {
            reaction.fire(outcome.clone());
        }
    }));
}

/// Run a handler and fold what it produced into `derived`: an error
/// rejects, a deferred is adopted, a plain value fulfills.
pub(crate) fn handle<V, U, E2, F>(callback: F, input: V, derived: &Resolver<U, E2>)
where
    U: Clone + 'static,
    E2: Clone + 'static,
    F: FnOnce(V) -> Result<Resolution<U, E2>, E2>,
{
    match callback(input) {
        Ok(resolution) => derived.resolve(resolution),
        Err(reason) => derived.reject(reason),
    }
}
