//! The deferred-callback and timer collaborators, and the thread-local
//! context that decides which scheduler new work goes to.
use crate::event_loop::EventLoop;
use std::{cell::RefCell, rc::Rc, time::Duration};

/// A unit of work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + 'static>;

/// Runs callbacks after the current synchronous execution has unwound.
///
/// Implementations must never run a task inline from `defer` or `after`,
/// and must preserve call order among tasks deferred back to back.
pub trait Scheduler {
    /// Queue `task` to run once the current call stack has unwound.
    fn defer(&self, task: Task);

    /// Queue `task` to run no earlier than `delay` from now.
    fn after(&self, delay: Duration, task: Task);
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<dyn Scheduler>>> = const { RefCell::new(None) };
}

struct Restore(Option<Rc<dyn Scheduler>>);

impl Drop for Restore {
    fn drop(&mut self) {
        let prev = self.0.take();
        CURRENT.with(|cell| {
            cell.replace(prev);
        });
    }
}

/// Run `f` with `scheduler` as the current scheduler of this thread.
///
/// The previous scheduler is restored when `f` returns or unwinds.
pub fn enter<R>(scheduler: Rc<dyn Scheduler>, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT.with(|cell| cell.replace(Some(scheduler)));
    let _restore = Restore(prev);
    f()
}

/// The scheduler deferreds created on this thread talk to right now.
///
/// Falls back to the thread's default [`EventLoop`] when nothing has been
/// entered.
pub fn current() -> Rc<dyn Scheduler> {
    let entered = CURRENT.with(|cell| cell.borrow().clone());
    match entered {
        Some(scheduler) => scheduler,
        None => Rc::new(EventLoop::current()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defer(task: impl FnOnce() + 'static) {
        current().defer(Box::new(task));
    }

    #[derive(Default)]
    struct Recording {
        deferred: RefCell<Vec<Task>>,
        delays: RefCell<Vec<Duration>>,
    }

    impl Scheduler for Recording {
        fn defer(&self, task: Task) {
            self.deferred.borrow_mut().push(task);
        }

        fn after(&self, delay: Duration, task: Task) {
            self.delays.borrow_mut().push(delay);
            self.deferred.borrow_mut().push(task);
        }
    }

    #[test]
    fn test_enter_routes_work_to_entered_scheduler() {
        let recording = Rc::new(Recording::default());
        enter(recording.clone(), || {
            defer(|| {});
            current().after(Duration::from_millis(5), Box::new(|| {}));
        });
        assert_eq!(recording.deferred.borrow().len(), 2);
        assert_eq!(*recording.delays.borrow(), vec![Duration::from_millis(5)]);
    }

    #[test]
    fn test_enter_restores_previous_scheduler() {
        let outer = Rc::new(Recording::default());
        let inner = Rc::new(Recording::default());
        enter(outer.clone(), || {
            enter(inner.clone(), || defer(|| {}));
            defer(|| {});
        });
        assert_eq!(outer.deferred.borrow().len(), 1);
        assert_eq!(inner.deferred.borrow().len(), 1);
    }

    #[test]
    fn test_enter_restores_after_panic() {
        let outer = Rc::new(Recording::default());
        let inner = Rc::new(Recording::default());
        enter(outer.clone(), || {
            let inner = inner.clone();
            let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                enter(inner, || panic!("boom"))
            }));
            assert!(unwound.is_err());
            defer(|| {});
        });
        assert_eq!(outer.deferred.borrow().len(), 1);
        assert!(inner.deferred.borrow().is_empty());
    }
}
