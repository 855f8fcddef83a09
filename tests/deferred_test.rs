#[cfg(test)]
mod tests {
    use deferred::{Clock, Deferred, EventLoop, Resolution, State};
    use std::{cell::RefCell, rc::Rc, time::Duration};

    fn rt() -> EventLoop {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        EventLoop::builder().clock(Clock::Virtual).build()
    }

    #[test]
    fn test_chain_recovers_from_thrown_error() {
        let rt = rt();
        let d = rt.enter(|| {
            Deferred::<i32, String>::new(|fulfill, _reject| {
                fulfill(10);
                Ok(())
            })
            .then(|v| Ok(Resolution::Value(v + 1)))
            .then(|_v| Err::<Resolution<String, String>, _>("boom".to_string()))
            .catch(|e| Ok::<_, String>(Resolution::Value(e)))
        });
        assert_eq!(rt.block_on(d.clone()), Ok(Ok("boom".to_string())));
        assert_eq!(d.state(), State::Fulfilled);
    }

    #[test]
    fn test_then_on_fulfilled_is_not_delivered_synchronously() {
        let rt = rt();
        let delivered = Rc::new(RefCell::new(false));
        let source = rt.enter(|| Deferred::<i32, ()>::resolved(1));
        let flag = delivered.clone();
        rt.enter(|| {
            source.map(move |_| *flag.borrow_mut() = true);
        });
        let delivered_right_after_then = *delivered.borrow();
        assert!(!delivered_right_after_then);
        rt.run().unwrap();
        assert!(*delivered.borrow());
    }

    #[test]
    fn test_settled_deferred_never_changes() {
        let rt = rt();
        let (resolver, d) = rt.enter(Deferred::<i32, &str>::channel);
        rt.enter(|| {
            resolver.fulfill(1);
            resolver.reject("no");
            resolver.fulfill(2);
            resolver.resolve(Resolution::Deferred(Deferred::resolved(3)));
        });
        rt.run().unwrap();
        assert_eq!(d.outcome(), Some(Ok(1)));
    }

    #[test]
    fn test_reactions_fire_in_registration_order_exactly_once() {
        let rt = rt();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (resolver, d) = rt.enter(Deferred::<&str, ()>::channel);
        for n in 0..5 {
            let log = log.clone();
            d.map(move |v| log.borrow_mut().push(format!("{n}:{v}")));
        }
        rt.enter(|| {
            resolver.fulfill("go");
            resolver.fulfill("again");
        });
        rt.run().unwrap();
        assert_eq!(*log.borrow(), vec!["0:go", "1:go", "2:go", "3:go", "4:go"]);
    }

    #[test]
    fn test_resolve_of_resolved_behaves_like_resolved() {
        let rt = rt();
        let plain = rt.enter(|| Deferred::<i32, ()>::resolved(8).map(|v| v * 2));
        let nested = rt.enter(|| {
            Deferred::resolve(Resolution::Deferred(Deferred::<i32, ()>::resolved(8))).map(|v| v * 2)
        });
        rt.run().unwrap();
        assert_eq!(plain.outcome(), Some(Ok(16)));
        assert_eq!(nested.outcome(), plain.outcome());
    }

    #[test]
    fn test_flattening_never_yields_nested_deferred() {
        let rt = rt();
        let d = rt.enter(|| {
            Deferred::<i32, ()>::resolved(1)
                .then(|v| Ok(Resolution::Deferred(Deferred::resolved(v + 1))))
                .then(|v| {
                    Ok(Resolution::Deferred(Deferred::resolve_delay(
                        Resolution::Value(v * 10),
                        Duration::from_millis(5),
                    )))
                })
        });
        assert_eq!(rt.block_on(d), Ok(Ok(20)));
    }

    #[test]
    fn test_all_with_rejection_in_the_middle() {
        let rt = rt();
        let (_never, pending) = Deferred::<i32, &str>::channel();
        let all = rt.enter(|| {
            Deferred::all(vec![
                Resolution::Value(1),
                Resolution::Deferred(Deferred::resolved(2)),
                Resolution::Deferred(Deferred::rejected("x")),
                Resolution::Value(3),
                Resolution::Deferred(pending.clone()),
            ])
        });
        assert_eq!(rt.block_on(all), Ok(Err("x")));
        assert_eq!(pending.state(), State::Pending);
    }

    #[test]
    fn test_all_of_nothing() {
        let rt = rt();
        let all = rt.enter(|| Deferred::<(), ()>::all(Vec::new()));
        assert_eq!(all.outcome(), Some(Ok(Vec::new())));
        assert!(rt.is_idle());
    }

    #[test]
    fn test_race_between_delays() {
        let rt = rt();
        let race = rt.enter(|| {
            Deferred::<i32, ()>::race(vec![
                Resolution::Deferred(Deferred::resolve_delay(
                    Resolution::Value(1),
                    Duration::from_millis(50),
                )),
                Resolution::Deferred(Deferred::resolve_delay(
                    Resolution::Value(2),
                    Duration::from_millis(10),
                )),
            ])
        });
        assert_eq!(rt.block_on(race), Ok(Ok(2)));
    }

    #[test]
    fn test_default_loop_serves_work_outside_enter() {
        let d = Deferred::<i32, ()>::resolved(4).map(|v| v + 1);
        assert!(d.is_pending());
        let rt = EventLoop::current();
        assert_eq!(rt.block_on(d), Ok(Ok(5)));
    }

    #[test]
    fn test_real_clock_delay() {
        let rt = EventLoop::new();
        let delay = Duration::from_millis(15);
        let start = std::time::Instant::now();
        let d = rt.enter(|| Deferred::<&str, ()>::resolve_delay(Resolution::Value("done"), delay));
        assert_eq!(rt.block_on(d), Ok(Ok("done")));
        assert!(start.elapsed() >= delay);
    }
}
