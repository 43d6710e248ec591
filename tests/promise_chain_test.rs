#[cfg(test)]
mod tests {
    use futures::executor::{block_on, ThreadPool};
    use parking_lot::Mutex;
    use promise_chain::{Context, Error, EventLoop, Next, Outcome, Promise, State};
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn test_promise_resolved_from_thread() {
        let promise = Promise::<i32, ()>::new();
        let promise_clone = promise.clone();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            promise_clone.resolve(42);
        });

        assert_eq!(block_on(promise.wait()), Ok(42));
    }

    #[test]
    fn test_double_settlement_is_reported_not_applied() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let context = Context::default()
            .with_observer(move |diagnostic: &Error| sink.lock().push(diagnostic.clone()));
        let promise = context.promise::<i32, &str>();
        promise.resolve(1);
        promise.resolve(2);
        promise.reject("too late");
        assert_eq!(promise.state(), State::Resolved(1));
        assert_eq!(
            *seen.lock(),
            vec![
                Error::AlreadySettled(Outcome::Resolved),
                Error::AlreadySettled(Outcome::Rejected),
            ]
        );
    }

    #[test]
    fn test_multi_level_flattening() {
        let head = Promise::<i32, String>::new();
        let level1 = Promise::<i32, String>::new();
        let level2 = Promise::<i32, String>::new();
        let (l1, l2) = (level1.clone(), level2.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s1, s2) = (seen.clone(), seen.clone());
        let tail = head
            .then(move |n| {
                s1.lock().push(n);
                Next::Promise(l1)
            })
            .then(move |n| {
                s2.lock().push(n);
                Next::Promise(l2)
            })
            .then(|n| Next::Value(n + 1));

        head.resolve(1);
        assert_eq!(*seen.lock(), vec![1]);
        level1.resolve(10);
        assert_eq!(*seen.lock(), vec![1, 10]);
        assert!(tail.is_pending());
        level2.resolve(100);
        assert_eq!(tail.state(), State::Resolved(101));
    }

    #[test]
    fn test_nested_promise_chained_off_another() {
        // The nested promise is itself the tail of a chain.
        let head = Promise::<i32, ()>::new();
        let source = Promise::<i32, ()>::new();
        let derived = source.then(|n| Next::Value(n * 3));
        let tail = head
            .then(move |_| Next::Promise(derived))
            .then(|n| Next::Value(n - 1));
        head.resolve(0);
        source.resolve(5);
        assert_eq!(tail.state(), State::Resolved(14));
    }

    #[test]
    fn test_nested_rejection_reaches_error_handler() {
        let head = Promise::<i32, &str>::new();
        let nested = Promise::<i32, &str>::new();
        let handed_out = nested.clone();
        let caught = Arc::new(Mutex::new(None));
        let sink = caught.clone();
        head.then(move |_| Next::from(handed_out))
            .then(|n| Next::Value(n))
            .error(move |e| *sink.lock() = Some(e));
        head.resolve(1);
        nested.reject("nested failed");
        assert_eq!(*caught.lock(), Some("nested failed"));
    }

    #[test]
    fn test_already_settled_nested_promise() {
        let head = Promise::<i32, ()>::new();
        let tail = head
            .then(|n| Next::Promise(Promise::of(n * 2)))
            .then(|n| Next::Value(n + 1));
        head.resolve(20);
        assert_eq!(tail.state(), State::Resolved(41));
    }

    #[test]
    fn test_event_loop_chain() {
        let (handle, event_loop) = EventLoop::new();
        let context = Context::new(handle);
        let head = context.promise::<i32, ()>();
        let nested = context.promise::<i32, ()>();
        let handed_out = nested.clone();
        let tail = head
            .then(move |_| Next::Promise(handed_out))
            .then(|n| Next::Value(n * 2));
        head.resolve(1);
        nested.resolve(21);
        assert!(tail.is_pending());
        event_loop.run_pending();
        assert_eq!(tail.state(), State::Resolved(42));
    }

    #[test]
    fn test_thread_pool_chain() {
        let pool = ThreadPool::new().expect("thread pool");
        let context = Context::new(pool);
        let head = context.promise::<u64, ()>();
        let tail = head
            .then(|n| Next::Value(n + 1))
            .then(|n| Next::Value(n * 10));
        let waiter = tail.wait();
        head.resolve(4);
        assert_eq!(block_on(waiter), Ok(50));
    }

    #[test]
    fn test_long_chain_on_event_loop() {
        let task = thread::spawn(|| {
            let (handle, event_loop) = EventLoop::new();
            let context = Context::new(handle);
            let head = context.promise::<u64, ()>();
            let mut tail = head.clone();
            for _ in 0..100_000 {
                tail = tail.then(|n| Next::Value(n + 1));
            }
            head.resolve(0);
            // Each link is its own queued job, so nothing nests.
            assert_eq!(event_loop.run_pending(), 100_000);
            tail.state()
        });
        let state = task.join().expect("The event loop thread has panicked");
        assert_eq!(state, State::Resolved(100_000));
    }
}
