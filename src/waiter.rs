//! Awaiting a promise from async code.
use std::{
    future::{Future, IntoFuture},
    pin::Pin,
    task::{Context, Poll},
};

use crate::promise::{Progress, Promise};

/// Completes with the promise's settlement: `Ok` when resolved, `Err` when
/// rejected.
///
/// A waiter on a promise whose chain was flattened follows the nested
/// promise, so it completes with what the chain actually produced.
///
/// # Examples
///
/// ```
/// use promise_chain::Promise;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let promise = Promise::<String, ()>::new();
/// let waiter = promise.wait();
/// let task = thread::spawn(move || block_on(waiter));
/// promise.resolve("🍓".to_string());
/// assert_eq!(task.join().expect("The task thread has panicked"), Ok("🍓".to_string()));
/// ```
#[derive(Debug)]
pub struct Waiter<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Waiter<T, E> {
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self { promise }
    }
}

impl<T, E> Future for Waiter<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            match self.promise.poll_settled(cx.waker()) {
                Progress::Settled(settled) => return Poll::Ready(settled),
                Progress::Adopted(adopter) => self.promise = adopter,
                Progress::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Waiter<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Waiter::new(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Next, Promise, SpawnThread};
    use futures::executor::block_on;
    use std::thread;

    #[test]
    fn test_wait_resolved_across_threads() {
        let promise = Promise::<String, ()>::new();
        let waiter = promise.wait();
        let task1 = thread::spawn(move || block_on(waiter));
        let task2 = thread::spawn(move || promise.resolve(String::from("🍓")));
        task2.join().expect("The task2 thread has panicked");
        assert_eq!(
            task1.join().expect("The task1 thread has panicked"),
            Ok(String::from("🍓"))
        );
    }

    #[test]
    fn test_wait_rejected() {
        let promise = Promise::<(), String>::new();
        let waiter = promise.wait();
        promise.reject(String::from("reject!!"));
        assert_eq!(block_on(waiter), Err(String::from("reject!!")));
    }

    #[test]
    fn test_two_waiters() {
        let promise = Promise::<u8, ()>::new();
        let (a, b) = (promise.wait(), promise.wait());
        let task1 = thread::spawn(move || block_on(a));
        let task2 = thread::spawn(move || block_on(b));
        promise.resolve(7);
        assert_eq!(task1.join().expect("The task1 thread has panicked"), Ok(7));
        assert_eq!(task2.join().expect("The task2 thread has panicked"), Ok(7));
    }

    #[test]
    fn test_await_follows_flattened_chain() {
        let context = crate::Context::new(SpawnThread);
        let outer = context.promise::<i32, ()>();
        let nested = context.promise::<i32, ()>();
        let handed_out = nested.clone();
        let child = outer.then(move |_| Next::Promise(handed_out));
        let task = thread::spawn(move || block_on(async move { child.await }));
        outer.resolve(1);
        nested.resolve(42);
        assert_eq!(task.join().expect("The task thread has panicked"), Ok(42));
    }

    #[test]
    fn test_waiting_keeps_handler_slot_free() {
        let promise = Promise::<i32, ()>::new();
        let waiter = promise.wait();
        let doubled = promise.then(|n| Next::Value(n * 2));
        promise.resolve(4);
        assert_eq!(block_on(waiter), Ok(4));
        assert_eq!(block_on(doubled.wait()), Ok(8));
    }
}
