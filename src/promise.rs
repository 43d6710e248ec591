//! The chainable promise.
//!
//! A [`Promise`] holds one [`SettlementCell`], at most one success
//! continuation and at most one error handler. Calling [`Promise::then`]
//! creates a child promise that the continuation owns, so a chain of
//! `then` calls is a singly linked list running from the head to the
//! most recently created child.
//!
//! When a success handler returns another promise the chain is flattened:
//! the child's pending handlers move onto the returned promise and the
//! child is marked as adopted by it. The chain behaves exactly as if it had
//! waited for the nested promise before continuing.
use std::{fmt, mem, sync::Arc, task::Waker};

use parking_lot::Mutex;

use crate::{
    cell::{Outcome, SettlementCell, State},
    context::Context,
    waiter::Waiter,
    Error,
};

/// What a success handler hands to the next link of the chain.
pub enum Next<T, E> {
    /// Resolve the next link with this value.
    Value(T),
    /// Continue once this promise settles, with whatever it settles to.
    Promise(Promise<T, E>),
}

impl<T, E> From<Promise<T, E>> for Next<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Next::Promise(promise)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Next<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Next::Promise(_) => f.write_str("Promise(..)"),
        }
    }
}

type ErrorHandler<E> = Box<dyn FnOnce(E) + Send + 'static>;

/// A success handler together with the child it feeds.
///
/// The child's value type is erased here, which is what lets a
/// `Promise<T, E>` own a `Promise<U, E>` downstream.
trait Continuation<T, E>: Send {
    /// Runs the handler and passes its result on to the child.
    fn resolved(self: Box<Self>, value: T);
    /// Forwards an unclaimed rejection to the child.
    fn rejected(self: Box<Self>, error: E);
}

struct Then<F, U, E> {
    handler: F,
    child: Promise<U, E>,
}

impl<T, U, E, F> Continuation<T, E> for Then<F, U, E>
where
    F: FnOnce(T) -> Next<U, E> + Send + 'static,
    U: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn resolved(self: Box<Self>, value: T) {
        let Then { handler, child } = *self;
        match handler(value) {
            Next::Value(value) => {
                child.resolve(value);
            }
            Next::Promise(nested) => nested.adopt(child),
        }
    }

    fn rejected(self: Box<Self>, error: E) {
        self.child.reject(error);
    }
}

struct Inner<T, E> {
    cell: SettlementCell<T, E>,
    on_success: Option<Box<dyn Continuation<T, E>>>,
    on_error: Option<ErrorHandler<E>>,
    // An error handler already consumed the rejection.
    rejection_claimed: bool,
    adopted_by: Option<Promise<T, E>>,
    wakers: Vec<Waker>,
}

/// A single-assignment value with chainable continuations.
///
/// Cloning a `Promise` clones the handle, not the value: every clone
/// observes and settles the same cell.
///
/// # Examples
///
/// ```
/// use promise_chain::{Next, Promise};
///
/// let promise: Promise<i32, String> = Promise::new();
/// let length = promise
///     .then(|n| Next::Value(n + 1))
///     .then(|n| Next::Value(n.to_string()))
///     .then(|s| Next::Value(s.len()));
/// promise.resolve(99);
/// assert_eq!(length.state().into_result(), Some(Ok(3)));
/// ```
pub struct Promise<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
    context: Context,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            context: self.context.clone(),
        }
    }
}

impl<T, E> Default for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::with_context(Context::default())
    }
}

impl<T, E> fmt::Debug for Promise<T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Promise")
            .field("state", inner.cell.state())
            .field("adopted", &inner.adopted_by.is_some())
            .finish()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A pending promise on the default [`Context`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context: Context) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                cell: SettlementCell::new(),
                on_success: None,
                on_error: None,
                rejection_claimed: false,
                adopted_by: None,
                wakers: Vec::new(),
            })),
            context,
        }
    }

    /// An already resolved promise on the default [`Context`].
    pub fn of(value: T) -> Self {
        Context::default().of(value)
    }

    /// An already rejected promise on the default [`Context`].
    pub fn rejected(error: E) -> Self {
        Context::default().rejected(error)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Settles the promise with `value` and returns it.
    ///
    /// If a success handler is attached it is scheduled on the context's
    /// dispatcher. Resolving an already settled promise changes nothing and
    /// is reported as [`Error::AlreadySettled`].
    pub fn resolve(&self, value: T) -> T {
        let mut inner = self.inner.lock();
        if !inner.cell.try_settle(Ok(value.clone())) {
            drop(inner);
            self.context.report(Error::AlreadySettled(Outcome::Resolved));
            return value;
        }
        let wakers = mem::take(&mut inner.wakers);
        let continuation = inner.on_success.take();
        drop(inner);

        wakers.into_iter().for_each(Waker::wake);
        if let Some(continuation) = continuation {
            let value = value.clone();
            self.context.schedule(move || continuation.resolved(value));
        }
        value
    }

    /// Settles the promise with `error` and returns it.
    ///
    /// An attached error handler is scheduled with the error. Without one
    /// the rejection is handed straight to the child, and from there down
    /// the chain until some link claims it.
    pub fn reject(&self, error: E) -> E {
        let mut inner = self.inner.lock();
        if !inner.cell.try_settle(Err(error.clone())) {
            drop(inner);
            self.context.report(Error::AlreadySettled(Outcome::Rejected));
            return error;
        }
        let wakers = mem::take(&mut inner.wakers);
        let on_error = inner.on_error.take();
        let continuation = match on_error {
            Some(_) => {
                inner.rejection_claimed = true;
                None
            }
            None => inner.on_success.take(),
        };
        drop(inner);

        wakers.into_iter().for_each(Waker::wake);
        if let Some(on_error) = on_error {
            let error = error.clone();
            self.context.schedule(move || on_error(error));
        } else if let Some(continuation) = continuation {
            continuation.rejected(error.clone());
        }
        error
    }

    /// Registers the success handler and returns the child it feeds.
    ///
    /// Only one handler is kept per promise: calling `then` again replaces
    /// the previous handler and detaches its child.
    pub fn then<U, F>(&self, handler: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Next<U, E> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if let Some(adopter) = inner.adopted_by.clone() {
            drop(inner);
            return adopter.then(handler);
        }

        let child = Promise::with_context(self.context.clone());
        let continuation: Box<dyn Continuation<T, E>> = Box::new(Then {
            handler,
            child: child.clone(),
        });
        let settled = inner.cell.settled();
        match settled {
            None => inner.on_success = Some(continuation),
            Some(Ok(value)) => {
                drop(inner);
                self.context.schedule(move || continuation.resolved(value));
            }
            Some(Err(error)) => {
                let claimed = inner.rejection_claimed;
                drop(inner);
                if !claimed {
                    continuation.rejected(error);
                }
            }
        }
        child
    }

    /// Registers the error handler.
    ///
    /// If the promise already rejected, the handler is scheduled right away
    /// with the stored error.
    pub fn error<F>(&self, handler: F)
    where
        F: FnOnce(E) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if let Some(adopter) = inner.adopted_by.clone() {
            drop(inner);
            return adopter.error(handler);
        }

        let settled = inner.cell.settled();
        match settled {
            Some(Err(error)) => {
                inner.rejection_claimed = true;
                drop(inner);
                self.context.schedule(move || handler(error));
            }
            _ => inner.on_error = Some(Box::new(handler)),
        }
    }

    /// A snapshot of the settlement, following adoption.
    pub fn state(&self) -> State<T, E> {
        let adopter = {
            let inner = self.inner.lock();
            match &inner.adopted_by {
                Some(adopter) if inner.cell.is_pending() => adopter.clone(),
                _ => return inner.cell.state().clone(),
            }
        };
        adopter.state()
    }

    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    /// A future that completes with the settled value.
    ///
    /// Waiting does not occupy the handler slot, so it can be combined
    /// freely with `then` and `error`.
    pub fn wait(&self) -> Waiter<T, E> {
        Waiter::new(self.clone())
    }

    /// Moves `child`'s pending handlers onto `self`, which `child` now
    /// follows.
    fn adopt(&self, child: Promise<T, E>) {
        if Arc::ptr_eq(&self.inner, &child.inner) {
            return;
        }
        let (continuation, on_error, wakers) = {
            let mut child = child.inner.lock();
            child.adopted_by = Some(self.clone());
            (
                child.on_success.take(),
                child.on_error.take(),
                mem::take(&mut child.wakers),
            )
        };
        // Waiters on the child re-poll and find the redirect.
        wakers.into_iter().for_each(Waker::wake);
        self.transplant(continuation, on_error);
    }

    fn transplant(
        &self,
        continuation: Option<Box<dyn Continuation<T, E>>>,
        on_error: Option<ErrorHandler<E>>,
    ) {
        let mut inner = self.inner.lock();
        if let Some(adopter) = inner.adopted_by.clone() {
            drop(inner);
            return adopter.transplant(continuation, on_error);
        }
        if continuation.is_some() {
            inner.on_success = continuation;
        }
        if on_error.is_some() {
            inner.on_error = on_error;
        }

        let settled = inner.cell.settled();
        match settled {
            None => {}
            Some(Ok(value)) => {
                let continuation = inner.on_success.take();
                drop(inner);
                if let Some(continuation) = continuation {
                    continuation.resolved(value);
                }
            }
            Some(Err(error)) => {
                if let Some(on_error) = inner.on_error.take() {
                    inner.rejection_claimed = true;
                    drop(inner);
                    on_error(error);
                } else if let Some(continuation) = inner.on_success.take() {
                    drop(inner);
                    continuation.rejected(error);
                }
            }
        }
    }

    /// Registers `waker` unless the promise has settled. Returns the
    /// settlement, or the adopter to follow instead.
    pub(crate) fn poll_settled(&self, waker: &Waker) -> Progress<T, E> {
        let mut inner = self.inner.lock();
        if let Some(settled) = inner.cell.settled() {
            return Progress::Settled(settled);
        }
        if let Some(adopter) = &inner.adopted_by {
            return Progress::Adopted(adopter.clone());
        }
        if !inner.wakers.iter().any(|known| known.will_wake(waker)) {
            inner.wakers.push(waker.clone());
        }
        Progress::Pending
    }
}

pub(crate) enum Progress<T, E> {
    Pending,
    Settled(Result<T, E>),
    Adopted(Promise<T, E>),
}
