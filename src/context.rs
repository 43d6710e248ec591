//! The capabilities a promise runs with.
use std::{fmt, sync::Arc};

use crate::{
    dispatch::{Dispatch, Immediate},
    observer::{Observer, TracingObserver},
    Error, Promise,
};

/// Dispatch and diagnostics shared by a promise and everything chained
/// off it.
///
/// Every child created by [`Promise::then`] inherits its parent's context,
/// so choosing a dispatcher once at the head of a chain is enough. The
/// default context runs callbacks inline and reports through `tracing`.
///
/// # Examples
///
/// ```
/// use promise_chain::{Context, Error, SpawnThread};
///
/// let context = Context::new(SpawnThread)
///     .with_observer(|diagnostic: &Error| eprintln!("promise: {diagnostic}"));
/// let promise = context.of::<_, ()>("ready");
/// assert_eq!(promise.state().into_result(), Some(Ok("ready")));
/// ```
#[derive(Clone)]
pub struct Context {
    dispatch: Arc<dyn Dispatch>,
    observer: Arc<dyn Observer>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            dispatch: Arc::new(Immediate),
            observer: Arc::new(TracingObserver),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

impl Context {
    pub fn new<D>(dispatch: D) -> Self
    where
        D: Dispatch + 'static,
    {
        Self {
            dispatch: Arc::new(dispatch),
            ..Self::default()
        }
    }

    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: Observer + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    /// A pending promise bound to this context.
    pub fn promise<T, E>(&self) -> Promise<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        Promise::with_context(self.clone())
    }

    /// An already resolved promise bound to this context.
    pub fn of<T, E>(&self, value: T) -> Promise<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        let promise = self.promise();
        promise.resolve(value);
        promise
    }

    /// An already rejected promise bound to this context.
    pub fn rejected<T, E>(&self, error: E) -> Promise<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        let promise = self.promise();
        promise.reject(error);
        promise
    }

    pub(crate) fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch.schedule(Box::new(job));
    }

    pub(crate) fn report(&self, diagnostic: Error) {
        self.observer.report(&diagnostic);
    }
}
