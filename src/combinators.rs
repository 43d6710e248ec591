//! Aggregating many promises into one.
//!
//! Every combinator returns a fresh aggregate promise and only talks to its
//! inputs through `then` and `error`. Results are always ordered by input
//! position, never by completion order.
use std::{
    mem,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    vec,
};

use parking_lot::Mutex;

use crate::{Context, Error, Next, Promise};

/// Positional result slots shared by the fan-out combinators.
struct Gather<T, E> {
    slots: Mutex<Vec<Option<T>>>,
    remaining: AtomicUsize,
    // Set by whichever completion settles the aggregate first.
    settled: AtomicBool,
    aggregate: Promise<Vec<T>, E>,
}

impl<T, E> Gather<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn new(len: usize, aggregate: Promise<Vec<T>, E>) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new((0..len).map(|_| None).collect()),
            remaining: AtomicUsize::new(len),
            settled: AtomicBool::new(false),
            aggregate,
        })
    }

    fn track(self: &Arc<Self>, index: usize, next: Next<T, E>) {
        match next {
            Next::Value(value) => self.fill(index, value),
            Next::Promise(promise) => {
                let gather = self.clone();
                promise.then(move |value| {
                    gather.fill(index, value);
                    Next::Value(())
                });
                let gather = self.clone();
                promise.error(move |error| gather.fail(error));
            }
        }
    }

    fn fill(&self, index: usize, value: T) {
        // Late results after a rejection are dropped.
        if self.settled.load(Ordering::Acquire) {
            return;
        }
        self.slots.lock()[index] = Some(value);
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
            && !self.settled.swap(true, Ordering::AcqRel)
        {
            let results = self.slots.lock().drain(..).flatten().collect();
            self.aggregate.resolve(results);
        }
    }

    fn fail(&self, error: E) {
        if !self.settled.swap(true, Ordering::AcqRel) {
            self.aggregate.reject(error);
        }
    }
}

#[derive(Default)]
struct Drive {
    // Some call to `advance` is looping over items.
    driving: bool,
    // A step finished while the loop was still running.
    resume: bool,
}

/// State of one `series` run. Only one step is ever in flight.
///
/// `advance` is a trampoline: a step that completes while the loop is
/// still on the stack only flags `resume`, and the running loop picks up
/// the next item. Long series therefore run in constant stack depth even
/// when every step completes inline.
struct Series<I, F, T, E> {
    items: Mutex<vec::IntoIter<I>>,
    step: Mutex<F>,
    results: Mutex<Vec<T>>,
    drive: Mutex<Drive>,
    aggregate: Promise<Vec<T>, E>,
}

impl<I, F, T, E> Series<I, F, T, E>
where
    I: Send + 'static,
    F: FnMut(I) -> Next<T, E> + Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn advance(self: Arc<Self>) {
        {
            let mut drive = self.drive.lock();
            if drive.driving {
                drive.resume = true;
                return;
            }
            drive.driving = true;
        }

        loop {
            let item = self.items.lock().next();
            let Some(item) = item else {
                self.drive.lock().driving = false;
                let results = mem::take(&mut *self.results.lock());
                self.aggregate.resolve(results);
                return;
            };
            let next = {
                let mut step = self.step.lock();
                (*step)(item)
            };
            match next {
                Next::Value(value) => self.results.lock().push(value),
                Next::Promise(promise) => {
                    let series = self.clone();
                    promise.then(move |value| {
                        series.results.lock().push(value);
                        series.advance();
                        Next::Value(())
                    });
                    let aggregate = self.aggregate.clone();
                    promise.error(move |error| {
                        aggregate.reject(error);
                    });

                    let mut drive = self.drive.lock();
                    if !drive.resume {
                        drive.driving = false;
                        return;
                    }
                    drive.resume = false;
                }
            }
        }
    }
}

impl Context {
    /// Resolves with every input's value, in input order, once all of them
    /// resolved. The first rejection rejects the aggregate.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{Context, Promise};
    ///
    /// let context = Context::default();
    /// let (a, b) = (context.promise::<&str, ()>(), context.promise::<&str, ()>());
    /// let both = context.all(vec![a.clone(), b.clone()]);
    /// b.resolve("second");
    /// a.resolve("first");
    /// assert_eq!(both.state().into_result(), Some(Ok(vec!["first", "second"])));
    /// ```
    pub fn all<T, E, P>(&self, promises: P) -> Promise<Vec<T>, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
        P: IntoIterator<Item = Promise<T, E>>,
    {
        let promises: Vec<_> = promises.into_iter().collect();
        let aggregate = self.promise();
        if promises.is_empty() {
            self.report(Error::EmptyInput("all"));
            aggregate.resolve(Vec::new());
            return aggregate;
        }

        let gather = Gather::new(promises.len(), aggregate.clone());
        for (index, promise) in promises.into_iter().enumerate() {
            gather.track(index, promise.into());
        }
        aggregate
    }

    /// Runs `step` on one item at a time. The next item starts only after
    /// the previous step's result (or the promise it returned) resolved.
    pub fn series<I, T, E, F, It>(&self, items: It, step: F) -> Promise<Vec<T>, E>
    where
        It: IntoIterator<Item = I>,
        I: Send + 'static,
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
        F: FnMut(I) -> Next<T, E> + Send + 'static,
    {
        let items: Vec<I> = items.into_iter().collect();
        let aggregate = self.promise();
        if items.is_empty() {
            self.report(Error::EmptyInput("series"));
            aggregate.resolve(Vec::new());
            return aggregate;
        }

        let series = Arc::new(Series {
            results: Mutex::new(Vec::with_capacity(items.len())),
            items: Mutex::new(items.into_iter()),
            step: Mutex::new(step),
            drive: Mutex::new(Drive::default()),
            aggregate: aggregate.clone(),
        });
        series.advance();
        aggregate
    }

    /// Runs `step` on every item right away and gathers the results in
    /// input order.
    pub fn parallel<I, T, E, F, It>(&self, items: It, mut step: F) -> Promise<Vec<T>, E>
    where
        It: IntoIterator<Item = I>,
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
        F: FnMut(I) -> Next<T, E>,
    {
        let items: Vec<I> = items.into_iter().collect();
        let aggregate = self.promise();
        if items.is_empty() {
            self.report(Error::EmptyInput("parallel"));
            aggregate.resolve(Vec::new());
            return aggregate;
        }

        let gather = Gather::new(items.len(), aggregate.clone());
        for (index, item) in items.into_iter().enumerate() {
            gather.track(index, step(item));
        }
        aggregate
    }

    /// Like [`parallel`](Context::parallel), but at most `limit` items run
    /// at once: items go in batches of `limit` and a batch starts only when
    /// the previous one resolved.
    ///
    /// A `limit` of zero is reported and returns a promise rejected with
    /// [`Error::ZeroLimit`].
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{Context, Error, Next};
    ///
    /// let context = Context::default();
    /// let doubled =
    ///     context.parallel_with_limit(1..=5, 2, |n: i32| Next::<i32, Error>::Value(n * 2));
    /// assert_eq!(doubled.state().into_result(), Some(Ok(vec![2, 4, 6, 8, 10])));
    ///
    /// let refused = context.parallel_with_limit(1..=5, 0, |n: i32| Next::<i32, Error>::Value(n));
    /// assert_eq!(refused.state().into_result(), Some(Err(Error::ZeroLimit)));
    /// ```
    pub fn parallel_with_limit<I, T, E, F, It>(
        &self,
        items: It,
        limit: usize,
        step: F,
    ) -> Promise<Vec<T>, E>
    where
        It: IntoIterator<Item = I>,
        I: Send + 'static,
        T: Clone + Send + 'static,
        E: Clone + Send + From<Error> + 'static,
        F: FnMut(I) -> Next<T, E> + Send + 'static,
    {
        if limit == 0 {
            self.report(Error::ZeroLimit);
            return self.rejected(Error::ZeroLimit.into());
        }
        let mut items = items.into_iter().peekable();
        if items.peek().is_none() {
            self.report(Error::EmptyInput("parallel_with_limit"));
            return self.of(Vec::new());
        }

        let mut batches = Vec::new();
        while items.peek().is_some() {
            batches.push(items.by_ref().take(limit).collect::<Vec<I>>());
        }
        let step = Arc::new(Mutex::new(step));
        let context = self.clone();
        self.series(batches, move |batch| {
            let step = step.clone();
            Next::Promise(context.parallel(batch, move |item| {
                let mut step = step.lock();
                (*step)(item)
            }))
        })
        .then(|batches| Next::Value(batches.into_iter().flatten().collect()))
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// [`Context::all`] on the default context.
    pub fn all<P>(promises: P) -> Promise<Vec<T>, E>
    where
        P: IntoIterator<Item = Promise<T, E>>,
    {
        Context::default().all(promises)
    }

    /// [`Context::series`] on the default context.
    pub fn series<I, F, It>(items: It, step: F) -> Promise<Vec<T>, E>
    where
        It: IntoIterator<Item = I>,
        I: Send + 'static,
        F: FnMut(I) -> Next<T, E> + Send + 'static,
    {
        Context::default().series(items, step)
    }

    /// [`Context::parallel`] on the default context.
    pub fn parallel<I, F, It>(items: It, step: F) -> Promise<Vec<T>, E>
    where
        It: IntoIterator<Item = I>,
        F: FnMut(I) -> Next<T, E>,
    {
        Context::default().parallel(items, step)
    }

    /// [`Context::parallel_with_limit`] on the default context.
    pub fn parallel_with_limit<I, F, It>(items: It, limit: usize, step: F) -> Promise<Vec<T>, E>
    where
        It: IntoIterator<Item = I>,
        I: Send + 'static,
        E: From<Error>,
        F: FnMut(I) -> Next<T, E> + Send + 'static,
    {
        Context::default().parallel_with_limit(items, limit, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::State;

    #[test]
    fn test_empty_inputs_resolve_empty() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let context = Context::default()
            .with_observer(move |diagnostic: &Error| sink.lock().push(diagnostic.clone()));

        let all = context.all(Vec::<Promise<i32, Error>>::new());
        let series = context.series(Vec::<i32>::new(), |n| Next::<i32, Error>::Value(n));
        let parallel = context.parallel(Vec::<i32>::new(), |n| Next::<i32, Error>::Value(n));
        let limited =
            context.parallel_with_limit(Vec::<i32>::new(), 3, |n| Next::<i32, Error>::Value(n));
        for aggregate in [all, series, parallel, limited] {
            assert_eq!(aggregate.state(), State::Resolved(Vec::new()));
        }
        assert_eq!(
            *seen.lock(),
            vec![
                Error::EmptyInput("all"),
                Error::EmptyInput("series"),
                Error::EmptyInput("parallel"),
                Error::EmptyInput("parallel_with_limit"),
            ]
        );
    }

    #[test]
    fn test_gather_drops_late_results_quietly() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let context = Context::default()
            .with_observer(move |diagnostic: &Error| sink.lock().push(diagnostic.clone()));
        let aggregate = context.promise::<Vec<i32>, &str>();
        let gather = Gather::new(2, aggregate.clone());
        gather.fail("first");
        gather.fill(0, 1);
        gather.fill(1, 2);
        gather.fail("second");
        assert_eq!(aggregate.state(), State::Rejected("first"));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_series_with_plain_values_runs_inline() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let log = order.clone();
        let doubled = Promise::<i32, ()>::series(vec![1, 2, 3], move |n: i32| {
            log.lock().push(n);
            Next::Value(n * 2)
        });
        assert_eq!(doubled.state(), State::Resolved(vec![2, 4, 6]));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }
}
