//! Diagnostics sink for conditions that are reported rather than raised.
use crate::Error;

/// Receives every [`Error`] the promise core and combinators report.
///
/// Any `Fn(&Error) + Send + Sync` closure is an observer, which keeps test
/// recorders short.
pub trait Observer: Send + Sync {
    fn report(&self, diagnostic: &Error);
}

impl<F> Observer for F
where
    F: Fn(&Error) + Send + Sync,
{
    fn report(&self, diagnostic: &Error) {
        self(diagnostic)
    }
}

/// Forwards diagnostics to `tracing`. This is what a default
/// [`Context`](crate::Context) uses.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn report(&self, diagnostic: &Error) {
        match diagnostic {
            Error::AlreadySettled(attempted) => {
                tracing::warn!(%attempted, "{diagnostic}");
            }
            Error::EmptyInput(combinator) => {
                tracing::debug!(combinator, "{diagnostic}");
            }
            Error::ZeroLimit => {
                tracing::error!("{diagnostic}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outcome;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_closure_observer_records() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = move |diagnostic: &Error| sink.lock().push(diagnostic.clone());
        observer.report(&Error::ZeroLimit);
        observer.report(&Error::AlreadySettled(Outcome::Rejected));
        assert_eq!(
            *seen.lock(),
            vec![Error::ZeroLimit, Error::AlreadySettled(Outcome::Rejected)]
        );
    }

    #[test]
    fn test_tracing_observer_does_not_panic() {
        TracingObserver.report(&Error::EmptyInput("all"));
        TracingObserver.report(&Error::ZeroLimit);
    }
}
