//! The single-assignment cell every promise settles through.
//!
//! A cell starts out [`State::Pending`] and moves to either
//! [`State::Resolved`] or [`State::Rejected`] exactly once. Every later
//! attempt is refused and leaves the stored value alone.
use std::fmt;

/// Which way a promise settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Resolved,
    Rejected,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Resolved => f.write_str("resolved"),
            Outcome::Rejected => f.write_str("rejected"),
        }
    }
}

/// Lifecycle of a promise's settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            State::Pending => None,
            State::Resolved(_) => Some(Outcome::Resolved),
            State::Rejected(_) => Some(Outcome::Rejected),
        }
    }

    /// `None` while pending, otherwise the settled value as a `Result`.
    pub fn into_result(self) -> Option<Result<T, E>> {
        match self {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(value)),
            State::Rejected(error) => Some(Err(error)),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SettlementCell<T, E> {
    state: State<T, E>,
}

impl<T, E> Default for SettlementCell<T, E> {
    fn default() -> Self {
        Self {
            state: State::Pending,
        }
    }
}

impl<T, E> SettlementCell<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the cell out of `Pending`: `Ok` resolves, `Err` rejects.
    ///
    /// Returns `false` and drops `settlement` if the cell already settled.
    pub fn try_settle(&mut self, settlement: Result<T, E>) -> bool {
        if !self.state.is_pending() {
            return false;
        }
        self.state = match settlement {
            Ok(value) => State::Resolved(value),
            Err(error) => State::Rejected(error),
        };
        true
    }

    pub fn state(&self) -> &State<T, E> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// A copy of the settled value, `None` while pending.
    pub fn settled(&self) -> Option<Result<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        self.state.clone().into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_settles_once() {
        let mut cell = SettlementCell::<i32, String>::new();
        assert!(cell.is_pending());
        assert!(cell.try_settle(Ok(1)));
        assert!(!cell.try_settle(Ok(2)));
        assert!(!cell.try_settle(Err("late".into())));
        assert_eq!(cell.state(), &State::Resolved(1));
        assert_eq!(cell.state().outcome(), Some(Outcome::Resolved));
    }

    #[test]
    fn test_cell_rejection_is_final() {
        let mut cell = SettlementCell::<i32, &str>::new();
        assert!(cell.try_settle(Err("boom")));
        assert!(!cell.try_settle(Ok(7)));
        assert_eq!(cell.settled(), Some(Err("boom")));
    }

    #[test]
    fn test_pending_cell_has_no_value() {
        let cell = SettlementCell::<(), ()>::default();
        assert_eq!(cell.state().outcome(), None);
        assert_eq!(cell.settled(), None);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Resolved.to_string(), "resolved");
        assert_eq!(Outcome::Rejected.to_string(), "rejected");
    }
}
