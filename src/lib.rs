//! Chainable promises with `all`, `series`, `parallel` and
//! `parallel_with_limit` combinators.
//!
//! A [`Promise`] is settled once, from anywhere, with
//! [`resolve`](Promise::resolve) or [`reject`](Promise::reject). Handlers
//! registered with [`then`](Promise::then) and [`error`](Promise::error) run
//! on the [`Dispatch`] of the promise's [`Context`]; by default that is
//! inline on the settling thread.
//!
//! ```
//! use promise_chain::{Next, Promise};
//!
//! let fetched: Promise<u32, String> = Promise::new();
//! let total = fetched
//!     .then(|id| Next::Promise(Promise::of(id * 100)))
//!     .then(|cents| Next::Value(format!("{}.{:02}", cents / 100, cents % 100)));
//! fetched.resolve(7);
//! assert_eq!(total.state().into_result(), Some(Ok("7.00".to_string())));
//! ```
//!
//! Async code can `.await` any promise:
//!
//! ```
//! use promise_chain::Promise;
//! use futures::executor::block_on;
//!
//! let all = Promise::<i32, ()>::all(vec![Promise::of(1), Promise::of(2)]);
//! assert_eq!(block_on(async { all.await }), Ok(vec![1, 2]));
//! ```
use thiserror::Error;

mod cell;
mod combinators;
mod context;
pub mod dispatch;
pub mod observer;
mod promise;
mod waiter;

pub use cell::{Outcome, State};
pub use context::Context;
pub use dispatch::{Dispatch, EventLoop, Immediate, LoopHandle, SpawnThread};
pub use observer::{Observer, TracingObserver};
pub use promise::{Next, Promise};
pub use waiter::Waiter;

/// Conditions the crate reports instead of panicking.
///
/// They reach the [`Observer`] of the context involved. `ZeroLimit` is also
/// the rejection of a [`parallel_with_limit`](Context::parallel_with_limit)
/// call with a zero limit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("the promise was already settled; it cannot be {0} again")]
    AlreadySettled(Outcome),
    #[error("{0} received no items, resolving with an empty result")]
    EmptyInput(&'static str),
    #[error("the parallel limit must be greater than zero")]
    ZeroLimit,
}
