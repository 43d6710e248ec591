//! Where settlement callbacks run.
//!
//! A promise never decides on its own which thread or loop runs its
//! handlers. It hands every callback to the [`Dispatch`] of its
//! [`Context`](crate::Context) and moves on.
use std::{
    fmt,
    sync::mpsc::{channel, Receiver, Sender, TryRecvError},
    thread,
};

use futures::executor::ThreadPool;

/// A callback queued by a promise.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs queued callbacks somewhere.
///
/// Implementations only promise to run the job eventually. Nothing about
/// ordering between jobs is assumed by the promise core.
pub trait Dispatch: Send + Sync {
    fn schedule(&self, job: Job);
}

/// Runs every job inline, on the thread that settled the promise.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl Dispatch for Immediate {
    fn schedule(&self, job: Job) {
        job()
    }
}

/// Runs every job on a freshly spawned thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpawnThread;

impl Dispatch for SpawnThread {
    fn schedule(&self, job: Job) {
        thread::spawn(job);
    }
}

impl Dispatch for ThreadPool {
    fn schedule(&self, job: Job) {
        self.spawn_ok(async move { job() });
    }
}

/// The queuing half of an event loop. Cloned freely into contexts.
#[derive(Clone)]
pub struct LoopHandle {
    sender: Sender<Job>,
}

/// The draining half of an event loop. Jobs run on whichever thread
/// drives it.
///
/// # Examples
///
/// ```
/// use promise_chain::{Context, EventLoop, Next, Promise};
///
/// let (handle, event_loop) = EventLoop::new();
/// let context = Context::new(handle);
/// let promise: Promise<i32, ()> = context.promise();
/// let doubled = promise.then(|n| Next::Value(n * 2));
/// promise.resolve(21);
/// // Nothing runs until the loop is driven.
/// assert!(doubled.is_pending());
/// event_loop.run_pending();
/// assert_eq!(doubled.state().into_result(), Some(Ok(42)));
/// ```
pub struct EventLoop {
    receiver: Receiver<Job>,
}

impl EventLoop {
    pub fn new() -> (LoopHandle, Self) {
        let (tx, rx) = channel();
        (LoopHandle { sender: tx }, EventLoop { receiver: rx })
    }

    /// Runs queued jobs, including ones queued while draining, until the
    /// queue is empty. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Runs jobs until every [`LoopHandle`] is gone.
    pub fn run(self) {
        for job in self.receiver {
            job();
        }
    }
}

impl Dispatch for LoopHandle {
    fn schedule(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!("event loop is gone, dropping scheduled job");
        }
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle").finish_non_exhaustive()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop").finish_non_exhaustive()
    }
}
