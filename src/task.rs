//! Completion callbacks for the asynchronous half of the API.
//!
//! Every `*_async` method takes a [`Task`] and hands it exactly one value once
//! the work finishes. Data calls complete with a [`crate::Result`], so the two
//! terminal states (value or failure cause) are the two arms of that result;
//! session calls complete with an [`crate::Outcome`].
//!
//! Tasks are invoked on a worker thread of the facade's runtime, never on the
//! thread that submitted the call.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Single-shot completion handler.
///
/// `complete` takes `self` by value, so a task can fire at most once.
pub trait Task<T>: Send + 'static {
    fn complete(self, value: T);
}

impl<T, F> Task<T> for F
where
    F: FnOnce(T) + Send + 'static,
{
    fn complete(self, value: T) {
        self(value)
    }
}

/// Create a task paired with a [`Completion`] that receives its value.
pub fn channel<T: Send + 'static>() -> (impl Task<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    let task = move |value: T| {
        // Receiver may have been dropped; nothing left to notify then.
        let _ = tx.send(value);
    };
    (task, Completion { rx })
}

/// Receiving side of [`channel`].
///
/// Can be awaited, or waited on from synchronous code with [`Completion::wait`].
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Block until the task fires. Returns `None` if the task was dropped
    /// without completing (e.g. the facade shut down mid-flight).
    pub fn wait(self) -> Option<T> {
        futures::executor::block_on(self.rx).ok()
    }
}

impl<T> Future for Completion<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| r.ok())
    }
}
