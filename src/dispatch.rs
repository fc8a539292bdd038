//! Worker pool that runs both halves of the API.
//!
//! Synchronous calls block the caller on the pool; asynchronous calls are
//! spawned onto it and report through a [`Task`].

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tracing::error;

use crate::error::{DriveError, Result};
use crate::outcome::Outcome;
use crate::task::Task;

pub(crate) struct Dispatcher {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl Dispatcher {
    pub(crate) fn new(worker_threads: usize) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("driven-worker")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            runtime: Some(runtime),
            handle,
        })
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Run `future` to completion on the pool, blocking the caller.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        block_on(&self.handle, future)
    }

    /// Run `future` on the pool and hand its output to `task`.
    ///
    /// A panic inside `future` is reported as `TaskFailed` so the task still
    /// fires exactly once.
    pub(crate) fn spawn<T, F>(&self, future: F, task: impl Task<Result<T>>)
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        self.handle.spawn(async move {
            let result = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    error!("Background operation panicked");
                    Err(DriveError::TaskFailed("operation panicked".to_string()))
                }
            };
            task.complete(result);
        });
    }

    /// Like [`Dispatcher::spawn`] for session transitions, which report an
    /// [`Outcome`] instead of a value.
    pub(crate) fn spawn_outcome<F>(&self, future: F, task: impl Task<Outcome<DriveError>>)
    where
        F: Future<Output = Outcome<DriveError>> + Send + 'static,
    {
        self.handle.spawn(async move {
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Session transition panicked");
                    Outcome::failure(DriveError::TaskFailed(
                        "session transition panicked".to_string(),
                    ))
                }
            };
            task.complete(outcome);
        });
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Dropping a runtime from inside async code panics; this does not.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Block on `future` using `handle`, also when called from a worker thread of
/// a multi-threaded runtime.
pub(crate) fn block_on<F: Future>(handle: &Handle, future: F) -> F::Output {
    match Handle::try_current() {
        Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(future))
        }
        _ => handle.block_on(future),
    }
}
