//! Handles to executions running in the background

use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::error::SdkError;

/// Detached cancel switch for an execution
#[derive(Debug, Clone)]
pub struct Canceller {
    token: CancellationToken,
}

impl Canceller {
    /// Ask the execution to stop; no-op once it has finished
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// An execution running on the tokio runtime
///
/// Consume it in one of three ways: `.await` it, block on it with
/// [`ExecutionHandle::blocking_wait`], or hand it callbacks with
/// [`ExecutionHandle::on_complete`] / [`ExecutionHandle::when_complete`].
#[derive(Debug)]
pub struct ExecutionHandle<T> {
    task: JoinHandle<Result<T, SdkError>>,
    cancel: CancellationToken,
    runtime: Handle,
}

impl<T: Send + 'static> ExecutionHandle<T> {
    /// Spawn `future` on the current runtime
    ///
    /// `cancel` must be the token `future` observes.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn<F>(cancel: CancellationToken, future: F) -> Self
    where
        F: Future<Output = Result<T, SdkError>> + Send + 'static,
    {
        let runtime = Handle::current();
        Self {
            task: runtime.spawn(future),
            cancel,
            runtime,
        }
    }

    /// Ask the execution to stop
    ///
    /// A pending send or backoff wait is interrupted and the execution ends
    /// with [`SdkError::Cancelled`]. No-op once it has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel switch that outlives the handle
    pub fn canceller(&self) -> Canceller {
        Canceller {
            token: self.cancel.clone(),
        }
    }

    /// Whether the execution has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Block the current thread until the execution finishes
    ///
    /// With a `timeout`, the execution is cancelled once it elapses and
    /// [`SdkError::DeadlineExceeded`] is returned; `None` waits for as long
    /// as it takes. A panic inside the execution resumes on this thread.
    /// Must not be called from a thread that is driving the runtime.
    pub fn blocking_wait(self, timeout: Option<Duration>) -> Result<T, SdkError> {
        let Self {
            task,
            cancel,
            runtime,
        } = self;
        let (tx, rx) = mpsc::channel();
        runtime.spawn(async move {
            let _ = tx.send(task.await);
        });

        let joined = match timeout {
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(joined) => joined,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    cancel.cancel();
                    return Err(SdkError::DeadlineExceeded { last: None });
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(SdkError::Cancelled),
            },
            // the forwarder only goes away with the runtime
            None => rx.recv().map_err(|_| SdkError::Cancelled)?,
        };
        flatten(joined)
    }

    /// Invoke exactly one of the callbacks, exactly once
    ///
    /// Returns a [`Canceller`] so the execution can still be stopped. If the
    /// execution panics, neither callback runs and the panic resumes on the
    /// callback task.
    pub fn on_complete<S, E>(self, on_success: S, on_failure: E) -> Canceller
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(SdkError) + Send + 'static,
    {
        let canceller = self.canceller();
        self.runtime.clone().spawn(async move {
            match self.await {
                Ok(value) => on_success(value),
                Err(e) => on_failure(e),
            }
        });
        canceller
    }

    /// Invoke `callback` once with either the value or the error
    ///
    /// A panic inside the execution skips the callback, as with
    /// [`ExecutionHandle::on_complete`].
    pub fn when_complete<C>(self, callback: C) -> Canceller
    where
        C: FnOnce(Option<T>, Option<SdkError>) + Send + 'static,
    {
        let canceller = self.canceller();
        self.runtime.clone().spawn(async move {
            match self.await {
                Ok(value) => callback(Some(value), None),
                Err(e) => callback(None, Some(e)),
            }
        });
        canceller
    }
}

fn flatten<T>(joined: Result<Result<T, SdkError>, JoinError>) -> Result<T, SdkError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(SdkError::Cancelled),
    }
}

impl<T> Future for ExecutionHandle<T> {
    type Output = Result<T, SdkError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().task).poll(cx).map(flatten)
    }
}
