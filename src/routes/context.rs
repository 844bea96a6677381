//! The host's single privileged execution context.
//!
//! Desktop hosts only allow their object model to be touched from one place at
//! a time. [`ContextSlot`] models that with a dedicated thread that owns the
//! context value `C` and runs submitted jobs one after another. Anything that
//! needs the context, whether a context-bound route or the host's own
//! interactive work, goes through [`ContextSlot::submit`], so no two jobs ever
//! overlap.
//!
//! ```text
//!  request task ──submit──▶ ┌──────────────┐
//!  request task ──submit──▶ │ host-context │ ──owns──▶ C
//!  host itself  ──submit──▶ │    thread    │
//!                           └──────────────┘
//! ```

use std::thread;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

type Job<C> = Box<dyn FnOnce(&mut C) + Send>;

/// The context thread has stopped and can no longer run jobs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("host execution context is not running")]
pub struct SlotClosed;

/// Handle to the host execution context.
///
/// Cloning the handle is cheap; all clones feed the same thread.
pub struct ContextSlot<C> {
    jobs: mpsc::UnboundedSender<Job<C>>,
}

impl<C> Clone for ContextSlot<C> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<C: Send + 'static> ContextSlot<C> {
    /// Moves `context` onto a new thread and returns a handle to it.
    ///
    /// The thread exits once every handle has been dropped.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(mut context: C) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<C>>();
        thread::Builder::new()
            .name("host-context".to_string())
            .spawn(move || {
                tracing::debug!("Host execution context started");
                while let Some(job) = rx.blocking_recv() {
                    job(&mut context);
                }
                tracing::debug!("Host execution context stopped");
            })?;
        Ok(Self { jobs: tx })
    }

    /// Runs `f` inside the context and waits for its result.
    ///
    /// Jobs run in submission order. A job that panics takes the context
    /// thread down with it, so callers that run untrusted code should catch
    /// unwinds inside `f`.
    ///
    /// # Errors
    ///
    /// Returns [`SlotClosed`] if the context thread is gone.
    pub async fn submit<R, F>(&self, f: F) -> Result<R, SlotClosed>
    where
        F: FnOnce(&mut C) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job<C> = Box::new(move |context| {
            // The waiter may have gone away; the work still counts as done.
            let _ = reply_tx.send(f(context));
        });
        self.jobs.send(job).map_err(|_| SlotClosed)?;
        reply_rx.await.map_err(|_| SlotClosed)
    }

    /// Returns `true` while the context thread accepts jobs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.jobs.is_closed()
    }
}
