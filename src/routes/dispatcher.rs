//! Deferred callback delivery.
//!
//! A request whose JSON body carries `callbackUrl` is acknowledged at once with
//! `204 No Content`. The handler then runs in the background exactly as it
//! would synchronously, and its envelope is POSTed to the callback URL.
//!
//! ```text
//! Accepted ──▶ Running ──▶ Delivered
//!                     └──▶ DeliveryFailed
//! ```
//!
//! Delivery is attempted once. A failed delivery is logged and the job is
//! dropped; the HTTP caller is never told. Jobs live only in memory.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use uuid::Uuid;

use crate::bridge::deliver;
use crate::error::InvokeError;
use crate::routes::envelope::{Request, Response};
use crate::routes::executor::Executor;

/// Lifecycle of one callback job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Acknowledged to the caller; the handler has not run.
    Accepted,
    /// The handler is executing.
    Running,
    /// The envelope reached the callback URL.
    Delivered,
    /// Posting the envelope failed; the job was dropped.
    DeliveryFailed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "accepted",
            Self::Running => "running",
            Self::Delivered => "delivered",
            Self::DeliveryFailed => "delivery_failed",
        };
        f.write_str(name)
    }
}

/// Decides between synchronous execution and deferred callback mode.
#[derive(Debug, Clone)]
pub struct CallbackDispatcher {
    client: Client,
    timeout: Duration,
}

impl CallbackDispatcher {
    /// Creates a dispatcher whose callback POSTs time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, InvokeError> {
        let client = Client::builder().build().map_err(InvokeError::Transport)?;
        Ok(Self { client, timeout })
    }

    /// Handles one request.
    ///
    /// Requests that fail to resolve are answered synchronously with their
    /// client error even when they carry a callback URL, since no handler
    /// would ever run for them.
    pub async fn handle<C: Send + 'static>(
        &self,
        executor: &Executor<C>,
        request: Request,
    ) -> Response {
        let Some(callback_url) = request.callback_url() else {
            return executor.execute(request).await;
        };

        let resolved = match executor.resolve(&request) {
            Ok(resolved) => resolved,
            Err(err) => return Response::client_error(&err),
        };

        let job_id = Uuid::new_v4();
        tracing::info!(
            %job_id,
            route = %resolved.name,
            callback = %callback_url,
            state = %JobState::Accepted,
            "Deferred request"
        );

        let executor = executor.clone();
        let client = self.client.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tracing::debug!(%job_id, state = %JobState::Running, "Running deferred handler");
            let response = executor.run(resolved, request).await;
            let envelope = response.envelope();

            match deliver(&client, &callback_url, &envelope, timeout).await {
                Ok(()) => tracing::info!(
                    %job_id,
                    status = response.status.as_u16(),
                    state = %JobState::Delivered,
                    "Callback delivered"
                ),
                Err(e) => tracing::warn!(
                    %job_id,
                    callback = %callback_url,
                    error = %e,
                    state = %JobState::DeliveryFailed,
                    "Callback delivery failed, dropping result"
                ),
            }
        });

        Response::accepted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_names() {
        assert_eq!(JobState::Accepted.to_string(), "accepted");
        assert_eq!(JobState::DeliveryFailed.to_string(), "delivery_failed");
    }

    #[test]
    fn dispatcher_builds() {
        let dispatcher = CallbackDispatcher::new(Duration::from_secs(1)).unwrap();
        assert_eq!(dispatcher.timeout, Duration::from_secs(1));
    }
}
