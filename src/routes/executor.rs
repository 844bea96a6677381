//! Synchronous handler execution.
//!
//! [`Executor::execute`] always produces a [`Response`]: client errors,
//! returned faults and panics are all folded into an envelope here, so the
//! transport layer never sees a raw failure from a handler.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::StatusCode;

use crate::error::ClientError;
use crate::routes::api::{Api, Handler, HandlerResult, Resolved};
use crate::routes::context::ContextSlot;
use crate::routes::envelope::{Fault, Request, Response};

/// Runs resolved handlers, routing context-bound ones through the host slot.
pub struct Executor<C> {
    api: Arc<Api<C>>,
    slot: ContextSlot<C>,
}

impl<C> Clone for Executor<C> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            slot: self.slot.clone(),
        }
    }
}

impl<C: Send + 'static> Executor<C> {
    /// Creates an executor over a finished route registry.
    #[must_use]
    pub fn new(api: Api<C>, slot: ContextSlot<C>) -> Self {
        Self {
            api: Arc::new(api),
            slot,
        }
    }

    /// The host execution context shared by every context-bound handler.
    #[must_use]
    pub const fn slot(&self) -> &ContextSlot<C> {
        &self.slot
    }

    /// Resolves a request to its handler without running it.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] for unknown paths, bad methods or
    /// mistyped path parameters.
    pub fn resolve(&self, request: &Request) -> Result<Resolved<C>, ClientError> {
        self.api.resolve(&request.method, &request.path)
    }

    /// Resolves and runs a request.
    pub async fn execute(&self, request: Request) -> Response {
        match self.resolve(&request) {
            Ok(resolved) => self.run(resolved, request).await,
            Err(err) => {
                tracing::debug!(
                    method = %request.method,
                    path = %request.path,
                    error = %err,
                    "Rejected request"
                );
                Response::client_error(&err)
            }
        }
    }

    /// Runs an already resolved handler.
    pub async fn run(&self, resolved: Resolved<C>, request: Request) -> Response {
        let Resolved {
            name,
            handler,
            params,
        } = resolved;

        let result = match handler {
            Handler::Plain(f) => guarded(&name, || f(&request, &params)),
            Handler::ContextBound(f) => {
                let job_name = name.clone();
                self.slot
                    .submit(move |context| guarded(&job_name, || f(context, &request, &params)))
                    .await
                    .unwrap_or_else(|closed| {
                        Err(Fault::new(&name, closed.to_string())
                            .with_status(StatusCode::SERVICE_UNAVAILABLE))
                    })
            }
        };

        match result {
            Ok(response) => response,
            Err(fault) => {
                tracing::warn!(
                    route = %name,
                    status = fault.status().as_u16(),
                    message = %fault.message,
                    "Handler fault"
                );
                fault.into_response()
            }
        }
    }
}

/// Runs a handler, turning a panic into a fault.
fn guarded(name: &str, f: impl FnOnce() -> HandlerResult) -> HandlerResult {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(Fault::new(name, panic_message(payload.as_ref())).with_stack("handler panicked"))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::envelope::ResponseBody;
    use crate::routes::path::PathParams;
    use axum::http::Method;
    use serde_json::json;

    fn executor() -> Executor<u32> {
        let mut api = Api::new("api");
        api.get(
            "hello",
            "/hello/",
            Handler::plain(|_: &Request, _: &PathParams| Ok(Response::json(json!({"hi": 1})))),
        )
        .unwrap();
        api.get(
            "fails",
            "/fails/",
            Handler::plain(|_: &Request, _: &PathParams| Err(Fault::new("fails", "nope"))),
        )
        .unwrap();
        api.get(
            "panics",
            "/panics/",
            Handler::context_bound(|_: &mut u32, _: &Request, _: &PathParams| {
                panic!("exploded")
            }),
        )
        .unwrap();
        api.post(
            "count",
            "/count/",
            Handler::context_bound(|count: &mut u32, _: &Request, _: &PathParams| {
                *count += 1;
                Ok(Response::json(json!({"count": *count})))
            }),
        )
        .unwrap();
        Executor::new(api, ContextSlot::spawn(0).unwrap())
    }

    fn body(response: &Response) -> serde_json::Value {
        match &response.body {
            ResponseBody::Json(v) => v.clone(),
            other => panic!("expected JSON, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_handler_runs() {
        let response = executor()
            .execute(Request::new(Method::GET, "/api/hello"))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(body(&response), json!({"hi": 1}));
    }

    #[tokio::test]
    async fn returned_fault_becomes_envelope() {
        let response = executor()
            .execute(Request::new(Method::GET, "/api/fails/"))
            .await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&response)["exception"]["message"], "nope");
    }

    #[tokio::test]
    async fn panic_becomes_fault_and_context_survives() {
        let executor = executor();
        let response = executor
            .execute(Request::new(Method::GET, "/api/panics/"))
            .await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&response)["exception"]["source"], "panics");
        assert_eq!(body(&response)["exception"]["message"], "exploded");

        let response = executor
            .execute(Request::new(Method::POST, "/api/count/"))
            .await;
        assert_eq!(body(&response), json!({"count": 1}));
    }

    #[tokio::test]
    async fn context_state_persists_between_calls() {
        let executor = executor();
        for expected in 1..=3 {
            let response = executor
                .execute(Request::new(Method::POST, "/api/count"))
                .await;
            assert_eq!(body(&response)["count"], expected);
        }
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let response = executor()
            .execute(Request::new(Method::GET, "/api/missing/"))
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(body(&response)["exception"]["message"].is_string());
    }

    #[test]
    fn panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(5_u8);
        assert_eq!(panic_message(other.as_ref()), "handler panicked");
    }
}
