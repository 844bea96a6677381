//! HTTP listener for an [`Api`](crate::routes::Api).
//!
//! All paths go through one fallback handler that builds a [`Request`] and
//! hands it to the [`CallbackDispatcher`]; routing itself is done by the
//! route registry, not by axum.
//!
//! # Security
//!
//! There is no authentication at this layer. Anyone who can reach the listener
//! can drive the host, so bind to loopback unless the network is trusted.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::IntoResponse;
use axum::Router;
use tokio::net::TcpListener;

use crate::routes::dispatcher::CallbackDispatcher;
use crate::routes::envelope::Request;
use crate::routes::executor::Executor;

struct BridgeState<C> {
    executor: Executor<C>,
    dispatcher: CallbackDispatcher,
}

/// Builds the axum router serving every route of the executor's API.
pub fn router<C: Send + 'static>(executor: Executor<C>, dispatcher: CallbackDispatcher) -> Router {
    let state = Arc::new(BridgeState {
        executor,
        dispatcher,
    });
    Router::new().fallback(dispatch::<C>).with_state(state)
}

async fn dispatch<C: Send + 'static>(
    State(state): State<Arc<BridgeState<C>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let request = Request {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };
    tracing::debug!(method = %request.method, path = %request.path, "Incoming request");

    state
        .dispatcher
        .handle(&state.executor, request)
        .await
        .into_response()
}

/// Serves `router` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Routes listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
