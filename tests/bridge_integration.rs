//! End-to-end tests: the host routes served over HTTP and called through the
//! bridge invoker, including deferred callbacks and timeout handling.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use revit_mcp_bridge::bridge::{path_segment, Call, Invoker, Payload};
use revit_mcp_bridge::error::InvokeError;
use revit_mcp_bridge::host::{self, Document, Session};
use revit_mcp_bridge::mcp::{format_result, ToolContent};
use revit_mcp_bridge::routes::{self, Api, CallbackDispatcher, ContextSlot, Executor};

/// Serves the host routes over a sample document on an ephemeral port.
async fn spawn_host() -> SocketAddr {
    let mut api = Api::new("revit_mcp");
    host::register_all(&mut api).unwrap();
    let slot = ContextSlot::spawn(Session::with_document(Document::sample())).unwrap();
    let executor = Executor::new(api, slot);
    let dispatcher = CallbackDispatcher::new(Duration::from_secs(5)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = routes::router(executor, dispatcher);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn invoker(addr: SocketAddr) -> Invoker {
    Invoker::new(&format!("http://{addr}/revit_mcp"), Duration::from_secs(5)).unwrap()
}

async fn capture(State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>) -> StatusCode {
    let _ = tx.send(body);
    StatusCode::OK
}

/// Serves a callback receiver that forwards every POSTed body to a channel.
async fn spawn_receiver() -> (SocketAddr, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let router = Router::new().route("/callback", post(capture)).with_state(tx);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, rx)
}

// =============================================================================
// Synchronous calls
// =============================================================================

#[tokio::test]
async fn status_round_trip() {
    let addr = spawn_host().await;
    let status = invoker(addr).get("/status/").await.unwrap();
    assert_eq!(status["status"], "active");
    assert_eq!(status["api_name"], "revit_mcp");
    assert_eq!(status["revit_available"], true);
}

#[tokio::test]
async fn place_family_over_http() {
    let addr = spawn_host().await;
    let result = invoker(addr)
        .post(
            "/place_family/",
            &json!({
                "family_name": "Desk",
                "location": {"x": 1.0, "y": 2.0, "z": 0.5},
                "level_name": "Level 2",
                "properties": {"Comments": "by bridge"},
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["status"], "success");
    assert_eq!(result["type_name"], "1525 x 762mm");
    assert_eq!(result["actual_location"]["z"], 10.5);
    assert_eq!(result["properties_set"], json!(["Comments"]));
}

#[tokio::test]
async fn handler_fault_is_remote_error() {
    let addr = spawn_host().await;
    let err = invoker(addr)
        .post(
            "/place_family/",
            &json!({
                "family_name": "Desk",
                "location": {"x": 0, "y": 0, "z": 0},
                "element_id": "not-a-number",
            }),
        )
        .await
        .unwrap_err();

    match err {
        InvokeError::Remote { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("exception"));
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_route_is_404() {
    let addr = spawn_host().await;
    let err = invoker(addr).get("/no_such_route/").await.unwrap_err();
    assert!(matches!(err, InvokeError::Remote { status: 404, .. }));
}

#[tokio::test]
async fn view_image_is_binary() {
    let addr = spawn_host().await;
    let call = Call::image(format!("/get_view/{}", path_segment("Level 1")));
    let payload = invoker(addr).invoke(&call).await.unwrap();

    match payload {
        Payload::Image {
            content_type,
            bytes,
        } => {
            assert_eq!(content_type, "image/png");
            assert_eq!(&bytes[1..4], b"PNG");
        }
        other => panic!("expected an image, got {other:?}"),
    }
}

#[tokio::test]
async fn list_families_query_is_forwarded() {
    let addr = spawn_host().await;
    let call = Call::get("/list_families/").with_query("contains", "single-flush");
    let Payload::Json(result) = invoker(addr).invoke(&call).await.unwrap() else {
        panic!("expected JSON");
    };
    assert_eq!(result["truncated_total"], 2);
}

#[tokio::test]
async fn tool_result_from_live_call() {
    let addr = spawn_host().await;
    let outcome = invoker(addr).invoke(&Call::get("/list_levels/")).await;
    let result = format_result(outcome);

    assert!(!result.is_error);
    let ToolContent::Text { text } = &result.content[0] else {
        panic!("expected text content");
    };
    let parsed: Value = serde_json::from_str(text).unwrap();
    assert_eq!(parsed["total_levels"], 2);
}

// =============================================================================
// Deferred mode
// =============================================================================

#[tokio::test]
async fn callback_receives_exactly_one_result() {
    let host_addr = spawn_host().await;
    let (receiver_addr, mut rx) = spawn_receiver().await;

    let response = reqwest::Client::new()
        .post(format!("http://{host_addr}/revit_mcp/place_family/"))
        .json(&json!({
            "family_name": "Desk",
            "location": {"x": 0, "y": 0, "z": 0},
            "callbackUrl": format!("http://{receiver_addr}/callback"),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);
    assert!(response.bytes().await.unwrap().is_empty());

    let delivered = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("callback not delivered")
        .unwrap();
    assert_eq!(delivered["status"], "success");
    assert_eq!(delivered["family_name"], "Desk");

    let second = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(second.is_err(), "callback delivered more than once");
}

#[tokio::test]
async fn deferred_request_to_unknown_route_fails_synchronously() {
    let host_addr = spawn_host().await;
    let (receiver_addr, mut rx) = spawn_receiver().await;

    let response = reqwest::Client::new()
        .post(format!("http://{host_addr}/revit_mcp/missing/"))
        .json(&json!({ "callbackUrl": format!("http://{receiver_addr}/callback") }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let delivered = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(delivered.is_err());
}

#[tokio::test]
async fn callback_carries_handler_fault() {
    let host_addr = spawn_host().await;
    let (receiver_addr, mut rx) = spawn_receiver().await;

    let response = reqwest::Client::new()
        .post(format!("http://{host_addr}/revit_mcp/place_family/"))
        .json(&json!({
            "family_name": "Desk",
            "location": {"x": 0, "y": 0, "z": 0},
            "element_id": "x",
            "callbackUrl": format!("http://{receiver_addr}/callback"),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let delivered = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("callback not delivered")
        .unwrap();
    assert_eq!(delivered["exception"]["source"], "place_family");
    assert!(delivered["exception"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid element_id"));
}

#[tokio::test]
async fn unreachable_callback_is_dropped_quietly() {
    let host_addr = spawn_host().await;
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let response = reqwest::Client::new()
        .post(format!("http://{host_addr}/revit_mcp/place_family/"))
        .json(&json!({
            "family_name": "Desk",
            "location": {"x": 0, "y": 0, "z": 0},
            "callbackUrl": format!("http://{dead}/callback"),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    // The failed delivery leaves the host serving, and the placement stands.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let invoker = invoker(host_addr);
    let status = invoker.get("/status/").await.unwrap();
    assert_eq!(status["status"], "active");
    let info = invoker.get("/model_info/").await.unwrap();
    assert_eq!(info["element_summary"]["by_category"]["Furniture"], 1);
}

// =============================================================================
// Failure classification
// =============================================================================

#[tokio::test]
async fn silent_peer_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let bound = Duration::from_millis(200);
    let invoker = Invoker::new(&format!("http://{addr}/revit_mcp"), bound).unwrap();
    let started = Instant::now();
    let err = invoker.get("/status/").await.unwrap_err();

    assert!(matches!(err, InvokeError::Timeout { after } if after == bound));
    assert!(started.elapsed() >= bound);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let err = invoker(addr).get("/status/").await.unwrap_err();
    assert!(matches!(err, InvokeError::Transport(_)));

    let result = format_result(Err(err));
    assert!(result.is_error);
    let ToolContent::Text { text } = &result.content[0] else {
        panic!("expected text content");
    };
    assert!(text.starts_with("Error: "));
}
