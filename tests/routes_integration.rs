//! Integration tests for the host-side route framework.
//!
//! These tests drive [`Executor`] directly: typed path parameters, the single
//! execution context, fault envelopes and the bundled host routes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use revit_mcp_bridge::host::{self, Document, Session};
use revit_mcp_bridge::routes::{
    Api, ContextSlot, Executor, Fault, Handler, PathParams, Request, Response, ResponseBody,
};

fn json_body(response: &Response) -> Value {
    match &response.body {
        ResponseBody::Json(value) => value.clone(),
        other => panic!("expected JSON body, got {other:?}"),
    }
}

fn host_executor() -> Executor<Session> {
    let mut api = Api::new("revit_mcp");
    host::register_all(&mut api).unwrap();
    let slot = ContextSlot::spawn(Session::with_document(Document::sample())).unwrap();
    Executor::new(api, slot)
}

// =============================================================================
// Typed path parameters
// =============================================================================

#[tokio::test]
async fn typed_segment_mismatch_never_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut api: Api<()> = Api::new("api");
    api.get(
        "door",
        "/doors/<int:door_id>",
        Handler::plain(move |_: &Request, params: &PathParams| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Response::json(json!({ "door_id": params.int("door_id") })))
        }),
    )
    .unwrap();
    let executor = Executor::new(api, ContextSlot::spawn(()).unwrap());

    let response = executor
        .execute(Request::new(Method::GET, "/api/doors/abc"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(json_body(&response)["exception"]["message"]
        .as_str()
        .unwrap()
        .contains("door_id"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let response = executor
        .execute(Request::new(Method::GET, "/api/doors/12"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(json_body(&response), json!({ "door_id": 12 }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn parameters_bind_left_to_right() {
    let mut api: Api<()> = Api::new("api");
    api.get(
        "pair",
        "/walls/<int:wall_id>/openings/<uuid:opening>/<bool:flag>/<double:width>",
        Handler::plain(|_: &Request, params: &PathParams| {
            Ok(Response::json(json!({
                "wall": params.int("wall_id"),
                "opening": params.uuid("opening").map(|u| u.to_string()),
                "flag": params.bool("flag"),
                "width": params.float("width"),
            })))
        }),
    )
    .unwrap();
    let executor = Executor::new(api, ContextSlot::spawn(()).unwrap());

    let response = executor
        .execute(Request::new(
            Method::GET,
            "/api/walls/3/openings/67e55044-10b1-426f-9247-bb680e5fe0c8/true/0.5",
        ))
        .await;
    assert_eq!(
        json_body(&response),
        json!({
            "wall": 3,
            "opening": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "flag": true,
            "width": 0.5,
        })
    );

    let response = executor
        .execute(Request::new(
            Method::GET,
            "/api/walls/3/openings/not-a-uuid/true/0.5",
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn undeclared_method_is_405() {
    let response = host_executor()
        .execute(Request::new(Method::DELETE, "/revit_mcp/status/"))
        .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Execution context
// =============================================================================

struct Occupancy {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn context_bound_handlers_never_overlap() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let occupancy = Occupancy {
        in_flight: Arc::clone(&in_flight),
        peak: Arc::clone(&peak),
    };

    let mut api: Api<Occupancy> = Api::new("api");
    api.post(
        "work",
        "/work/",
        Handler::context_bound(|occupancy: &mut Occupancy, _: &Request, _: &PathParams| {
            let now = occupancy.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            occupancy.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            occupancy.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Response::json(json!({ "ok": true })))
        }),
    )
    .unwrap();
    let executor = Executor::new(api, ContextSlot::spawn(occupancy).unwrap());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let executor = executor.clone();
        tasks.push(tokio::spawn(async move {
            executor
                .execute(Request::new(Method::POST, "/api/work/"))
                .await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().status, StatusCode::OK);
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn host_work_shares_the_slot_with_handlers() {
    let executor = host_executor();

    // The host itself renames the document between two requests.
    executor
        .slot()
        .submit(|session: &mut Session| {
            if let Some(doc) = session.document.as_mut() {
                doc.title = "Renamed".to_string();
            }
        })
        .await
        .unwrap();

    let response = executor
        .execute(Request::new(Method::GET, "/revit_mcp/status/"))
        .await;
    assert_eq!(json_body(&response)["document_title"], "Renamed");
}

// =============================================================================
// Envelopes
// =============================================================================

#[tokio::test]
async fn repeated_get_is_byte_identical() {
    let executor = host_executor();
    let first = executor
        .execute(Request::new(Method::GET, "/revit_mcp/list_levels/"))
        .await;
    let second = executor
        .execute(Request::new(Method::GET, "/revit_mcp/list_levels/"))
        .await;

    let first = serde_json::to_vec(&json_body(&first)).unwrap();
    let second = serde_json::to_vec(&json_body(&second)).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn faults_render_exception_envelope() {
    let mut api: Api<()> = Api::new("api");
    api.get(
        "broken",
        "/broken/",
        Handler::plain(|_: &Request, _: &PathParams| Err(Fault::new("broken", "it broke"))),
    )
    .unwrap();
    let executor = Executor::new(api, ContextSlot::spawn(()).unwrap());

    let response = executor
        .execute(Request::new(Method::GET, "/api/broken/"))
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(&response);
    assert_eq!(body["exception"]["source"], "broken");
    assert_eq!(body["exception"]["message"], "it broke");
}

#[tokio::test]
async fn status_route_reports_active() {
    let response = host_executor()
        .execute(Request::new(Method::GET, "/revit_mcp/status/"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = json_body(&response);
    assert_eq!(body["status"], "active");
    assert_eq!(body["api_name"], "revit_mcp");
}

#[tokio::test]
async fn failed_placement_leaves_document_untouched() {
    let executor = host_executor();
    let response = executor
        .execute(
            Request::new(Method::POST, "/revit_mcp/place_family/").with_json(&json!({
                "family_name": "Desk",
                "location": {"x": 0, "y": 0, "z": 0},
                "element_id": {"not": "an id"},
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    let placed = executor
        .slot()
        .submit(|session: &mut Session| {
            session
                .document
                .as_ref()
                .map_or(0, |doc| doc.instances().len())
        })
        .await
        .unwrap();
    assert_eq!(placed, 0);
}
