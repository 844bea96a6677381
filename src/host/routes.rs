//! Routes served by the host over the simulated [`Session`].
//!
//! Every route that reads or mutates the document is context-bound. Only the
//! tool mapping, which is static, runs as a plain handler.

use std::collections::BTreeMap;

use axum::http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::error::Category;
use serde_json::{json, Map, Value};

use crate::error::RegistrationError;
use crate::host::document::{Document, Point};
use crate::host::Session;
use crate::routes::{Api, Fault, Handler, HandlerResult, PathParams, Request, Response};

/// Default `limit` for `list_families`.
pub const DEFAULT_FAMILY_LIMIT: usize = 50;

/// Most entries listed in a not-found response.
const MAX_SUGGESTIONS: usize = 20;

/// View kinds reported by `list_views`, in output order.
const VIEW_KINDS: [&str; 8] = [
    "floor_plans",
    "ceiling_plans",
    "elevations",
    "sections",
    "3d_views",
    "drafting_views",
    "schedules",
    "other",
];

/// Registers every host route.
///
/// # Errors
///
/// Fails if any route collides with one already registered.
pub fn register_all(api: &mut Api<Session>) -> Result<(), RegistrationError> {
    register_status_routes(api)?;
    register_model_routes(api)?;
    register_view_routes(api)?;
    register_family_routes(api)?;
    register_mapping_routes(api)?;
    Ok(())
}

fn no_document(source: &str) -> Fault {
    Fault::new(source, "No active Revit document").with_status(StatusCode::SERVICE_UNAVAILABLE)
}

fn active_document<'a>(session: &'a mut Session, source: &str) -> Result<&'a mut Document, Fault> {
    session.document.as_mut().ok_or_else(|| no_document(source))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Registers `GET /status/`.
///
/// # Errors
///
/// Fails on a duplicate route.
pub fn register_status_routes(api: &mut Api<Session>) -> Result<(), RegistrationError> {
    let api_name = api.namespace().to_string();
    api.get(
        "status",
        "/status/",
        Handler::context_bound(move |session: &mut Session, _: &Request, _: &PathParams| {
            Ok(status(session, &api_name))
        }),
    )
}

fn status(session: &Session, api_name: &str) -> Response {
    match &session.document {
        Some(doc) => {
            let title = if doc.title.is_empty() {
                "Untitled"
            } else {
                doc.title.as_str()
            };
            Response::json(json!({
                "status": "active",
                "health": "healthy",
                "revit_available": true,
                "document_title": title,
                "api_name": api_name,
            }))
        }
        None => Response::json(json!({
            "status": "unhealthy",
            "health": "unhealthy",
            "revit_available": false,
            "error": "No active Revit document",
            "api_name": api_name,
        }))
        .with_status(StatusCode::SERVICE_UNAVAILABLE),
    }
}

// ---------------------------------------------------------------------------
// Model information
// ---------------------------------------------------------------------------

/// Registers `GET /model_info/` and `GET /list_levels/`.
///
/// # Errors
///
/// Fails on a duplicate route.
pub fn register_model_routes(api: &mut Api<Session>) -> Result<(), RegistrationError> {
    api.get("model_info", "/model_info/", Handler::context_bound(model_info))?;
    api.get("list_levels", "/list_levels/", Handler::context_bound(list_levels))
}

fn model_info(session: &mut Session, _: &Request, _: &PathParams) -> HandlerResult {
    let application = session.application.clone();
    let version = session.version.clone();
    let doc = active_document(session, "model_info")?;

    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for instance in doc.instances() {
        let category = doc
            .family_types()
            .iter()
            .find(|t| t.id == instance.type_id)
            .map_or("Unknown", |t| t.category.as_str());
        *by_category.entry(category).or_default() += 1;
    }

    let mut view_breakdown: BTreeMap<&str, usize> = BTreeMap::new();
    for view in doc.views() {
        *view_breakdown.entry(view.kind.as_str()).or_default() += 1;
    }

    let levels: Vec<Value> = doc
        .levels()
        .iter()
        .map(|l| json!({ "name": l.name, "elevation": round2(l.elevation) }))
        .collect();

    Ok(Response::json(json!({
        "host": { "application": application, "version": version },
        "project_info": {
            "name": doc.title,
            "number": "Not Set",
            "client": "Not Set",
            "file_name": doc.title,
        },
        "element_summary": {
            "total_elements": doc.instances().len(),
            "by_category": by_category,
        },
        "spatial_organization": { "levels": levels },
        "documentation": {
            "total_views": doc.views().len(),
            "view_breakdown": view_breakdown,
        },
    })))
}

fn list_levels(session: &mut Session, _: &Request, _: &PathParams) -> HandlerResult {
    let doc = active_document(session, "list_levels")?;
    let levels: Vec<Value> = doc
        .levels()
        .iter()
        .map(|l| json!({ "name": l.name, "elevation": round2(l.elevation), "id": l.id }))
        .collect();

    Ok(Response::json(json!({
        "total_levels": levels.len(),
        "levels": levels,
        "status": "success",
    })))
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Registers `GET /list_views/` and `GET /get_view/<view_name>`.
///
/// # Errors
///
/// Fails on a duplicate route.
pub fn register_view_routes(api: &mut Api<Session>) -> Result<(), RegistrationError> {
    api.get("list_views", "/list_views/", Handler::context_bound(list_views))?;
    api.get(
        "get_view",
        "/get_view/<view_name>",
        Handler::context_bound(get_view),
    )
}

fn list_views(session: &mut Session, _: &Request, _: &PathParams) -> HandlerResult {
    let doc = active_document(session, "list_views")?;

    let mut by_kind: Map<String, Value> = Map::new();
    let mut total = 0;
    for kind in VIEW_KINDS {
        let mut names: Vec<&str> = doc
            .views()
            .iter()
            .filter(|v| {
                v.kind == kind || (kind == "other" && !VIEW_KINDS.contains(&v.kind.as_str()))
            })
            .map(|v| v.name.as_str())
            .collect();
        names.sort_unstable();
        total += names.len();
        by_kind.insert(kind.to_string(), json!(names));
    }

    Ok(Response::json(json!({
        "views_by_type": by_kind,
        "total_exportable_views": total,
        "status": "success",
    })))
}

fn get_view(session: &mut Session, _: &Request, params: &PathParams) -> HandlerResult {
    let view_name = params.str("view_name").unwrap_or_default().trim();
    let doc = active_document(session, "get_view")?;

    if let Some(view) = doc.view_by_name(view_name) {
        tracing::debug!(view = view_name, bytes = view.image.len(), "Exported view");
        return Ok(Response::image("image/png", view.image.clone()));
    }

    let available: Vec<&str> = doc
        .views()
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|v| v.name.as_str())
        .collect();
    Ok(Response::json(json!({
        "error": format!("View '{view_name}' not found"),
        "available_views": available,
    }))
    .with_status(StatusCode::NOT_FOUND))
}

// ---------------------------------------------------------------------------
// Families
// ---------------------------------------------------------------------------

/// Body of `POST /place_family/`.
#[derive(Debug, Deserialize)]
pub struct PlacementRequest {
    /// Family to place. Required.
    #[serde(default)]
    pub family_name: Option<String>,
    /// Type within the family; the first type wins when absent.
    #[serde(default)]
    pub type_name: Option<String>,
    /// Insertion point; must carry numeric `x`, `y` and `z`.
    #[serde(default)]
    pub location: Option<Map<String, Value>>,
    /// Rotation about Z in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Level to associate the instance with.
    #[serde(default)]
    pub level_name: Option<String>,
    /// Instance parameters to set.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// Host element id. Must be an integer (or integer string).
    #[serde(default)]
    pub element_id: Option<Value>,
}

impl PlacementRequest {
    /// Reads `location` as a point. Coordinates may be numbers or numeric
    /// strings.
    fn point(&self) -> Result<Point, Fault> {
        let location = self
            .location
            .as_ref()
            .filter(|l| ["x", "y", "z"].iter().all(|k| l.contains_key(*k)))
            .ok_or_else(|| bad_request("Invalid location - must include x, y, z coordinates"))?;
        let coord = |key: &str| {
            let raw = &location[key];
            let value = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            value
                .filter(|v| v.is_finite())
                .ok_or_else(|| bad_request(format!("Invalid coordinates: {key} = {raw}")))
        };
        Ok(Point {
            x: coord("x")?,
            y: coord("y")?,
            z: coord("z")?,
        })
    }
}

/// Query of `GET /list_families/`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListFamiliesQuery {
    /// Case-insensitive substring filter on family or type name.
    pub contains: Option<String>,
    /// Most families returned.
    pub limit: usize,
}

impl ListFamiliesQuery {
    fn from_request(request: &Request) -> Result<Self, Fault> {
        let contains = request
            .query_param("contains")
            .filter(|c| !c.trim().is_empty());
        let limit = match request.query_param("limit") {
            None => DEFAULT_FAMILY_LIMIT,
            Some(raw) => raw.trim().parse().map_err(|_| {
                Fault::new("list_families", format!("Invalid limit: {raw}"))
                    .with_status(StatusCode::BAD_REQUEST)
            })?,
        };
        Ok(Self { contains, limit })
    }
}

/// Registers `GET /list_families/`, `GET /list_family_categories/` and
/// `POST /place_family/`.
///
/// # Errors
///
/// Fails on a duplicate route.
pub fn register_family_routes(api: &mut Api<Session>) -> Result<(), RegistrationError> {
    api.get(
        "list_families",
        "/list_families/",
        Handler::context_bound(list_families),
    )?;
    api.get(
        "list_family_categories",
        "/list_family_categories/",
        Handler::context_bound(list_family_categories),
    )?;
    api.post(
        "place_family",
        "/place_family/",
        Handler::context_bound(place_family),
    )
}

fn list_families(session: &mut Session, request: &Request, _: &PathParams) -> HandlerResult {
    let query = ListFamiliesQuery::from_request(request)?;
    let doc = active_document(session, "list_families")?;
    let needle = query.contains.as_deref().map(str::to_lowercase);

    let families: Vec<Value> = doc
        .family_types()
        .iter()
        .filter(|t| {
            needle.as_deref().map_or(true, |n| {
                t.family_name.to_lowercase().contains(n) || t.type_name.to_lowercase().contains(n)
            })
        })
        .take(query.limit)
        .map(|t| {
            json!({
                "family_name": t.family_name,
                "type_name": t.type_name,
                "category": t.category,
                "is_active": t.is_active,
            })
        })
        .collect();

    Ok(Response::json(json!({
        "truncated_total": families.len(),
        "families": families,
        "status": "success",
    })))
}

fn list_family_categories(session: &mut Session, _: &Request, _: &PathParams) -> HandlerResult {
    let doc = active_document(session, "list_family_categories")?;
    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    for family_type in doc.family_types() {
        *categories.entry(family_type.category.as_str()).or_default() += 1;
    }

    Ok(Response::json(json!({
        "total_categories": categories.len(),
        "categories": categories,
        "status": "success",
    })))
}

fn bad_request(message: impl Into<String>) -> Fault {
    Fault::new("place_family", message).with_status(StatusCode::BAD_REQUEST)
}

fn parse_element_id(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn place_family(session: &mut Session, request: &Request, _: &PathParams) -> HandlerResult {
    let placement: PlacementRequest = request
        .json_as()
        .map_err(|e| match e.classify() {
            Category::Data => bad_request(format!("Invalid data format - expected JSON object: {e}")),
            _ => bad_request(format!("Invalid JSON format: {e}")),
        })?
        .ok_or_else(|| bad_request("No data provided or invalid request format"))?;

    let Some(family_name) = placement.family_name.clone().filter(|n| !n.is_empty()) else {
        return Err(bad_request("No family_name provided"));
    };
    let point = placement.point()?;

    let doc = active_document(session, "place_family")?;
    let type_name = placement.type_name.as_deref();

    let Some(family_type) = doc.find_family_type(&family_name, type_name) else {
        let mut available: Vec<&str> = doc
            .family_types()
            .iter()
            .map(|t| t.family_name.as_str())
            .collect();
        available.sort_unstable();
        available.dedup();
        available.truncate(MAX_SUGGESTIONS);
        return Ok(Response::json(json!({
            "error": format!("Family type not found: {family_name} - {}", type_name.unwrap_or("Any")),
            "available_families": available,
        }))
        .with_status(StatusCode::NOT_FOUND));
    };
    let type_id = family_type.id;
    let resolved_type_name = family_type.type_name.clone();

    let level = match placement.level_name.as_deref() {
        Some(name) => Some(doc.level_by_name(name).cloned().ok_or_else(|| {
            Fault::new("place_family", format!("Level not found: {name}"))
                .with_status(StatusCode::NOT_FOUND)
        })?),
        None => None,
    };

    tracing::info!(
        family = %family_name,
        family_type = %resolved_type_name,
        "Placing family instance"
    );

    let (element_id, actual, properties_set, properties_failed) =
        doc.transaction("Place Family Instance", |doc| {
            let actual = Point {
                z: point.z + level.as_ref().map_or(0.0, |l| l.elevation),
                ..point
            };
            let id = doc.place_instance(
                type_id,
                actual,
                placement.rotation,
                level.as_ref().map(|l| l.id),
            );

            let host_id = match &placement.element_id {
                None | Some(Value::Null) => None,
                Some(raw) => {
                    let host_id = parse_element_id(raw).ok_or_else(|| {
                        Fault::new("place_family", format!("Invalid element_id: {raw}"))
                    })?;
                    if !doc.element_exists(host_id) {
                        return Err(Fault::new(
                            "place_family",
                            format!("Host element not found: {host_id}"),
                        )
                        .with_status(StatusCode::NOT_FOUND));
                    }
                    Some(host_id)
                }
            };

            let mut set = Vec::new();
            let mut failed = Vec::new();
            let instance = doc
                .instance_mut(id)
                .ok_or_else(|| Fault::new("place_family", "Placed instance disappeared"))?;
            instance.host_id = host_id;
            for (name, value) in &placement.properties {
                match value {
                    Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                        instance.properties.insert(name.clone(), value.clone());
                        set.push(name.clone());
                    }
                    _ => failed.push(format!("{name} (unsupported type)")),
                }
            }
            Ok((id, actual, set, failed))
        })?;

    Ok(Response::json(json!({
        "status": "success",
        "element_id": element_id,
        "family_name": family_name,
        "type_name": resolved_type_name,
        "requested_location": point,
        "actual_location": actual,
        "rotation_degrees": placement.rotation,
        "level": level.map(|l| l.name),
        "properties_set": properties_set,
        "properties_failed": properties_failed,
    })))
}

// ---------------------------------------------------------------------------
// Tool mapping
// ---------------------------------------------------------------------------

/// Tool name, method, route and description for every bridged tool.
const TOOL_ROUTES: &[(&str, &str, &str, &str)] = &[
    ("get_revit_status", "GET", "/status/", "Check if the API is active and a document is open"),
    ("get_revit_model_info", "GET", "/model_info/", "Project information and element counts"),
    ("list_levels", "GET", "/list_levels/", "Levels sorted by elevation"),
    ("list_revit_views", "GET", "/list_views/", "Exportable views grouped by type"),
    ("get_revit_view", "GET", "/get_view/<view_name>", "Export a view as a PNG image"),
    ("list_families", "GET", "/list_families/", "Family types, filtered by contains and limit"),
    ("list_family_categories", "GET", "/list_family_categories/", "Family type counts per category"),
    ("place_family", "POST", "/place_family/", "Place a family instance at a location"),
    ("get_mcp_to_http_mapping", "GET", "/mcp_to_http_mapping/", "This mapping"),
];

/// Registers `GET /mcp_to_http_mapping/`.
///
/// # Errors
///
/// Fails on a duplicate route.
pub fn register_mapping_routes(api: &mut Api<Session>) -> Result<(), RegistrationError> {
    let api_name = api.namespace().to_string();
    api.route(
        "mcp_to_http_mapping",
        "/mcp_to_http_mapping/",
        &[Method::GET],
        Handler::plain(move |request: &Request, _: &PathParams| {
            Ok(mapping(request, &api_name))
        }),
    )
}

fn mapping(request: &Request, api_name: &str) -> Response {
    let host = request.header("host").unwrap_or("localhost:48884");
    let base_url = format!("http://{host}");

    let mappings: Map<String, Value> = TOOL_ROUTES
        .iter()
        .map(|(tool, method, route, description)| {
            let endpoint = format!("/{api_name}{route}");
            (
                (*tool).to_string(),
                json!({
                    "http_method": method,
                    "http_endpoint": endpoint,
                    "http_url": format!("{base_url}{endpoint}"),
                    "description": description,
                }),
            )
        })
        .collect();

    Response::json(json!({
        "base_url": base_url,
        "api_name": api_name,
        "description": "Mapping between MCP tools and HTTP routes",
        "mappings": mappings,
    }))
}
