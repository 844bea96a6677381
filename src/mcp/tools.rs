//! MCP tools and their mapping onto host routes.
//!
//! Each tool is a [`ToolSpec`]: a name, a description, a JSON Schema for its
//! arguments and a function turning those arguments into exactly one
//! [`Call`]. The tools themselves do nothing else; the server runs the call
//! and formats whatever comes back.

use std::time::Duration;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::bridge::{path_segment, Call};
use crate::config::RevitConfig;
use crate::error::RegistrationError;

/// Default `limit` of `list_families`; not forwarded when unchanged.
pub const DEFAULT_FAMILY_LIMIT: u32 = 50;

/// A tool definition for the tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Base64-encoded image.
    Image {
        /// Base64 data.
        data: String,
        /// MIME type of the decoded data.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates a successful image result from base64 data.
    #[must_use]
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Image {
                data: data.into(),
                mime_type: mime_type.into(),
            }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// Per-kind call timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Ordinary calls.
    pub default: Duration,
    /// The status check.
    pub status: Duration,
    /// View image exports.
    pub image: Duration,
}

impl Timeouts {
    /// Timeouts from the `revit` config section.
    #[must_use]
    pub const fn from_config(config: &RevitConfig) -> Self {
        Self {
            default: config.timeout(),
            status: config.status_timeout(),
            image: config.image_timeout(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_config(&RevitConfig::default())
    }
}

/// Builds the call for one invocation from the tool's arguments.
pub type BuildCall = fn(&Value, &Timeouts) -> Result<Call, String>;

/// One registered tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Tool name.
    pub name: &'static str,
    /// Description shown to the model.
    pub description: &'static str,
    /// JSON Schema of the arguments.
    pub input_schema: Value,
    /// Argument-to-call mapping.
    pub build: BuildCall,
}

/// The tools exposed by the server, in registration order.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: IndexMap<&'static str, ToolSpec>,
    timeouts: Timeouts,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            tools: IndexMap::new(),
            timeouts,
        }
    }

    /// A registry with every bundled tool.
    ///
    /// # Errors
    ///
    /// Fails if two bundled tools share a name.
    pub fn with_defaults(timeouts: Timeouts) -> Result<Self, RegistrationError> {
        let mut registry = Self::new(timeouts);
        register_status_tools(&mut registry)?;
        register_model_tools(&mut registry)?;
        register_view_tools(&mut registry)?;
        register_family_tools(&mut registry)?;
        Ok(registry)
    }

    /// Adds a tool.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken.
    pub fn register(&mut self, spec: ToolSpec) -> Result<(), RegistrationError> {
        if self.tools.contains_key(spec.name) {
            return Err(RegistrationError::DuplicateTool {
                name: spec.name.to_string(),
            });
        }
        tracing::debug!(tool = spec.name, "Registered tool");
        self.tools.insert(spec.name, spec);
        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions for tools/list.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|spec| ToolDefinition {
                name: spec.name.to_string(),
                description: Some(spec.description.to_string()),
                input_schema: spec.input_schema.clone(),
            })
            .collect()
    }

    /// Maps a tool invocation to its call.
    ///
    /// Returns `None` for an unknown tool, and the argument error text when the
    /// arguments do not fit the tool.
    #[must_use]
    pub fn call_for(&self, name: &str, arguments: &Value) -> Option<Result<Call, String>> {
        self.get(name)
            .map(|spec| (spec.build)(arguments, &self.timeouts))
    }
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Parses tool arguments; `null` counts as an empty object.
fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, String> {
    let arguments = if arguments.is_null() {
        Value::Object(Map::new())
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments).map_err(|e| format!("Invalid arguments: {e}"))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Registers `get_revit_status` and `get_revit_model_info`.
///
/// # Errors
///
/// Fails on a duplicate tool name.
pub fn register_status_tools(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.register(ToolSpec {
        name: "get_revit_status",
        description: "Check if the Revit MCP API is active and responding",
        input_schema: no_arguments(),
        build: |_, timeouts| Ok(Call::get("/status/").with_timeout(timeouts.status)),
    })?;
    registry.register(ToolSpec {
        name: "get_revit_model_info",
        description: "Get comprehensive information about the current Revit model",
        input_schema: no_arguments(),
        build: |_, timeouts| Ok(Call::get("/model_info/").with_timeout(timeouts.default)),
    })
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Registers `list_levels` and `get_mcp_to_http_mapping`.
///
/// # Errors
///
/// Fails on a duplicate tool name.
pub fn register_model_tools(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.register(ToolSpec {
        name: "list_levels",
        description: "Get a list of all levels in the current Revit model, sorted by elevation",
        input_schema: no_arguments(),
        build: |_, timeouts| Ok(Call::get("/list_levels/").with_timeout(timeouts.default)),
    })?;
    registry.register(ToolSpec {
        name: "get_mcp_to_http_mapping",
        description: "Describe how each tool maps onto an HTTP route of the Revit API",
        input_schema: no_arguments(),
        build: |_, timeouts| {
            Ok(Call::get("/mcp_to_http_mapping/").with_timeout(timeouts.default))
        },
    })
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ViewArgs {
    view_name: String,
}

/// Registers `get_revit_view` and `list_revit_views`.
///
/// # Errors
///
/// Fails on a duplicate tool name.
pub fn register_view_tools(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.register(ToolSpec {
        name: "get_revit_view",
        description: "Export a specific Revit view as an image",
        input_schema: json!({
            "type": "object",
            "properties": {
                "view_name": {
                    "type": "string",
                    "description": "Name of the view to export"
                }
            },
            "required": ["view_name"]
        }),
        build: |arguments, timeouts| {
            let args: ViewArgs = parse_args(arguments)?;
            if args.view_name.trim().is_empty() {
                return Err("view_name must not be empty".to_string());
            }
            Ok(Call::image(format!("/get_view/{}", path_segment(&args.view_name)))
                .with_timeout(timeouts.image))
        },
    })?;
    registry.register(ToolSpec {
        name: "list_revit_views",
        description: "Get a list of all exportable views in the current Revit model",
        input_schema: no_arguments(),
        build: |_, timeouts| Ok(Call::get("/list_views/").with_timeout(timeouts.default)),
    })
}

// ---------------------------------------------------------------------------
// Families
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PlaceFamilyArgs {
    family_name: String,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    z: f64,
    #[serde(default)]
    rotation: f64,
    #[serde(default)]
    level_name: Option<String>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    element_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ListFamiliesArgs {
    #[serde(default)]
    contains: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

fn place_family_call(arguments: &Value, timeouts: &Timeouts) -> Result<Call, String> {
    let args: PlaceFamilyArgs = parse_args(arguments)?;
    let mut body = json!({
        "family_name": args.family_name,
        "type_name": args.type_name,
        "location": { "x": args.x, "y": args.y, "z": args.z },
        "rotation": args.rotation,
        "level_name": args.level_name,
        "properties": args.properties.unwrap_or_default(),
    });
    if let Some(element_id) = args.element_id {
        body["element_id"] = element_id;
    }
    Ok(Call::post("/place_family/", body).with_timeout(timeouts.default))
}

fn list_families_call(arguments: &Value, timeouts: &Timeouts) -> Result<Call, String> {
    let args: ListFamiliesArgs = parse_args(arguments)?;
    let mut call = Call::get("/list_families/").with_timeout(timeouts.default);
    if let Some(contains) = args.contains.filter(|c| !c.is_empty()) {
        call = call.with_query("contains", contains);
    }
    if let Some(limit) = args.limit.filter(|l| *l != DEFAULT_FAMILY_LIMIT) {
        call = call.with_query("limit", limit.to_string());
    }
    Ok(call)
}

/// Registers `place_family`, `list_families` and `list_family_categories`.
///
/// # Errors
///
/// Fails on a duplicate tool name.
pub fn register_family_tools(registry: &mut ToolRegistry) -> Result<(), RegistrationError> {
    registry.register(ToolSpec {
        name: "place_family",
        description: "Place a family instance at a specified location in the Revit model",
        input_schema: json!({
            "type": "object",
            "properties": {
                "family_name": { "type": "string", "description": "Family to place" },
                "type_name": { "type": "string", "description": "Type within the family (first type if omitted)" },
                "x": { "type": "number", "default": 0.0 },
                "y": { "type": "number", "default": 0.0 },
                "z": { "type": "number", "default": 0.0 },
                "rotation": { "type": "number", "default": 0.0, "description": "Rotation about Z in degrees" },
                "level_name": { "type": "string", "description": "Level to host the instance on" },
                "properties": { "type": "object", "description": "Instance parameters to set" },
                "element_id": { "type": "integer", "description": "Host element id, e.g. a wall for a door" }
            },
            "required": ["family_name"]
        }),
        build: place_family_call,
    })?;
    registry.register(ToolSpec {
        name: "list_families",
        description: "Get a flat list of available family types in the current Revit model",
        input_schema: json!({
            "type": "object",
            "properties": {
                "contains": { "type": "string", "description": "Only families or types containing this text" },
                "limit": { "type": "integer", "default": DEFAULT_FAMILY_LIMIT, "minimum": 1 }
            }
        }),
        build: list_families_call,
    })?;
    registry.register(ToolSpec {
        name: "list_family_categories",
        description: "Get a list of all family categories in the current Revit model",
        input_schema: no_arguments(),
        build: |_, timeouts| {
            Ok(Call::get("/list_family_categories/").with_timeout(timeouts.default))
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Expect;
    use axum::http::Method;

    fn registry() -> ToolRegistry {
        ToolRegistry::with_defaults(Timeouts::default()).unwrap()
    }

    #[test]
    fn bundled_tools_registered_in_order() {
        let registry = registry();
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names.first().map(String::as_str), Some("get_revit_status"));
        assert_eq!(registry.len(), 9);
        for definition in registry.definitions() {
            assert!(definition.input_schema.is_object());
            assert!(definition.description.is_some());
        }
    }

    #[test]
    fn duplicate_tool_rejected() {
        let mut registry = registry();
        let err = register_status_tools(&mut registry).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateTool { .. }));
    }

    #[test]
    fn unknown_tool_is_none() {
        assert!(registry().call_for("nope", &Value::Null).is_none());
    }

    #[test]
    fn status_uses_short_timeout() {
        let call = registry().call_for("get_revit_status", &Value::Null).unwrap().unwrap();
        assert_eq!(call.path, "/status/");
        assert_eq!(call.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn view_name_is_encoded() {
        let call = registry()
            .call_for("get_revit_view", &json!({"view_name": "Level 1"}))
            .unwrap()
            .unwrap();
        assert_eq!(call.path, "/get_view/Level%201");
        assert_eq!(call.expect, Expect::Image);
        assert_eq!(call.timeout, Some(Duration::from_secs(60)));

        let err = registry()
            .call_for("get_revit_view", &json!({}))
            .unwrap()
            .unwrap_err();
        assert!(err.starts_with("Invalid arguments"));
    }

    #[test]
    fn place_family_body() {
        let call = registry()
            .call_for(
                "place_family",
                &json!({"family_name": "Desk", "x": 1.5, "properties": {"Mark": "D1"}}),
            )
            .unwrap()
            .unwrap();
        assert_eq!(call.method, Method::POST);
        let body = call.body.unwrap();
        assert_eq!(body["location"], json!({"x": 1.5, "y": 0.0, "z": 0.0}));
        assert_eq!(body["type_name"], Value::Null);
        assert_eq!(body["properties"]["Mark"], "D1");
        assert!(body.get("element_id").is_none());
    }

    #[test]
    fn list_families_query() {
        let call = registry()
            .call_for("list_families", &json!({"contains": "door", "limit": 50}))
            .unwrap()
            .unwrap();
        assert_eq!(call.query, vec![("contains".to_string(), "door".to_string())]);

        let call = registry()
            .call_for("list_families", &json!({"limit": 5}))
            .unwrap()
            .unwrap();
        assert_eq!(call.query, vec![("limit".to_string(), "5".to_string())]);
    }

    #[test]
    fn image_content_serialises_with_mime_type() {
        let result = ToolCallResult::image("AQID", "image/png");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content"][0]["type"], "image");
        assert_eq!(value["content"][0]["mimeType"], "image/png");
        assert!(value.get("isError").is_none());

        let value = serde_json::to_value(ToolCallResult::error("Error: x")).unwrap();
        assert_eq!(value["isError"], true);
    }
}
