//! In-memory stand-in for an open host document.
//!
//! Just enough state for the bundled routes: levels, loadable family types,
//! exportable views and placed instances, all sharing one element id space.
//! Mutations go through [`Document::transaction`], which restores the previous
//! state when the body fails.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routes::Fault;

/// 1x1 transparent PNG used as the rendering of every sample view.
const BLANK_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// A point in model coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

/// A building level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level {
    /// Element id.
    pub id: i64,
    /// Level name.
    pub name: String,
    /// Elevation in model units.
    pub elevation: f64,
}

/// A loadable family type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyType {
    /// Element id.
    pub id: i64,
    /// Family name.
    pub family_name: String,
    /// Type name.
    pub type_name: String,
    /// Category name.
    pub category: String,
    /// Whether the type has been activated by a placement.
    pub is_active: bool,
}

/// An exportable view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    /// Element id.
    pub id: i64,
    /// View name.
    pub name: String,
    /// View kind, e.g. `floor_plans` or `3d_views`.
    pub kind: String,
    /// Rendered PNG.
    #[serde(skip)]
    pub image: Bytes,
}

/// A placed family instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    /// Element id.
    pub id: i64,
    /// Id of the family type it was placed from.
    pub type_id: i64,
    /// Insertion point.
    pub location: Point,
    /// Rotation about Z in degrees.
    pub rotation: f64,
    /// Level it is associated with.
    pub level_id: Option<i64>,
    /// Host element (e.g. the wall a door sits in).
    pub host_id: Option<i64>,
    /// Instance parameters.
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    family_types: Vec<FamilyType>,
    instances: Vec<Instance>,
    next_id: i64,
}

/// An open document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Document title.
    pub title: String,
    levels: Vec<Level>,
    family_types: Vec<FamilyType>,
    views: Vec<View>,
    instances: Vec<Instance>,
    next_id: i64,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            levels: Vec::new(),
            family_types: Vec::new(),
            views: Vec::new(),
            instances: Vec::new(),
            next_id: 1000,
        }
    }

    /// A small project with two levels, a few family types and two views.
    #[must_use]
    pub fn sample() -> Self {
        let mut doc = Self::new("Sample Project");
        doc.add_level("Level 1", 0.0);
        doc.add_level("Level 2", 10.0);
        doc.add_family_type("Basic Wall", "Generic - 200mm", "Walls");
        doc.add_family_type("Single-Flush", "0915 x 2134mm", "Doors");
        doc.add_family_type("Single-Flush", "0813 x 2134mm", "Doors");
        doc.add_family_type("Desk", "1525 x 762mm", "Furniture");
        doc.add_family_type("M_Rectangular Column", "457 x 610mm", "Columns");

        let png = Bytes::from(BASE64_STANDARD.decode(BLANK_PNG).unwrap_or_default());
        doc.add_view("Level 1", "floor_plans", png.clone());
        doc.add_view("{3D}", "3d_views", png);
        doc
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Adds a level and returns its id.
    pub fn add_level(&mut self, name: &str, elevation: f64) -> i64 {
        let id = self.allocate_id();
        self.levels.push(Level {
            id,
            name: name.to_string(),
            elevation,
        });
        id
    }

    /// Adds a family type and returns its id.
    pub fn add_family_type(&mut self, family_name: &str, type_name: &str, category: &str) -> i64 {
        let id = self.allocate_id();
        self.family_types.push(FamilyType {
            id,
            family_name: family_name.to_string(),
            type_name: type_name.to_string(),
            category: category.to_string(),
            is_active: false,
        });
        id
    }

    /// Adds a view and returns its id.
    pub fn add_view(&mut self, name: &str, kind: &str, image: Bytes) -> i64 {
        let id = self.allocate_id();
        self.views.push(View {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            image,
        });
        id
    }

    /// Levels sorted by elevation.
    #[must_use]
    pub fn levels(&self) -> Vec<&Level> {
        let mut levels: Vec<&Level> = self.levels.iter().collect();
        levels.sort_by(|a, b| a.elevation.total_cmp(&b.elevation));
        levels
    }

    /// All family types.
    #[must_use]
    pub fn family_types(&self) -> &[FamilyType] {
        &self.family_types
    }

    /// All views.
    #[must_use]
    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// All placed instances.
    #[must_use]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Finds a level by name.
    #[must_use]
    pub fn level_by_name(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name == name)
    }

    /// Finds a view by name.
    #[must_use]
    pub fn view_by_name(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Finds a family type; without `type_name` the first type of the family wins.
    #[must_use]
    pub fn find_family_type(&self, family_name: &str, type_name: Option<&str>) -> Option<&FamilyType> {
        self.family_types.iter().find(|t| {
            t.family_name == family_name && type_name.map_or(true, |name| t.type_name == name)
        })
    }

    /// Returns `true` if any element has this id.
    #[must_use]
    pub fn element_exists(&self, id: i64) -> bool {
        self.levels.iter().any(|e| e.id == id)
            || self.family_types.iter().any(|e| e.id == id)
            || self.views.iter().any(|e| e.id == id)
            || self.instances.iter().any(|e| e.id == id)
    }

    /// Places an instance of a family type and returns the new element id.
    ///
    /// Activates the type on first use. Call inside [`Document::transaction`].
    pub fn place_instance(
        &mut self,
        type_id: i64,
        location: Point,
        rotation: f64,
        level_id: Option<i64>,
    ) -> i64 {
        if let Some(family_type) = self.family_types.iter_mut().find(|t| t.id == type_id) {
            family_type.is_active = true;
        }
        let id = self.allocate_id();
        self.instances.push(Instance {
            id,
            type_id,
            location,
            rotation,
            level_id,
            host_id: None,
            properties: BTreeMap::new(),
        });
        id
    }

    /// Mutable access to a placed instance.
    pub fn instance_mut(&mut self, id: i64) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            family_types: self.family_types.clone(),
            instances: self.instances.clone(),
            next_id: self.next_id,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.family_types = snapshot.family_types;
        self.instances = snapshot.instances;
        self.next_id = snapshot.next_id;
    }

    /// Runs `body` as one atomic unit of work.
    ///
    /// Changes are kept when `body` returns `Ok`, and rolled back before the
    /// fault is returned otherwise.
    ///
    /// # Errors
    ///
    /// Returns the fault produced by `body`.
    pub fn transaction<R>(
        &mut self,
        name: &str,
        body: impl FnOnce(&mut Self) -> Result<R, Fault>,
    ) -> Result<R, Fault> {
        let snapshot = self.snapshot();
        match body(self) {
            Ok(value) => {
                tracing::debug!(transaction = name, "Transaction committed");
                Ok(value)
            }
            Err(fault) => {
                self.restore(snapshot);
                tracing::warn!(transaction = name, error = %fault, "Transaction rolled back");
                Err(fault)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: Point = Point {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[test]
    fn sample_has_content() {
        let doc = Document::sample();
        assert_eq!(doc.levels().len(), 2);
        assert!(doc.find_family_type("Single-Flush", None).is_some());
        assert!(doc
            .find_family_type("Single-Flush", Some("0813 x 2134mm"))
            .is_some());
        assert!(doc.find_family_type("Single-Flush", Some("nope")).is_none());
        assert!(doc.view_by_name("{3D}").is_some());
        assert!(doc.view_by_name("Level 1").unwrap().image.starts_with(b"\x89PNG"));
    }

    #[test]
    fn levels_sorted_by_elevation() {
        let mut doc = Document::new("t");
        doc.add_level("Roof", 20.0);
        doc.add_level("Ground", 0.0);
        let names: Vec<_> = doc.levels().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Ground", "Roof"]);
    }

    #[test]
    fn transaction_commits() {
        let mut doc = Document::sample();
        let type_id = doc.find_family_type("Desk", None).unwrap().id;
        let id = doc
            .transaction("place", |d| Ok(d.place_instance(type_id, ORIGIN, 0.0, None)))
            .unwrap();
        assert!(doc.element_exists(id));
        assert!(doc.find_family_type("Desk", None).unwrap().is_active);
    }

    #[test]
    fn transaction_rolls_back_on_fault() {
        let mut doc = Document::sample();
        let type_id = doc.find_family_type("Desk", None).unwrap().id;
        let result: Result<(), Fault> = doc.transaction("place", |d| {
            d.place_instance(type_id, ORIGIN, 0.0, None);
            Err(Fault::new("test", "fail after mutation"))
        });
        assert!(result.is_err());
        assert!(doc.instances().is_empty());
        assert!(!doc.find_family_type("Desk", None).unwrap().is_active);
    }
}
