//! Simulated host application.
//!
//! The real routes run inside the host's main thread with access to the open
//! document. This module provides a [`Session`] with the same shape so the
//! bundled `revit-mcp-host` binary and the tests can exercise the full bridge
//! without the host application.

pub mod document;
pub mod routes;

pub use document::{Document, FamilyType, Instance, Level, Point, View};
pub use routes::register_all;

/// The privileged host context handed to context-bound handlers.
#[derive(Debug, Clone)]
pub struct Session {
    /// Host application name.
    pub application: String,
    /// Host application version.
    pub version: String,
    /// The active document, if any.
    pub document: Option<Document>,
}

impl Session {
    /// A session with no open document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            application: "Autodesk Revit".to_string(),
            version: "2024".to_string(),
            document: None,
        }
    }

    /// A session with `document` open.
    #[must_use]
    pub fn with_document(document: Document) -> Self {
        Self {
            document: Some(document),
            ..Self::new()
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
