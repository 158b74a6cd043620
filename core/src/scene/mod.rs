//! Emitted scene objects and reference resolution.
//!
//! Faces and edges emitted by feature runs are attached here and become
//! read-only inputs for later features: planar faces resolve sketch bases,
//! edges resolve external references. Resolution is tolerant: by id first,
//! then by name within the named solid, then globally by name.

use crate::geometry::Point3;
use crate::sketch::profile::SketchFace;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A universally unique identifier for a scene entity (face, edge, solid).
/// Wraps Uuid for strong typing; v5 derivation gives features deterministic
/// per-run entity names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a stable id from a string seed (e.g. "Sketch1/edge/3").
    /// Deterministic across runs and platforms.
    pub fn deterministic(seed: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A displayable edge with a world-space polyline. Used for chaining
/// selections across features and re-projecting external references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEdge {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solid: Option<String>,
    pub polyline: Vec<Point3>,
}

/// The scene graph surface the core emits into. Objects are read-only to
/// the core once attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    pub faces: Vec<SketchFace>,
    pub edges: Vec<SceneEdge>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.faces.clear();
        self.edges.clear();
    }

    pub fn attach_face(&mut self, face: SketchFace) {
        self.faces.push(face);
    }

    pub fn attach_edge(&mut self, edge: SceneEdge) {
        self.edges.push(edge);
    }

    /// Resolve an edge by id, falling back to its name within the named
    /// solid, then to the name anywhere in the scene.
    pub fn resolve_edge(
        &self,
        id: EntityId,
        name: &str,
        solid: Option<&str>,
    ) -> Option<&SceneEdge> {
        if let Some(edge) = self.edges.iter().find(|e| e.id == id) {
            return Some(edge);
        }
        if let Some(solid) = solid {
            if let Some(edge) = self
                .edges
                .iter()
                .find(|e| e.solid.as_deref() == Some(solid) && e.name == name)
            {
                return Some(edge);
            }
        }
        self.edges.iter().find(|e| e.name == name)
    }

    pub fn face_by_name(&self, name: &str) -> Option<&SketchFace> {
        self.faces.iter().find(|f| f.name == name)
    }
}
