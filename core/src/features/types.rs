use crate::geometry::PlaneBasis;
use crate::scene::EntityId;
use crate::sketch::external::ExternalRef;
use crate::sketch::solver::SolveReport;
use crate::sketch::types::Sketch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a feature run. They are recorded on the feature by
/// the runner; regeneration continues with the next feature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("invalid sketch: {0}")]
    InvalidSketch(String),
}

/// A parametric sketch feature: the persisted sketch document plus the
/// plane it lives on and its bindings to earlier features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchFeature {
    pub id: EntityId,
    pub name: String,
    pub sketch: Sketch,
    /// Last-known plane. Rebuilt from `plane_ref` on regeneration when that
    /// face resolves; reused otherwise.
    pub basis: PlaneBasis,
    /// Name of the scene face this sketch is attached to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_refs: Vec<ExternalRef>,
    #[serde(skip)]
    pub last_error: Option<String>,
    #[serde(skip)]
    pub last_solve: Option<SolveReport>,
}

impl SketchFeature {
    pub fn new(name: &str) -> Self {
        Self {
            id: EntityId::new(),
            name: name.to_string(),
            sketch: Sketch::new(),
            basis: PlaneBasis::default(),
            plane_ref: None,
            external_refs: Vec::new(),
            last_error: None,
            last_solve: None,
        }
    }

    pub fn with_sketch(mut self, sketch: Sketch) -> Self {
        self.sketch = sketch;
        self
    }

    pub fn with_basis(mut self, basis: PlaneBasis) -> Self {
        self.basis = basis;
        self
    }
}

/// Document invariants checked before a feature solves: the origin exists,
/// a ground constraint survives, every reference resolves, and every
/// constraint matches its kind's arity.
pub fn validate_sketch(sketch: &Sketch) -> Result<(), FeatureError> {
    if !sketch.points.contains_key(&crate::sketch::types::ORIGIN_POINT_ID) {
        return Err(FeatureError::InvalidSketch(
            "the origin point is missing".to_string(),
        ));
    }
    if sketch.ground_count() == 0 {
        return Err(FeatureError::InvalidSketch(
            "no ground constraint in the document".to_string(),
        ));
    }

    for geometry in sketch.geometries.values() {
        if geometry.points.len() != geometry.kind.point_count() {
            return Err(FeatureError::InvalidSketch(format!(
                "geometry {} has {} points, expected {}",
                geometry.id,
                geometry.points.len(),
                geometry.kind.point_count()
            )));
        }
        for pid in &geometry.points {
            if !sketch.points.contains_key(pid) {
                return Err(FeatureError::InvalidSketch(format!(
                    "geometry {} references missing point {}",
                    geometry.id, pid
                )));
            }
        }
    }

    for constraint in sketch.constraints.values() {
        if constraint.points.len() != constraint.kind.arity() {
            return Err(FeatureError::InvalidSketch(format!(
                "constraint {} has {} points, expected {}",
                constraint.id,
                constraint.points.len(),
                constraint.kind.arity()
            )));
        }
    }

    Ok(())
}
