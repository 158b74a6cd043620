//! External-reference projection.
//!
//! An external reference ties two sketch points to the endpoints of a 3D
//! model edge. On every regeneration the edge is re-resolved (id, then name
//! within the solid, then global name), its endpoints are projected onto
//! the sketch plane, and the bound points are pinned there with ground
//! insurance. A missing edge leaves the points untouched and unpinned.

use super::types::{Constraint, ConstraintKind, Sketch};
use crate::geometry::utils_2d::{distance, EPSILON};
use crate::geometry::PlaneBasis;
use crate::scene::{EntityId, Scene};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A binding between a sketch point pair and a model edge's endpoints.
/// Stored as (id, name, solid-name) rather than a pointer so re-resolution
/// works across regenerations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub edge_id: EntityId,
    pub edge_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solid_name: Option<String>,
    pub point_a: u64,
    pub point_b: u64,
}

/// Project every external reference onto the sketch plane. Returns true if
/// any bound point moved (the caller re-solves before compiling loops).
pub fn project_external_refs(
    sketch: &mut Sketch,
    refs: &mut [ExternalRef],
    basis: &PlaneBasis,
    scene: &Scene,
) -> bool {
    let mut moved = false;

    for reference in refs.iter_mut() {
        let Some(edge) = scene.resolve_edge(
            reference.edge_id,
            &reference.edge_name,
            reference.solid_name.as_deref(),
        ) else {
            warn!(edge = %reference.edge_name, "external edge missing; points left unpinned");
            continue;
        };

        // A fallback hit updates the stored record for the next run.
        if edge.id != reference.edge_id || edge.name != reference.edge_name {
            debug!(old = %reference.edge_name, new = %edge.name, "external reference re-resolved");
            reference.edge_id = edge.id;
            reference.edge_name = edge.name.clone();
        }

        let (Some(first), Some(last)) = (edge.polyline.first(), edge.polyline.last()) else {
            continue;
        };
        let endpoints = [
            (reference.point_a, basis.project(first)),
            (reference.point_b, basis.project(last)),
        ];

        for (pid, uv) in endpoints {
            if !sketch.points.contains_key(&pid) {
                warn!(point = pid, "external reference binds a missing point");
                continue;
            }

            let current = sketch.point_pos(pid).unwrap_or([0.0, 0.0]);
            if distance(current, uv) > EPSILON {
                sketch.set_point_pos(pid, uv);
                moved = true;
            }

            sketch.set_fixed(pid, true);
            ensure_ground(sketch, pid);
        }
    }

    moved
}

/// Make sure the point carries a ground constraint.
fn ensure_ground(sketch: &mut Sketch, point: u64) {
    if sketch.is_grounded(point) {
        return;
    }
    let id = sketch.next_constraint_id();
    sketch
        .constraints
        .insert(id, Constraint::new(id, ConstraintKind::Ground, vec![point]));
}
