//! Profile triangulation and lift to world space.
//!
//! Takes the classified loops of a solved sketch, triangulates each
//! outer/holes group with ear-clipping (earcutr), lifts triangles and loops
//! through the planar basis, and emits the face and edge objects a feature
//! attaches to the scene.

use super::loops::{build_profile_loops, materialize_geometry, ProfileLoops};
use super::types::Sketch;
use crate::geometry::{PlaneBasis, Point3, Tessellation};
use crate::scene::EntityId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ProfileOptions {
    /// Polyline samples per full circle.
    pub curve_resolution: usize,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            curve_resolution: super::loops::DEFAULT_CURVE_RESOLUTION,
        }
    }
}

/// Role of a geometry in a face boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopRole {
    Outer,
    Hole,
}

/// A source geometry bounding a compiled face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryRef {
    pub geometry: u64,
    pub role: LoopRole,
}

/// One outer/holes group in both sketch and world coordinates. Loops are
/// closed (first point repeated last) for downstream sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileGroup {
    pub outer_2d: Vec<[f64; 2]>,
    pub holes_2d: Vec<Vec<[f64; 2]>>,
    pub outer_world: Vec<Point3>,
    pub holes_world: Vec<Vec<Point3>>,
}

/// The triangulated face emitted by a sketch feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchFace {
    pub id: EntityId,
    pub name: String,
    pub basis: PlaneBasis,
    pub tessellation: Tessellation,
    pub boundaries: Vec<BoundaryRef>,
    pub groups: Vec<ProfileGroup>,
}

/// One world-space polyline per source geometry, for display and for
/// chaining references across features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchEdge {
    pub id: EntityId,
    pub name: String,
    pub geometry: u64,
    pub polyline: Vec<Point3>,
}

/// Everything one profile compilation emits.
#[derive(Debug, Clone, Default)]
pub struct CompiledProfile {
    /// None when the sketch closes no region.
    pub face: Option<SketchFace>,
    pub edges: Vec<SketchEdge>,
}

/// Compile a solved sketch into a triangulated face and edge polylines.
/// Degenerate loops are dropped silently; the compiler is total.
pub fn compile_profile(
    sketch: &Sketch,
    basis: &PlaneBasis,
    feature_id: EntityId,
    feature_name: &str,
    options: &ProfileOptions,
) -> CompiledProfile {
    let groups = build_profile_loops(sketch, options.curve_resolution);

    let edges = emit_edges(sketch, basis, feature_id, feature_name, options);

    if groups.is_empty() {
        debug!(feature = feature_name, "sketch closes no region");
        return CompiledProfile { face: None, edges };
    }

    let mut tessellation = Tessellation::new();
    let mut boundaries = Vec::new();
    let mut emitted_groups = Vec::new();

    for group in &groups {
        triangulate_group(group, basis, &mut tessellation);

        for &gid in &group.outer.geometry_ids {
            boundaries.push(BoundaryRef {
                geometry: gid,
                role: LoopRole::Outer,
            });
        }
        for hole in &group.holes {
            for &gid in &hole.geometry_ids {
                boundaries.push(BoundaryRef {
                    geometry: gid,
                    role: LoopRole::Hole,
                });
            }
        }

        let outer_2d = group.outer.closed_points();
        let holes_2d: Vec<Vec<[f64; 2]>> =
            group.holes.iter().map(|h| h.closed_points()).collect();
        let outer_world = outer_2d.iter().map(|&uv| basis.lift(uv)).collect();
        let holes_world = holes_2d
            .iter()
            .map(|hole| hole.iter().map(|&uv| basis.lift(uv)).collect())
            .collect();

        emitted_groups.push(ProfileGroup {
            outer_2d,
            holes_2d,
            outer_world,
            holes_world,
        });
    }

    let face = SketchFace {
        id: EntityId::deterministic(&format!("{}/face", feature_id)),
        name: format!("{}:face", feature_name),
        basis: basis.clone(),
        tessellation,
        boundaries,
        groups: emitted_groups,
    };

    CompiledProfile {
        face: Some(face),
        edges,
    }
}

/// Ear-clip one outer/holes group into the shared tessellation buffer.
fn triangulate_group(group: &ProfileLoops, basis: &PlaneBasis, tessellation: &mut Tessellation) {
    // Flatten outer then holes into one coordinate list; holes are marked by
    // their start indices.
    let mut coords: Vec<f64> = Vec::new();
    let mut hole_starts: Vec<usize> = Vec::new();
    let mut flat_points: Vec<[f64; 2]> = Vec::new();

    for p in &group.outer.points {
        coords.push(p[0]);
        coords.push(p[1]);
        flat_points.push(*p);
    }
    for hole in &group.holes {
        hole_starts.push(flat_points.len());
        for p in &hole.points {
            coords.push(p[0]);
            coords.push(p[1]);
            flat_points.push(*p);
        }
    }

    if flat_points.len() < 3 {
        return;
    }

    let normal = basis.z;

    match earcutr::earcut(&coords, &hole_starts, 2) {
        Ok(indices) => {
            for tri in indices.chunks(3) {
                if tri.len() != 3 {
                    continue;
                }
                let (a, b, c) = (flat_points[tri[0]], flat_points[tri[1]], flat_points[tri[2]]);
                tessellation.add_triangle(&basis.lift(a), &basis.lift(b), &basis.lift(c), &normal);
            }
        }
        Err(err) => {
            // Fallback: fan over the outer loop. Holes are lost, the face
            // stays renderable.
            warn!(error = ?err, "ear clipping failed, falling back to a fan");
            let outer = &group.outer.points;
            for i in 1..outer.len() - 1 {
                tessellation.add_triangle(
                    &basis.lift(outer[0]),
                    &basis.lift(outer[i]),
                    &basis.lift(outer[i + 1]),
                    &normal,
                );
            }
        }
    }
}

/// One edge object per non-construction geometry.
fn emit_edges(
    sketch: &Sketch,
    basis: &PlaneBasis,
    feature_id: EntityId,
    feature_name: &str,
    options: &ProfileOptions,
) -> Vec<SketchEdge> {
    sketch
        .geometries
        .values()
        .filter(|g| !g.construction)
        .filter_map(|g| {
            let points = materialize_geometry(sketch, g.id, options.curve_resolution)?;
            Some(SketchEdge {
                id: EntityId::deterministic(&format!("{}/edge/{}", feature_id, g.id)),
                name: format!("{}:edge{}", feature_name, g.id),
                geometry: g.id,
                polyline: points.iter().map(|&uv| basis.lift(uv)).collect(),
            })
        })
        .collect()
}
