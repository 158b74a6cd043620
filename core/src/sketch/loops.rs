//! Loop chaining and classification over solved sketch geometry.
//!
//! Materializes non-construction geometry into 2D polyline segments, joins
//! them head-to-tail into closed rings, and classifies the rings by nesting
//! parity into outer boundaries and holes.

use super::types::{GeometryKind, Sketch};
use crate::geometry::utils_2d::{
    cartesian_to_polar, cross_2d, point_in_polygon, polygon_signed_area, EPSILON,
};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use tracing::debug;

/// Samples per full circle at the default resolution.
pub const DEFAULT_CURVE_RESOLUTION: usize = 64;

/// Minimum samples for any arc, regardless of sweep.
pub const MIN_ARC_SAMPLES: usize = 8;

/// Rings with an absolute signed area below this are dropped.
pub const AREA_EPSILON: f64 = 1e-12;

/// Cross-product magnitude below which a chain vertex counts as collinear.
const COLLINEAR_EPSILON: f64 = 1e-9;

const KEY_SCALE: f64 = 1e6;

/// A polyline materialized from one geometry.
#[derive(Debug, Clone)]
pub struct Segment {
    pub geometry_id: u64,
    pub points: Vec<[f64; 2]>,
}

/// A closed boundary candidate. `points` is an open ring (closure implied),
/// `geometry_ids` records the source geometry.
#[derive(Debug, Clone)]
pub struct Ring {
    pub points: Vec<[f64; 2]>,
    pub geometry_ids: BTreeSet<u64>,
}

impl Ring {
    pub fn signed_area(&self) -> f64 {
        polygon_signed_area(&self.points)
    }

    /// Closed form: first point repeated at the end.
    pub fn closed_points(&self) -> Vec<[f64; 2]> {
        let mut pts = self.points.clone();
        if let Some(first) = pts.first().copied() {
            pts.push(first);
        }
        pts
    }

    /// A point for containment tests against OTHER rings. A boundary vertex
    /// is reliable where the centroid is not: a ring's centroid can fall
    /// inside a ring nested within it.
    fn representative(&self) -> [f64; 2] {
        self.points[0]
    }

    fn reverse(&mut self) {
        self.points.reverse();
    }
}

/// One outer boundary with its holes, wound for triangulation
/// (outer clockwise, holes counter-clockwise).
#[derive(Debug, Clone)]
pub struct ProfileLoops {
    pub outer: Ring,
    pub holes: Vec<Ring>,
}

/// Materialize every non-construction geometry into a polyline segment.
pub fn materialize_segments(sketch: &Sketch, curve_resolution: usize) -> Vec<Segment> {
    let mut segments = Vec::new();

    for geometry in sketch.geometries.values() {
        if geometry.construction {
            continue;
        }
        let Some(points) = materialize_geometry(sketch, geometry.id, curve_resolution) else {
            continue;
        };
        segments.push(Segment {
            geometry_id: geometry.id,
            points,
        });
    }

    segments
}

/// Polyline for a single geometry, or None when degenerate or unresolved.
pub fn materialize_geometry(
    sketch: &Sketch,
    geometry_id: u64,
    curve_resolution: usize,
) -> Option<Vec<[f64; 2]>> {
    let geometry = sketch.geometries.get(&geometry_id)?;
    let pos = |id: u64| sketch.point_pos(id);

    match geometry.kind {
        GeometryKind::Line => {
            let a = pos(*geometry.points.first()?)?;
            let b = pos(*geometry.points.get(1)?)?;
            Some(vec![a, b])
        }
        GeometryKind::Circle => {
            let center = pos(*geometry.points.first()?)?;
            let rim = pos(*geometry.points.get(1)?)?;
            let (radius, start_angle) =
                cartesian_to_polar([rim[0] - center[0], rim[1] - center[1]]);
            if radius < EPSILON {
                return None;
            }
            Some(sample_arc(center, radius, start_angle, 2.0 * PI, curve_resolution))
        }
        GeometryKind::Arc => {
            let center = pos(*geometry.points.first()?)?;
            let start = pos(*geometry.points.get(1)?)?;
            let end = pos(*geometry.points.get(2)?)?;

            let (radius, a0) = cartesian_to_polar([start[0] - center[0], start[1] - center[1]]);
            let (_, a1) = cartesian_to_polar([end[0] - center[0], end[1] - center[1]]);
            if radius < EPSILON {
                return None;
            }

            // CCW sweep in (0, 2π]; coincident endpoints mean a full circle.
            let mut sweep = a1 - a0;
            while sweep <= EPSILON {
                sweep += 2.0 * PI;
            }

            let mut pts = sample_arc(center, radius, a0, sweep, curve_resolution);
            // Snap the endpoints to the solved points so chaining keys match.
            if let Some(first) = pts.first_mut() {
                *first = start;
            }
            if let Some(last) = pts.last_mut() {
                *last = end;
            }
            Some(pts)
        }
    }
}

/// Sample an arc of `sweep` radians starting at `start_angle`. Sample count
/// scales with the swept fraction of the resolution, floored at
/// MIN_ARC_SAMPLES.
fn sample_arc(
    center: [f64; 2],
    radius: f64,
    start_angle: f64,
    sweep: f64,
    curve_resolution: usize,
) -> Vec<[f64; 2]> {
    let scaled = (curve_resolution as f64 * sweep / (2.0 * PI)).floor() as usize;
    let samples = scaled.max(MIN_ARC_SAMPLES);

    let mut pts = Vec::with_capacity(samples + 1);
    for i in 0..=samples {
        let angle = start_angle + sweep * (i as f64 / samples as f64);
        pts.push([
            center[0] + radius * angle.cos(),
            center[1] + radius * angle.sin(),
        ]);
    }
    pts
}

fn key(p: [f64; 2]) -> (i64, i64) {
    (
        (p[0] * KEY_SCALE).round() as i64,
        (p[1] * KEY_SCALE).round() as i64,
    )
}

/// Join segments head-to-tail into closed rings.
///
/// Starting from any unused segment, the chain greedily extends forward by
/// any unused segment whose endpoint matches the current tail (reversing as
/// needed), then backward from the head the same way. Chains are closed if
/// they are not already, consecutive duplicates are dropped, and
/// near-collinear vertices are stripped.
pub fn chain_segments(segments: &[Segment]) -> Vec<Ring> {
    let mut used = vec![false; segments.len()];
    let mut rings = Vec::new();

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;

        let mut points = segments[start].points.clone();
        let mut ids: BTreeSet<u64> = BTreeSet::new();
        ids.insert(segments[start].geometry_id);

        // Forward from the tail.
        loop {
            if points.len() > 1 && key(points[0]) == key(*points.last().unwrap()) {
                break;
            }
            let tail = key(*points.last().unwrap());
            let Some((idx, reversed)) = find_extension(segments, &used, tail) else {
                break;
            };
            used[idx] = true;
            ids.insert(segments[idx].geometry_id);
            append_segment(&mut points, &segments[idx].points, reversed);
        }

        // Backward from the head.
        loop {
            if points.len() > 1 && key(points[0]) == key(*points.last().unwrap()) {
                break;
            }
            let head = key(points[0]);
            let Some((idx, reversed)) = find_extension(segments, &used, head) else {
                break;
            };
            used[idx] = true;
            ids.insert(segments[idx].geometry_id);
            prepend_segment(&mut points, &segments[idx].points, reversed);
        }

        dedup_consecutive(&mut points);

        // Close the chain: an exactly closed chain drops its duplicate tail,
        // an open one is closed implicitly.
        if points.len() > 1 && key(points[0]) == key(*points.last().unwrap()) {
            points.pop();
        }

        strip_collinear(&mut points);

        if points.len() >= 3 {
            rings.push(Ring {
                points,
                geometry_ids: ids,
            });
        } else {
            debug!(segment = start, "dropping degenerate chain");
        }
    }

    rings
}

/// Find an unused segment starting (or, reversed, ending) at `at`.
fn find_extension(segments: &[Segment], used: &[bool], at: (i64, i64)) -> Option<(usize, bool)> {
    for (idx, segment) in segments.iter().enumerate() {
        if used[idx] || segment.points.len() < 2 {
            continue;
        }
        if key(segment.points[0]) == at {
            return Some((idx, false));
        }
        if key(*segment.points.last().unwrap()) == at {
            return Some((idx, true));
        }
    }
    None
}

fn append_segment(points: &mut Vec<[f64; 2]>, extension: &[[f64; 2]], reversed: bool) {
    if reversed {
        points.extend(extension.iter().rev().skip(1).copied());
    } else {
        points.extend(extension.iter().skip(1).copied());
    }
}

fn prepend_segment(points: &mut Vec<[f64; 2]>, extension: &[[f64; 2]], reversed: bool) {
    // The extension meets the chain head: keep everything except its
    // matching endpoint.
    let mut prefix: Vec<[f64; 2]> = if reversed {
        // Segment ends at the head: its end joins the chain, keep the rest
        // in order.
        extension[..extension.len() - 1].to_vec()
    } else {
        // Segment starts at the head: flip it so its start lands last.
        extension.iter().skip(1).rev().copied().collect()
    };
    prefix.extend(points.iter().copied());
    *points = prefix;
}

fn dedup_consecutive(points: &mut Vec<[f64; 2]>) {
    points.dedup_by(|a, b| key(*a) == key(*b));
}

fn strip_collinear(points: &mut Vec<[f64; 2]>) {
    if points.len() < 3 {
        return;
    }
    let mut result: Vec<[f64; 2]> = Vec::with_capacity(points.len());
    let n = points.len();
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let here = points[i];
        let next = points[(i + 1) % n];
        let cross = cross_2d(
            [here[0] - prev[0], here[1] - prev[1]],
            [next[0] - here[0], next[1] - here[1]],
        );
        if cross.abs() > COLLINEAR_EPSILON {
            result.push(here);
        }
    }
    if result.len() >= 3 {
        *points = result;
    }
}

/// Classify rings by nesting parity and pair holes with their enclosing
/// outer loops. Winding is normalized for the triangulator: outer loops
/// clockwise, holes counter-clockwise.
pub fn classify_rings(rings: Vec<Ring>) -> Vec<ProfileLoops> {
    let rings: Vec<Ring> = rings
        .into_iter()
        .filter(|r| r.signed_area().abs() > AREA_EPSILON)
        .collect();

    let representatives: Vec<[f64; 2]> = rings.iter().map(Ring::representative).collect();

    // Nesting depth: how many other rings contain this ring's representative.
    let depth: Vec<usize> = (0..rings.len())
        .map(|i| {
            (0..rings.len())
                .filter(|&j| j != i && point_in_polygon(representatives[i], &rings[j].points))
                .count()
        })
        .collect();

    let mut outers: Vec<(usize, Ring)> = Vec::new();
    let mut holes: Vec<(usize, Ring)> = Vec::new();
    for (i, ring) in rings.into_iter().enumerate() {
        if depth[i] % 2 == 0 {
            outers.push((i, ring));
        } else {
            holes.push((i, ring));
        }
    }

    let mut groups: Vec<(usize, ProfileLoops)> = outers
        .into_iter()
        .map(|(i, mut outer)| {
            // Outer loops are wound clockwise for the triangulator.
            if outer.signed_area() > 0.0 {
                outer.reverse();
            }
            (i, ProfileLoops { outer, holes: Vec::new() })
        })
        .collect();

    for (hole_idx, mut hole) in holes {
        let rep = representatives[hole_idx];

        // The innermost enclosing outer: among containing outers, the one
        // nested deepest; ties break toward the smallest area.
        let mut best: Option<usize> = None;
        for (slot, (outer_idx, group)) in groups.iter().enumerate() {
            if !point_in_polygon(rep, &group.outer.points) {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => {
                    let (cur_idx, cur_group) = &groups[current];
                    depth[*outer_idx] > depth[*cur_idx]
                        || (depth[*outer_idx] == depth[*cur_idx]
                            && group.outer.signed_area().abs()
                                < cur_group.outer.signed_area().abs())
                }
            };
            if better {
                best = Some(slot);
            }
        }

        if let Some(slot) = best {
            // Holes are wound counter-clockwise.
            if hole.signed_area() < 0.0 {
                hole.reverse();
            }
            groups[slot].1.holes.push(hole);
        } else {
            debug!("hole ring without an enclosing outer; dropped");
        }
    }

    groups.into_iter().map(|(_, group)| group).collect()
}

/// Convenience wrapper: materialize, chain, classify.
pub fn build_profile_loops(sketch: &Sketch, curve_resolution: usize) -> Vec<ProfileLoops> {
    let segments = materialize_segments(sketch, curve_resolution);
    let rings = chain_segments(&segments);
    classify_rings(rings)
}
