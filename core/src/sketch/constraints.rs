//! Constraint catalog: one local relaxation routine per constraint kind.
//!
//! Each routine is a projection operator over a small tuple of points. It
//! may only move the points it receives (respecting `fixed` pins), may read
//! the constraint list to detect prior horizontal/vertical/distance pins on
//! the involved segments, and records failures on the constraint's `error`
//! field. Routines never abort the solve.

use super::types::{Constraint, ConstraintKind, ConstraintState, Scalar, Sketch};
use crate::geometry::utils_2d::{
    closest_point_on_line, distance, midpoint, normalize_deg, rotate_about, segment_angle_deg,
    shortest_delta_deg, EPSILON,
};
use rand::{rngs::StdRng, Rng};

/// Maximum rotation applied by the angle family per iteration, in degrees.
pub const MAX_ANGLE_STEP_DEG: f64 = 1.5;

/// Residual below which a dimensional constraint counts as satisfied.
pub const LINEAR_TOL: f64 = 1e-3;

/// Residual below which an angular constraint counts as satisfied (degrees).
pub const ANGLE_TOL_DEG: f64 = 0.6;

/// Apply one constraint to the sketch. Dispatch never fails: missing point
/// references mark the constraint and leave the geometry untouched.
pub(crate) fn apply(sketch: &mut Sketch, constraint_id: u64, rng: &mut StdRng) {
    let Some(c) = sketch.constraints.get(&constraint_id).cloned() else {
        return;
    };

    if c.points.len() != c.kind.arity() || c.points.iter().any(|id| !sketch.points.contains_key(id)) {
        fail(sketch, constraint_id, ConstraintState::MissingReference, "missing point reference");
        return;
    }

    match c.kind {
        ConstraintKind::Ground => {
            sketch.set_fixed(c.points[0], true);
        }
        ConstraintKind::Coincident => apply_coincident(sketch, &c),
        ConstraintKind::Horizontal => {
            if let Some((state, msg)) = equalize_axis(sketch, c.points[0], c.points[1], 1) {
                fail(sketch, c.id, state, &msg);
            }
        }
        ConstraintKind::Vertical => {
            if let Some((state, msg)) = equalize_axis(sketch, c.points[0], c.points[1], 0) {
                fail(sketch, c.id, state, &msg);
            }
        }
        ConstraintKind::Distance => apply_distance(sketch, &c),
        ConstraintKind::EqualLength => apply_equal_length(sketch, &c),
        ConstraintKind::Parallel => apply_parallel(sketch, &c, rng),
        ConstraintKind::Perpendicular | ConstraintKind::Tangent => {
            // Tangent is currently a degenerate alias of perpendicular.
            apply_perpendicular(sketch, &c, rng)
        }
        ConstraintKind::Angle => apply_angle(sketch, &c, rng),
        ConstraintKind::PointOnLine => apply_point_on_line(sketch, &c),
        ConstraintKind::Midpoint => apply_midpoint(sketch, &c),
    }
}

fn fail(sketch: &mut Sketch, id: u64, state: ConstraintState, message: &str) {
    if let Some(live) = sketch.constraints.get_mut(&id) {
        live.status = state;
        live.error = Some(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// Pin helpers
// ---------------------------------------------------------------------------

fn covers_pair(c: &Constraint, a: u64, b: u64) -> bool {
    c.points.len() == 2
        && ((c.points[0] == a && c.points[1] == b) || (c.points[0] == b && c.points[1] == a))
}

/// Horizontal or Vertical constraint covering exactly this point pair.
pub(crate) fn segment_axis_lock(sketch: &Sketch, a: u64, b: u64) -> Option<ConstraintKind> {
    sketch.constraints.values().find_map(|c| {
        let locked = matches!(c.kind, ConstraintKind::Horizontal | ConstraintKind::Vertical)
            && covers_pair(c, a, b);
        locked.then_some(c.kind)
    })
}

/// Value of an explicit distance constraint on this point pair, if any.
pub(crate) fn segment_distance_value(sketch: &Sketch, a: u64, b: u64) -> Option<f64> {
    sketch.constraints.values().find_map(|c| {
        if c.kind == ConstraintKind::Distance && covers_pair(c, a, b) {
            c.value_num()
        } else {
            None
        }
    })
}

/// A segment can be rotated unless an axis lock or a fully pinned endpoint
/// pair forbids it.
fn segment_rotatable(sketch: &Sketch, a: u64, b: u64) -> bool {
    segment_axis_lock(sketch, a, b).is_none() && !(sketch.is_fixed(a) && sketch.is_fixed(b))
}

// ---------------------------------------------------------------------------
// Routines
// ---------------------------------------------------------------------------

fn apply_coincident(sketch: &mut Sketch, c: &Constraint) {
    let (a, b) = (c.points[0], c.points[1]);
    let (pa, pb) = (sketch.point_pos(a).unwrap(), sketch.point_pos(b).unwrap());

    match (sketch.is_fixed(a), sketch.is_fixed(b)) {
        (false, false) => {
            let mid = midpoint(pa, pb);
            sketch.set_point_pos(a, mid);
            sketch.set_point_pos(b, mid);
        }
        // Coincidence with a pinned point pins the pair.
        (true, false) => {
            sketch.set_point_pos(b, pa);
            sketch.set_fixed(b, true);
        }
        (false, true) => {
            sketch.set_point_pos(a, pb);
            sketch.set_fixed(a, true);
        }
        (true, true) => {
            if distance(pa, pb) > EPSILON && sketch.is_grounded(a) && sketch.is_grounded(b) {
                fail(
                    sketch,
                    c.id,
                    ConstraintState::OverConstrained,
                    "both points are grounded at different positions",
                );
            }
        }
    }
}

/// Equalize one coordinate axis across two points (axis 0 = x, 1 = y).
/// Returns a failure when both points are pinned apart.
fn equalize_axis(sketch: &mut Sketch, a: u64, b: u64, axis: usize) -> Option<(ConstraintState, String)> {
    let mut pa = sketch.point_pos(a)?;
    let mut pb = sketch.point_pos(b)?;

    match (sketch.is_fixed(a), sketch.is_fixed(b)) {
        (false, false) => {
            let avg = (pa[axis] + pb[axis]) * 0.5;
            pa[axis] = avg;
            pb[axis] = avg;
            sketch.set_point_pos(a, pa);
            sketch.set_point_pos(b, pb);
        }
        (true, false) => {
            pb[axis] = pa[axis];
            sketch.set_point_pos(b, pb);
        }
        (false, true) => {
            pa[axis] = pb[axis];
            sketch.set_point_pos(a, pa);
        }
        (true, true) => {
            if (pa[axis] - pb[axis]).abs() > EPSILON {
                let label = if axis == 0 { "x" } else { "y" };
                return Some((
                    ConstraintState::OverConstrained,
                    format!("both points are pinned with different {} coordinates", label),
                ));
            }
        }
    }
    None
}

fn apply_distance(sketch: &mut Sketch, c: &Constraint) {
    let (a, b) = (c.points[0], c.points[1]);

    let target = match &c.value {
        None => {
            // Seed the dimension from the current separation.
            let seeded = distance(sketch.point_pos(a).unwrap(), sketch.point_pos(b).unwrap());
            if let Some(live) = sketch.constraints.get_mut(&c.id) {
                live.value = Some(Scalar::Num(seeded));
            }
            return;
        }
        // An unresolved expression is present but not usable; leave it for
        // the expression pass rather than seeding over it.
        Some(value) => match value.as_num() {
            Some(v) => v,
            None => return,
        },
    };

    if let Some((state, msg)) = project_distance(sketch, a, b, target) {
        fail(sketch, c.id, state, &msg);
    }
}

/// Drive |a - b| toward `target`, respecting pins. The shared projection core
/// for distance, equal-length and midpoint.
fn project_distance(
    sketch: &mut Sketch,
    a: u64,
    b: u64,
    target: f64,
) -> Option<(ConstraintState, String)> {
    let pa = sketch.point_pos(a)?;
    let pb = sketch.point_pos(b)?;
    let current = distance(pa, pb);

    match (sketch.is_fixed(a), sketch.is_fixed(b)) {
        (true, true) => {
            if (current - target).abs() > LINEAR_TOL {
                return Some((
                    ConstraintState::OverConstrained,
                    "both points are pinned at a different separation".to_string(),
                ));
            }
        }
        (false, false) => {
            if current > EPSILON {
                let scale = 0.5 * (1.0 - target / current);
                let offset = [(pb[0] - pa[0]) * scale, (pb[1] - pa[1]) * scale];
                sketch.set_point_pos(a, [pa[0] + offset[0], pa[1] + offset[1]]);
                sketch.set_point_pos(b, [pb[0] - offset[0], pb[1] - offset[1]]);
            } else if target > EPSILON {
                // Coincident points with a nonzero target: separate along x.
                let mid = midpoint(pa, pb);
                let half = target * 0.5;
                sketch.set_point_pos(a, [mid[0] - half, mid[1]]);
                sketch.set_point_pos(b, [mid[0] + half, mid[1]]);
            }
        }
        (fixed_a, _) => {
            let (anchor, moved, pm) = if fixed_a { (pa, b, pb) } else { (pb, a, pa) };
            if current > EPSILON {
                let t = target / current;
                sketch.set_point_pos(
                    moved,
                    [
                        anchor[0] + (pm[0] - anchor[0]) * t,
                        anchor[1] + (pm[1] - anchor[1]) * t,
                    ],
                );
            } else if target > EPSILON {
                sketch.set_point_pos(moved, [anchor[0] + target, anchor[1]]);
            }
        }
    }
    None
}

fn apply_equal_length(sketch: &mut Sketch, c: &Constraint) {
    let (a0, a1, b0, b1) = (c.points[0], c.points[1], c.points[2], c.points[3]);

    let dim_a = segment_distance_value(sketch, a0, a1);
    let dim_b = segment_distance_value(sketch, b0, b1);

    match (dim_a, dim_b) {
        (Some(va), Some(vb)) => {
            // Two independent dimensions already govern the segments.
            if (va - vb).abs() > LINEAR_TOL {
                fail(
                    sketch,
                    c.id,
                    ConstraintState::OverConstrained,
                    "both segments carry conflicting distance dimensions",
                );
            }
        }
        (Some(v), None) => {
            if let Some((state, msg)) = project_distance(sketch, b0, b1, v) {
                fail(sketch, c.id, state, &msg);
            }
        }
        (None, Some(v)) => {
            if let Some((state, msg)) = project_distance(sketch, a0, a1, v) {
                fail(sketch, c.id, state, &msg);
            }
        }
        (None, None) => {
            let la = distance(sketch.point_pos(a0).unwrap(), sketch.point_pos(a1).unwrap());
            let lb = distance(sketch.point_pos(b0).unwrap(), sketch.point_pos(b1).unwrap());
            let avg = (la + lb) * 0.5;
            let first = project_distance(sketch, a0, a1, avg);
            let second = project_distance(sketch, b0, b1, avg);
            if let Some((state, msg)) = first.or(second) {
                fail(sketch, c.id, state, &msg);
            }
        }
    }
}

fn apply_angle(sketch: &mut Sketch, c: &Constraint, rng: &mut StdRng) {
    let (a0, a1) = (c.points[0], c.points[1]);
    let (mut b0, mut b1) = (c.points[2], c.points[3]);

    let current = directed_angle(sketch, a0, a1, b0, b1);

    let mut value = match &c.value {
        None => {
            // Seed from the current geometry.
            if let Some(live) = sketch.constraints.get_mut(&c.id) {
                live.value = Some(Scalar::Num(current));
            }
            return;
        }
        Some(value) => match value.as_num() {
            Some(v) => v,
            // Unresolved expression: leave it for the expression pass.
            None => return,
        },
    };

    if value < 0.0 {
        // Canonicalize: flip the second segment and take the magnitude.
        value = value.abs();
        std::mem::swap(&mut b0, &mut b1);
        if let Some(live) = sketch.constraints.get_mut(&c.id) {
            live.points = vec![a0, a1, b0, b1];
            live.value = Some(Scalar::Num(value));
        }
    }

    let current = directed_angle(sketch, a0, a1, b0, b1);
    drive_angle(sketch, [a0, a1, b0, b1], current, normalize_deg(value), rng);
}

fn apply_parallel(sketch: &mut Sketch, c: &Constraint, rng: &mut StdRng) {
    let (a0, a1, b0, b1) = (c.points[0], c.points[1], c.points[2], c.points[3]);

    if propagate_axis_lock(sketch, c, false) {
        return;
    }

    // Empirical nearest-multiple-of-180 ladder, preserved for behavioral
    // compatibility.
    let current = directed_angle(sketch, a0, a1, b0, b1);
    let target = if current < 90.0 {
        0.0
    } else if current < 270.0 {
        180.0
    } else {
        360.0
    };

    drive_angle(sketch, [a0, a1, b0, b1], current, normalize_deg(target), rng);
}

fn apply_perpendicular(sketch: &mut Sketch, c: &Constraint, rng: &mut StdRng) {
    let (a0, a1, b0, b1) = (c.points[0], c.points[1], c.points[2], c.points[3]);

    if propagate_axis_lock(sketch, c, true) {
        return;
    }

    let current = directed_angle(sketch, a0, a1, b0, b1);
    let target = if current < 180.0 { 90.0 } else { 270.0 };

    // Orient the first segment so the achievable rotation is the smaller one.
    let flipped = normalize_deg(current + 180.0);
    let effective = if shortest_delta_deg(flipped, target).abs()
        < shortest_delta_deg(current, target).abs()
    {
        flipped
    } else {
        current
    };

    drive_angle(sketch, [a0, a1, b0, b1], effective, target, rng);
}

/// Shared horizontal/vertical propagation for parallel and perpendicular.
/// When one segment is axis-locked the other is projected onto the same
/// (or, for perpendicular, the crossing) axis. Returns true when handled.
fn propagate_axis_lock(sketch: &mut Sketch, c: &Constraint, crossing: bool) -> bool {
    let (a0, a1, b0, b1) = (c.points[0], c.points[1], c.points[2], c.points[3]);

    let lock_a = segment_axis_lock(sketch, a0, a1);
    let lock_b = segment_axis_lock(sketch, b0, b1);

    let project = |kind: ConstraintKind, crossing: bool| -> usize {
        let horizontal = kind == ConstraintKind::Horizontal;
        // Horizontal equalizes y (axis 1); vertical equalizes x (axis 0).
        // A crossing projection flips the axis.
        if horizontal != crossing {
            1
        } else {
            0
        }
    };

    if let Some(kind) = lock_a {
        let axis = project(kind, crossing);
        if let Some((state, msg)) = equalize_axis(sketch, b0, b1, axis) {
            fail(sketch, c.id, state, &msg);
        }
        return true;
    }
    if let Some(kind) = lock_b {
        let axis = project(kind, crossing);
        if let Some((state, msg)) = equalize_axis(sketch, a0, a1, axis) {
            fail(sketch, c.id, state, &msg);
        }
        return true;
    }
    false
}

/// Directed angle from segment (a0,a1) to segment (b0,b1), degrees [0, 360).
fn directed_angle(sketch: &Sketch, a0: u64, a1: u64, b0: u64, b1: u64) -> f64 {
    let ang_a = segment_angle_deg(
        sketch.point_pos(a0).unwrap(),
        sketch.point_pos(a1).unwrap(),
    );
    let ang_b = segment_angle_deg(
        sketch.point_pos(b0).unwrap(),
        sketch.point_pos(b1).unwrap(),
    );
    normalize_deg(ang_b - ang_a)
}

/// Rotate the free segments so the directed angle moves from `current`
/// toward `target`, clamped to MAX_ANGLE_STEP_DEG per iteration.
fn drive_angle(sketch: &mut Sketch, seg: [u64; 4], current: f64, target: f64, rng: &mut StdRng) {
    let delta = shortest_delta_deg(current, target);
    if delta.abs() < 1e-9 {
        return;
    }

    let step = delta.clamp(-MAX_ANGLE_STEP_DEG, MAX_ANGLE_STEP_DEG);

    let [a0, a1, b0, b1] = seg;
    let a_free = segment_rotatable(sketch, a0, a1);
    let b_free = segment_rotatable(sketch, b0, b1);

    // Increasing the directed angle rotates B forward or A backward.
    match (a_free, b_free) {
        (true, true) => {
            rotate_segment(sketch, a0, a1, -step * 0.5, rng);
            rotate_segment(sketch, b0, b1, step * 0.5, rng);
        }
        (true, false) => rotate_segment(sketch, a0, a1, -step, rng),
        (false, true) => rotate_segment(sketch, b0, b1, step, rng),
        (false, false) => {}
    }
}

/// Rotate a segment by `deg`, pivoting on a pinned endpoint when there is
/// one and on an unbiased random endpoint otherwise.
fn rotate_segment(sketch: &mut Sketch, a: u64, b: u64, deg: f64, rng: &mut StdRng) {
    let pa = sketch.point_pos(a).unwrap();
    let pb = sketch.point_pos(b).unwrap();

    match (sketch.is_fixed(a), sketch.is_fixed(b)) {
        (true, true) => {}
        (true, false) => sketch.set_point_pos(b, rotate_about(pa, pb, deg)),
        (false, true) => sketch.set_point_pos(a, rotate_about(pb, pa, deg)),
        (false, false) => {
            if rng.gen_bool(0.5) {
                sketch.set_point_pos(b, rotate_about(pa, pb, deg));
            } else {
                sketch.set_point_pos(a, rotate_about(pb, pa, deg));
            }
        }
    }
}

fn apply_point_on_line(sketch: &mut Sketch, c: &Constraint) {
    let (la, lb, p) = (c.points[0], c.points[1], c.points[2]);

    // An axis-locked line reduces to the simpler coordinate projection.
    match segment_axis_lock(sketch, la, lb) {
        Some(ConstraintKind::Horizontal) => {
            project_onto_axis_line(sketch, la, lb, p, 1);
            return;
        }
        Some(ConstraintKind::Vertical) => {
            project_onto_axis_line(sketch, la, lb, p, 0);
            return;
        }
        _ => {}
    }

    let pa = sketch.point_pos(la).unwrap();
    let pb = sketch.point_pos(lb).unwrap();
    let pp = sketch.point_pos(p).unwrap();

    if distance(pa, pb) < EPSILON {
        return;
    }

    let proj = closest_point_on_line(pa, pb, pp);
    let shift = [proj[0] - pp[0], proj[1] - pp[1]];
    if shift[0].abs() < EPSILON && shift[1].abs() < EPSILON {
        return;
    }

    let p_free = !sketch.is_fixed(p);
    let a_free = !sketch.is_fixed(la);
    let b_free = !sketch.is_fixed(lb);

    if p_free && (a_free || b_free) {
        // Split the correction between the point and the line.
        sketch.set_point_pos(p, [pp[0] + shift[0] * 0.5, pp[1] + shift[1] * 0.5]);
        if a_free {
            sketch.set_point_pos(la, [pa[0] - shift[0] * 0.5, pa[1] - shift[1] * 0.5]);
        }
        if b_free {
            sketch.set_point_pos(lb, [pb[0] - shift[0] * 0.5, pb[1] - shift[1] * 0.5]);
        }
    } else if p_free {
        sketch.set_point_pos(p, proj);
    } else if a_free || b_free {
        if a_free {
            sketch.set_point_pos(la, [pa[0] - shift[0], pa[1] - shift[1]]);
        }
        if b_free {
            sketch.set_point_pos(lb, [pb[0] - shift[0], pb[1] - shift[1]]);
        }
    } else if distance(pp, proj) > LINEAR_TOL {
        fail(
            sketch,
            c.id,
            ConstraintState::OverConstrained,
            "point and line are pinned apart",
        );
    }
}

/// Point-on-line against an axis-locked line: equalize the off-axis
/// coordinate of the point with the line.
fn project_onto_axis_line(sketch: &mut Sketch, la: u64, lb: u64, p: u64, axis: usize) {
    let pa = sketch.point_pos(la).unwrap();
    let pb = sketch.point_pos(lb).unwrap();
    let mut pp = sketch.point_pos(p).unwrap();

    let line_coord = (pa[axis] + pb[axis]) * 0.5;

    if !sketch.is_fixed(p) {
        pp[axis] = line_coord;
        sketch.set_point_pos(p, pp);
        return;
    }

    // Pinned point: shift the free line endpoints onto it instead.
    let delta = pp[axis] - line_coord;
    for (id, mut pos) in [(la, pa), (lb, pb)] {
        if !sketch.is_fixed(id) {
            pos[axis] += delta;
            sketch.set_point_pos(id, pos);
        }
    }
}

fn apply_midpoint(sketch: &mut Sketch, c: &Constraint) {
    let (a, b, m) = (c.points[0], c.points[1], c.points[2]);

    // Chord length captured at entry; the endpoint-to-midpoint projections
    // shrink it, the final projection restores it.
    let chord = distance(sketch.point_pos(a).unwrap(), sketch.point_pos(b).unwrap());
    if chord < EPSILON {
        return;
    }

    let half = chord * 0.5;
    let first = project_distance(sketch, a, m, half);
    let second = project_distance(sketch, b, m, half);
    let third = project_distance(sketch, a, b, chord);

    if let Some((state, msg)) = first.or(second).or(third) {
        fail(sketch, c.id, state, &msg);
    }
}

// ---------------------------------------------------------------------------
// Residuals
// ---------------------------------------------------------------------------

/// Residual error of a constraint against the current point set, in the
/// kind's natural units (world units or degrees). None when references are
/// missing or the kind has no measurable residual.
pub(crate) fn residual(sketch: &Sketch, c: &Constraint) -> Option<f64> {
    if c.points.len() != c.kind.arity() || c.points.iter().any(|id| !sketch.points.contains_key(id)) {
        return None;
    }
    let pos = |id: u64| sketch.point_pos(id).unwrap();

    let value = match c.kind {
        ConstraintKind::Ground => 0.0,
        ConstraintKind::Coincident => distance(pos(c.points[0]), pos(c.points[1])),
        ConstraintKind::Horizontal => (pos(c.points[0])[1] - pos(c.points[1])[1]).abs(),
        ConstraintKind::Vertical => (pos(c.points[0])[0] - pos(c.points[1])[0]).abs(),
        ConstraintKind::Distance => {
            let target = c.value_num()?;
            (distance(pos(c.points[0]), pos(c.points[1])) - target).abs()
        }
        ConstraintKind::EqualLength => {
            let la = distance(pos(c.points[0]), pos(c.points[1]));
            let lb = distance(pos(c.points[2]), pos(c.points[3]));
            (la - lb).abs()
        }
        ConstraintKind::PointOnLine => crate::geometry::utils_2d::distance_point_to_line(
            pos(c.points[0]),
            pos(c.points[1]),
            pos(c.points[2]),
        ),
        ConstraintKind::Midpoint => {
            let mid = midpoint(pos(c.points[0]), pos(c.points[1]));
            distance(mid, pos(c.points[2]))
        }
        ConstraintKind::Angle => {
            let target = c.value_num()?;
            let current = directed_angle(sketch, c.points[0], c.points[1], c.points[2], c.points[3]);
            shortest_delta_deg(current, target).abs()
        }
        ConstraintKind::Parallel => {
            let current = directed_angle(sketch, c.points[0], c.points[1], c.points[2], c.points[3]);
            shortest_delta_deg(current, 0.0)
                .abs()
                .min(shortest_delta_deg(current, 180.0).abs())
        }
        ConstraintKind::Perpendicular | ConstraintKind::Tangent => {
            let current = directed_angle(sketch, c.points[0], c.points[1], c.points[2], c.points[3]);
            shortest_delta_deg(current, 90.0)
                .abs()
                .min(shortest_delta_deg(current, 270.0).abs())
        }
    };

    Some(value)
}

/// Tolerance against which a kind's residual is judged.
pub(crate) fn residual_tolerance(kind: ConstraintKind) -> f64 {
    match kind {
        ConstraintKind::Angle
        | ConstraintKind::Parallel
        | ConstraintKind::Perpendicular
        | ConstraintKind::Tangent => ANGLE_TOL_DEG,
        _ => LINEAR_TOL,
    }
}
