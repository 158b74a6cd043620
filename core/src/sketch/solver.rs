//! Snapshot-based iterative constraint engine.
//!
//! The engine clones the input document, relaxes it under a fixed ordering
//! of constraint kinds, and declares convergence when a full iteration
//! leaves the rounded point set untouched. It is total: per-constraint
//! failures are recorded on the constraints, never raised.

use super::constraints;
use super::types::{Constraint, ConstraintKind, ConstraintState, Sketch};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Iteration cap used for both the default and the "full" budget.
pub const MAX_ITERATIONS: usize = 500;

/// Maximum distance any point may travel per iteration.
pub const MAX_STEP: f64 = 0.5;

const ROUND_SCALE: f64 = 1e6;

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// None selects the full cap.
    pub max_iterations: Option<usize>,
    /// Seed for the angle constraint's pivot tiebreak. Fixed by default so
    /// runs are reproducible; tests may pin it explicitly.
    pub rng_seed: u64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: None,
            rng_seed: 0,
        }
    }
}

/// Result of a solve, including the mutated document copy.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub sketch: Sketch,
    pub converged: bool,
    pub iterations: usize,
}

/// Convergence summary without the document, for callers that swap the
/// sketch back in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub converged: bool,
    pub iterations: usize,
}

impl SolveOutcome {
    pub fn report(&self) -> SolveReport {
        SolveReport {
            converged: self.converged,
            iterations: self.iterations,
        }
    }
}

/// Per-iteration walk over constraint kinds. The trailing distance and
/// equal-length repeats are an empirically tuned convergence aid.
const KIND_WALK: [ConstraintKind; 13] = [
    ConstraintKind::Horizontal,
    ConstraintKind::Vertical,
    ConstraintKind::PointOnLine,
    ConstraintKind::Midpoint,
    ConstraintKind::Distance,
    ConstraintKind::EqualLength,
    ConstraintKind::Angle,
    ConstraintKind::Perpendicular,
    ConstraintKind::Parallel,
    ConstraintKind::Distance,
    ConstraintKind::EqualLength,
    ConstraintKind::Distance,
    ConstraintKind::EqualLength,
];

/// Run the relaxation engine over a copy of `input`.
pub fn solve(input: &Sketch, options: &SolveOptions) -> SolveOutcome {
    let mut sketch = input.clone();
    let mut rng = StdRng::seed_from_u64(options.rng_seed);
    let cap = options.max_iterations.unwrap_or(MAX_ITERATIONS).max(1);

    for c in sketch.constraints.values_mut() {
        c.status = ConstraintState::Unknown;
        c.error = None;
    }

    let temporaries = synthesize_arc_ties(&mut sketch);

    // The first hygiene pass resets pins; ground constraints re-establish
    // them. Later passes leave pins alone so routines can pin mid-solve.
    hygiene(&mut sketch, true);
    apply_kind(&mut sketch, ConstraintKind::Ground, &mut rng);

    // One pass over every constraint in document order.
    let all_ids: Vec<u64> = sketch.constraints.keys().copied().collect();
    for id in all_ids {
        constraints::apply(&mut sketch, id, &mut rng);
    }
    hygiene(&mut sketch, false);

    let mut converged = false;
    let mut iterations = 0;

    for _ in 0..cap {
        iterations += 1;
        let before = snapshot(&sketch);
        let start_positions = positions(&sketch);

        apply_kind(&mut sketch, ConstraintKind::Ground, &mut rng);

        for kind in KIND_WALK {
            apply_kind(&mut sketch, kind, &mut rng);
            // Re-anchor joints and axis alignments between kind passes.
            apply_kind(&mut sketch, ConstraintKind::Coincident, &mut rng);
            apply_kind(&mut sketch, ConstraintKind::Horizontal, &mut rng);
            apply_kind(&mut sketch, ConstraintKind::Vertical, &mut rng);
            hygiene(&mut sketch, false);
        }

        throttle(&mut sketch, &start_positions);
        hygiene(&mut sketch, false);

        if snapshot(&sketch) == before {
            converged = true;
            break;
        }
    }

    annotate_residuals(&mut sketch);

    for id in temporaries {
        sketch.constraints.remove(&id);
    }

    debug!(converged, iterations, "sketch solve finished");

    SolveOutcome {
        sketch,
        converged,
        iterations,
    }
}

/// Apply every constraint of one kind in document order. The perpendicular
/// pass also drives tangent constraints (currently an alias of it).
fn apply_kind(sketch: &mut Sketch, kind: ConstraintKind, rng: &mut StdRng) {
    let ids: Vec<u64> = sketch
        .constraints
        .values()
        .filter(|c| {
            c.kind == kind
                || (kind == ConstraintKind::Perpendicular && c.kind == ConstraintKind::Tangent)
        })
        .map(|c| c.id)
        .collect();
    for id in ids {
        constraints::apply(sketch, id, rng);
    }
}

/// Tie each arc's start and end radius together for the duration of the
/// solve. Returns the ids of the synthesized constraints.
fn synthesize_arc_ties(sketch: &mut Sketch) -> Vec<u64> {
    let arcs: Vec<[u64; 3]> = sketch
        .geometries
        .values()
        .filter(|g| g.kind == super::types::GeometryKind::Arc && g.points.len() == 3)
        .map(|g| [g.points[0], g.points[1], g.points[2]])
        .collect();

    let mut ids = Vec::with_capacity(arcs.len());
    for [center, start, end] in arcs {
        let id = sketch.next_constraint_id();
        let mut tie = Constraint::new(id, ConstraintKind::EqualLength, vec![center, start, center, end]);
        tie.temporary = true;
        sketch.constraints.insert(id, tie);
        ids.push(id);
    }
    ids
}

/// Coordinate hygiene: collapse unresolved expressions and non-finite
/// values to numbers, round to 6 decimals, optionally reset pins.
fn hygiene(sketch: &mut Sketch, reset_fixed: bool) {
    for point in sketch.points.values_mut() {
        let pos = [round6(point.x.coerce()), round6(point.y.coerce())];
        point.set_pos(pos);
        if reset_fixed {
            point.fixed = false;
        }
    }
}

fn round6(v: f64) -> f64 {
    (v * ROUND_SCALE).round() / ROUND_SCALE
}

/// Serialized form of the point set for convergence detection. Exact after
/// the rounding pass.
fn snapshot(sketch: &Sketch) -> Vec<(u64, i64, i64)> {
    sketch
        .points
        .values()
        .map(|p| {
            let pos = p.pos();
            (
                p.id,
                (pos[0] * ROUND_SCALE).round() as i64,
                (pos[1] * ROUND_SCALE).round() as i64,
            )
        })
        .collect()
}

fn positions(sketch: &Sketch) -> HashMap<u64, [f64; 2]> {
    sketch.points.values().map(|p| (p.id, p.pos())).collect()
}

/// Clamp each point's displacement since the start of the iteration to
/// MAX_STEP. Prevents oscillation and runaway steps in under-constrained
/// systems.
fn throttle(sketch: &mut Sketch, start: &HashMap<u64, [f64; 2]>) {
    let clamped: Vec<(u64, [f64; 2])> = sketch
        .points
        .values()
        .filter_map(|p| {
            let from = start.get(&p.id)?;
            let to = p.pos();
            let dx = to[0] - from[0];
            let dy = to[1] - from[1];
            let dist = (dx * dx + dy * dy).sqrt();
            if dist > MAX_STEP {
                let scale = MAX_STEP / dist;
                Some((p.id, [from[0] + dx * scale, from[1] + dy * scale]))
            } else {
                None
            }
        })
        .collect();

    for (id, pos) in clamped {
        sketch.set_point_pos(id, pos);
    }
}

/// Final residual pass: grade every constraint that has not already been
/// flagged by a routine.
fn annotate_residuals(sketch: &mut Sketch) {
    let graded: Vec<(u64, ConstraintState, Option<String>)> = sketch
        .constraints
        .values()
        .filter(|c| !c.temporary && c.status == ConstraintState::Unknown)
        .filter_map(|c| match constraints::residual(sketch, c) {
            Some(r) if r <= constraints::residual_tolerance(c.kind) => {
                Some((c.id, ConstraintState::Satisfied, None))
            }
            Some(r) => Some((
                c.id,
                ConstraintState::Unsatisfied,
                Some(format!("residual {:.6} after solve", r)),
            )),
            None if c.points.iter().any(|id| !sketch.points.contains_key(id)) => Some((
                c.id,
                ConstraintState::MissingReference,
                Some("missing point reference".to_string()),
            )),
            // No measurable residual (e.g. an unresolved dimension); leave
            // the status alone.
            None => None,
        })
        .collect();

    for (id, status, error) in graded {
        if let Some(c) = sketch.constraints.get_mut(&id) {
            c.status = status;
            c.error = error;
        }
    }
}
