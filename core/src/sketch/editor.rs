//! Sketch solver facade: a plain owned object mediating every edit.
//!
//! The editor owns the mutable sketch document, validates edits against the
//! document invariants (existing references, arity, the surviving ground
//! constraint), cascades removals, builds composite figures, and invokes
//! the engine. Rejected edits return an error and change nothing.

use super::constraints::segment_axis_lock;
use super::solver::{solve, SolveOptions, SolveReport, MAX_ITERATIONS};
use super::types::{
    Constraint, ConstraintKind, DisplayStyle, Geometry, GeometryKind, Scalar, Sketch,
    ORIGIN_POINT_ID,
};
use crate::geometry::utils_2d::{
    distance, normalize_deg, segment_angle_deg, shortest_delta_deg,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SketchError {
    #[error("unknown point {0}")]
    UnknownPoint(u64),
    #[error("unknown geometry {0}")]
    UnknownGeometry(u64),
    #[error("unknown constraint {0}")]
    UnknownConstraint(u64),
    #[error("{kind:?} takes {expected} points, got {got}")]
    ArityMismatch {
        kind: ConstraintKind,
        expected: usize,
        got: usize,
    },
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("the sketch origin cannot be removed")]
    OriginProtected,
    #[error("removing this point would leave the sketch without a ground constraint")]
    GroundRequired,
}

/// Iteration budget accepted by [`SketchEditor::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveBudget {
    /// The default cap.
    #[default]
    Default,
    /// The full cap (same value as the default).
    Full,
    /// An explicit iteration count.
    Iterations(usize),
}

/// Geometry requested through [`SketchEditor::create_geometry`]. Rectangle
/// is a composite that expands into four joined lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryRequest {
    Line,
    Arc,
    Circle,
    Rectangle,
}

impl GeometryRequest {
    fn selection_count(&self) -> usize {
        match self {
            GeometryRequest::Line | GeometryRequest::Circle | GeometryRequest::Rectangle => 2,
            GeometryRequest::Arc => 3,
        }
    }
}

pub struct SketchEditor {
    sketch: Sketch,
    selection: Vec<u64>,
    pub options: SolveOptions,
}

impl Default for SketchEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl SketchEditor {
    pub fn new() -> Self {
        Self::from_sketch(Sketch::new())
    }

    pub fn from_sketch(sketch: Sketch) -> Self {
        Self {
            sketch,
            selection: Vec::new(),
            options: SolveOptions::default(),
        }
    }

    pub fn sketch(&self) -> &Sketch {
        &self.sketch
    }

    pub fn into_sketch(self) -> Sketch {
        self.sketch
    }

    /// Replace the current selection (point ids, in pick order). Stands in
    /// for the external selection provider.
    pub fn set_selection(&mut self, points: Vec<u64>) {
        self.selection = points;
    }

    // -----------------------------------------------------------------------
    // Points
    // -----------------------------------------------------------------------

    pub fn add_point(&mut self, x: f64, y: f64) -> u64 {
        let id = self.sketch.next_point_id();
        self.sketch
            .points
            .insert(id, super::types::Point::new(id, x, y));
        id
    }

    /// Remove a point, cascading to every geometry and constraint that
    /// references it. Refused for the origin and for the point holding the
    /// last ground constraint.
    pub fn remove_point(&mut self, id: u64) -> Result<(), SketchError> {
        if !self.sketch.points.contains_key(&id) {
            return Err(SketchError::UnknownPoint(id));
        }
        if id == ORIGIN_POINT_ID {
            return Err(SketchError::OriginProtected);
        }

        let grounds_here = self.sketch.grounds_on(id).len();
        if grounds_here > 0 && grounds_here == self.sketch.ground_count() {
            return Err(SketchError::GroundRequired);
        }

        let dead_geometries: Vec<u64> = self
            .sketch
            .geometries
            .values()
            .filter(|g| g.points.contains(&id))
            .map(|g| g.id)
            .collect();
        for gid in dead_geometries {
            let _ = self.remove_geometry(gid);
        }

        self.sketch
            .constraints
            .retain(|_, c| !c.points.contains(&id));
        self.sketch.points.remove(&id);
        self.selection.retain(|&pid| pid != id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Geometries
    // -----------------------------------------------------------------------

    pub fn add_geometry(
        &mut self,
        kind: GeometryKind,
        points: Vec<u64>,
    ) -> Result<u64, SketchError> {
        if points.len() != kind.point_count() {
            return Err(SketchError::InvalidSelection(format!(
                "{:?} geometry takes {} points, got {}",
                kind,
                kind.point_count(),
                points.len()
            )));
        }
        for pid in &points {
            if !self.sketch.points.contains_key(pid) {
                return Err(SketchError::UnknownPoint(*pid));
            }
        }
        let id = self.sketch.next_geometry_id();
        self.sketch.geometries.insert(id, Geometry::new(id, kind, points));
        Ok(id)
    }

    /// Remove a geometry along with the constraints tagged with its id.
    pub fn remove_geometry(&mut self, id: u64) -> Result<(), SketchError> {
        if self.sketch.geometries.remove(&id).is_none() {
            return Err(SketchError::UnknownGeometry(id));
        }
        self.sketch.constraints.retain(|_, c| c.geometry != Some(id));
        Ok(())
    }

    pub fn toggle_construction(&mut self, id: u64) -> Result<bool, SketchError> {
        let geometry = self
            .sketch
            .geometries
            .get_mut(&id)
            .ok_or(SketchError::UnknownGeometry(id))?;
        geometry.construction = !geometry.construction;
        Ok(geometry.construction)
    }

    /// Create a geometry from explicit point ids or the current selection.
    pub fn create_geometry(
        &mut self,
        request: GeometryRequest,
        points: Option<Vec<u64>>,
    ) -> Result<Vec<u64>, SketchError> {
        let points = match points {
            Some(points) => points,
            None => self.selection.clone(),
        };

        if points.len() != request.selection_count() {
            let err = SketchError::InvalidSelection(format!(
                "{:?} needs {} selected points, got {}",
                request,
                request.selection_count(),
                points.len()
            ));
            warn!(%err, "create_geometry rejected");
            return Err(err);
        }

        match request {
            GeometryRequest::Line => Ok(vec![self.add_geometry(GeometryKind::Line, points)?]),
            GeometryRequest::Circle => Ok(vec![self.add_geometry(GeometryKind::Circle, points)?]),
            GeometryRequest::Arc => Ok(vec![self.add_geometry(GeometryKind::Arc, points)?]),
            GeometryRequest::Rectangle => self.create_rectangle(points[0], points[1]),
        }
    }

    /// Build a rectangle between two diagonal corner points.
    ///
    /// Allocates six new points (a duplicate at each diagonal corner plus
    /// two at each derived corner), emits four lines, four coincident
    /// constraints and three perpendicular constraints (the fourth is
    /// implied), then runs a full solve. Returns the four line ids.
    pub fn create_rectangle(&mut self, corner_a: u64, corner_c: u64) -> Result<Vec<u64>, SketchError> {
        let pa = self
            .sketch
            .point_pos(corner_a)
            .ok_or(SketchError::UnknownPoint(corner_a))?;
        let pc = self
            .sketch
            .point_pos(corner_c)
            .ok_or(SketchError::UnknownPoint(corner_c))?;

        // Derived axis-aligned corners.
        let pb = [pc[0], pa[1]];
        let pd = [pa[0], pc[1]];

        let b1 = self.add_point(pb[0], pb[1]);
        let b2 = self.add_point(pb[0], pb[1]);
        let c2 = self.add_point(pc[0], pc[1]);
        let d1 = self.add_point(pd[0], pd[1]);
        let d2 = self.add_point(pd[0], pd[1]);
        let a2 = self.add_point(pa[0], pa[1]);

        let l1 = self.add_geometry(GeometryKind::Line, vec![corner_a, b1])?;
        let l2 = self.add_geometry(GeometryKind::Line, vec![b2, corner_c])?;
        let l3 = self.add_geometry(GeometryKind::Line, vec![c2, d1])?;
        let l4 = self.add_geometry(GeometryKind::Line, vec![d2, a2])?;

        for (p, q) in [(b1, b2), (corner_c, c2), (d1, d2), (a2, corner_a)] {
            self.add_constraint(ConstraintKind::Coincident, vec![p, q], None)?;
        }

        self.add_constraint(ConstraintKind::Perpendicular, vec![corner_a, b1, b2, corner_c], None)?;
        self.add_constraint(ConstraintKind::Perpendicular, vec![b2, corner_c, c2, d1], None)?;
        self.add_constraint(ConstraintKind::Perpendicular, vec![c2, d1, d2, a2], None)?;

        self.solve(SolveBudget::Full);

        Ok(vec![l1, l2, l3, l4])
    }

    // -----------------------------------------------------------------------
    // Constraints
    // -----------------------------------------------------------------------

    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        points: Vec<u64>,
        value: Option<f64>,
    ) -> Result<u64, SketchError> {
        if points.len() != kind.arity() {
            return Err(SketchError::ArityMismatch {
                kind,
                expected: kind.arity(),
                got: points.len(),
            });
        }
        for pid in &points {
            if !self.sketch.points.contains_key(pid) {
                return Err(SketchError::UnknownPoint(*pid));
            }
        }

        let id = self.sketch.next_constraint_id();
        let mut constraint = Constraint::new(id, kind, points);
        constraint.value = value.map(Scalar::Num);
        self.sketch.constraints.insert(id, constraint);
        Ok(id)
    }

    pub fn remove_constraint(&mut self, id: u64) -> Result<(), SketchError> {
        let constraint = self
            .sketch
            .constraints
            .get(&id)
            .ok_or(SketchError::UnknownConstraint(id))?;

        // The last ground constraint must survive.
        if constraint.kind == ConstraintKind::Ground && self.sketch.ground_count() == 1 {
            return Err(SketchError::GroundRequired);
        }

        self.sketch.constraints.remove(&id);
        Ok(())
    }

    /// Create a constraint from explicit point ids or the current selection,
    /// applying kind-specific seeding. Invalid selections are rejected with
    /// no state change.
    pub fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        points: Option<Vec<u64>>,
    ) -> Result<u64, SketchError> {
        let points = match points {
            Some(points) => points,
            None => self.selection.clone(),
        };

        if points.len() != kind.arity() {
            let err = SketchError::ArityMismatch {
                kind,
                expected: kind.arity(),
                got: points.len(),
            };
            warn!(%err, "create_constraint rejected");
            return Err(err);
        }
        for pid in &points {
            if !self.sketch.points.contains_key(pid) {
                let err = SketchError::UnknownPoint(*pid);
                warn!(%err, "create_constraint rejected");
                return Err(err);
            }
        }

        let points = self.seed_orientation(kind, points);
        let id = self.add_constraint(kind, points, None)?;
        self.seed_value(id);
        Ok(id)
    }

    /// Perpendicular creation flips the first segment when the flipped
    /// orientation sits closer to 90 degrees.
    fn seed_orientation(&self, kind: ConstraintKind, mut points: Vec<u64>) -> Vec<u64> {
        if kind != ConstraintKind::Perpendicular || points.len() != 4 {
            return points;
        }

        let pos = |id: u64| self.sketch.point_pos(id).unwrap();
        let ang_a = segment_angle_deg(pos(points[0]), pos(points[1]));
        let ang_b = segment_angle_deg(pos(points[2]), pos(points[3]));
        let current = normalize_deg(ang_b - ang_a);
        let flipped = normalize_deg(current + 180.0);

        let target = if current < 180.0 { 90.0 } else { 270.0 };
        if shortest_delta_deg(flipped, target).abs() < shortest_delta_deg(current, target).abs() {
            points.swap(0, 1);
        }
        points
    }

    /// Dimensional seeding at creation time: distances capture the current
    /// separation (and tag circle/arc radius dimensions), angles capture the
    /// current directed angle.
    fn seed_value(&mut self, id: u64) {
        let Some(c) = self.sketch.constraints.get(&id).cloned() else {
            return;
        };
        let pos = |id: u64| self.sketch.point_pos(id).unwrap();

        match c.kind {
            ConstraintKind::Distance => {
                let value = distance(pos(c.points[0]), pos(c.points[1]));
                let radial = self.sketch.geometries.values().find(|g| {
                    matches!(g.kind, GeometryKind::Circle | GeometryKind::Arc)
                        && g.points.first() == Some(&c.points[0])
                        && g.points.contains(&c.points[1])
                });
                if let Some(live) = self.sketch.constraints.get_mut(&id) {
                    live.value = Some(Scalar::Num(value));
                    if let Some(g) = radial {
                        live.display_style = Some(DisplayStyle::Radius);
                        live.geometry = Some(g.id);
                    }
                }
            }
            ConstraintKind::Angle => {
                let ang_a = segment_angle_deg(pos(c.points[0]), pos(c.points[1]));
                let ang_b = segment_angle_deg(pos(c.points[2]), pos(c.points[3]));
                let value = normalize_deg(ang_b - ang_a);
                if let Some(live) = self.sketch.constraints.get_mut(&id) {
                    live.value = Some(Scalar::Num(value));
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Solve
    // -----------------------------------------------------------------------

    pub fn solve(&mut self, budget: SolveBudget) -> SolveReport {
        let mut options = self.options.clone();
        options.max_iterations = match budget {
            SolveBudget::Default | SolveBudget::Full => Some(MAX_ITERATIONS),
            SolveBudget::Iterations(n) => Some(n),
        };

        let outcome = solve(&self.sketch, &options);
        let report = outcome.report();
        self.sketch = outcome.sketch;
        report
    }

    // -----------------------------------------------------------------------
    // Simplification
    // -----------------------------------------------------------------------

    /// Union-find over coincident constraints: every point in an equivalence
    /// class is rewritten to the lowest id, degenerate coincidents are
    /// removed, duplicated constraints collapse, and unreferenced points are
    /// collected. Idempotent.
    pub fn simplify_coincident(&mut self) {
        let mut parent: HashMap<u64, u64> =
            self.sketch.points.keys().map(|&id| (id, id)).collect();

        fn find(parent: &mut HashMap<u64, u64>, id: u64) -> u64 {
            let mut root = id;
            while parent[&root] != root {
                root = parent[&root];
            }
            // Path compression.
            let mut cursor = id;
            while parent[&cursor] != root {
                let next = parent[&cursor];
                parent.insert(cursor, root);
                cursor = next;
            }
            root
        }

        let pairs: Vec<(u64, u64)> = self
            .sketch
            .constraints
            .values()
            .filter(|c| c.kind == ConstraintKind::Coincident && c.points.len() == 2)
            .map(|c| (c.points[0], c.points[1]))
            .collect();

        for (a, b) in pairs {
            if !parent.contains_key(&a) || !parent.contains_key(&b) {
                continue;
            }
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                // Lowest id wins the class.
                let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
                parent.insert(high, low);
            }
        }

        // Rewrite references to class roots.
        let roots: HashMap<u64, u64> = self
            .sketch
            .points
            .keys()
            .map(|&id| (id, find(&mut parent, id)))
            .collect();

        for geometry in self.sketch.geometries.values_mut() {
            for pid in geometry.points.iter_mut() {
                if let Some(&root) = roots.get(pid) {
                    *pid = root;
                }
            }
        }
        for constraint in self.sketch.constraints.values_mut() {
            for pid in constraint.points.iter_mut() {
                if let Some(&root) = roots.get(pid) {
                    *pid = root;
                }
            }
        }

        // Degenerate coincidents collapse to nothing.
        self.sketch
            .constraints
            .retain(|_, c| !(c.kind == ConstraintKind::Coincident && c.points[0] == c.points[1]));

        // Rewriting can leave duplicates (e.g. two grounds on the merged
        // point). Keep the lowest id of each.
        let mut seen: HashSet<(ConstraintKind, Vec<u64>, Option<String>)> = HashSet::new();
        let mut duplicates = Vec::new();
        for c in self.sketch.constraints.values() {
            let fingerprint = (
                c.kind,
                c.points.clone(),
                c.value.as_ref().map(|v| format!("{:?}", v)),
            );
            if !seen.insert(fingerprint) {
                duplicates.push(c.id);
            }
        }
        for id in duplicates {
            self.sketch.constraints.remove(&id);
        }

        // Collect points no longer referenced by anything.
        let mut referenced: BTreeSet<u64> = BTreeSet::new();
        referenced.insert(ORIGIN_POINT_ID);
        for geometry in self.sketch.geometries.values() {
            referenced.extend(geometry.points.iter().copied());
        }
        for constraint in self.sketch.constraints.values() {
            referenced.extend(constraint.points.iter().copied());
        }
        self.sketch.points.retain(|id, _| referenced.contains(id));
        self.selection.retain(|id| referenced.contains(id));
    }

    /// True when the pair is covered by a horizontal or vertical constraint.
    /// Exposed for UI affordances deciding which constraints still apply.
    pub fn is_axis_locked(&self, a: u64, b: u64) -> bool {
        segment_axis_lock(&self.sketch, a, b).is_some()
    }
}
