use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The sketch origin point. Always present, always grounded.
pub const ORIGIN_POINT_ID: u64 = 0;

/// A coordinate or dimension value: either a resolved number or an
/// expression string awaiting evaluation against the expression environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Num(f64),
    Expr(String),
}

impl Scalar {
    /// The numeric value, if resolved and finite.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Scalar::Num(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Coerce to a number for solving: unresolved expressions parse as plain
    /// floats where possible, anything else (including NaN) collapses to 0.
    pub fn coerce(&self) -> f64 {
        match self {
            Scalar::Num(v) if v.is_finite() => *v,
            Scalar::Num(_) => 0.0,
            Scalar::Expr(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
        }
    }

    pub fn is_expr(&self) -> bool {
        matches!(self, Scalar::Expr(_))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Num(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    pub x: Scalar,
    pub y: Scalar,
    /// Fixed points are not moved by the solver.
    #[serde(default)]
    pub fixed: bool,
}

impl Point {
    pub fn new(id: u64, x: f64, y: f64) -> Self {
        Self { id, x: Scalar::Num(x), y: Scalar::Num(y), fixed: false }
    }

    pub fn pos(&self) -> [f64; 2] {
        [self.x.coerce(), self.y.coerce()]
    }

    pub fn set_pos(&mut self, pos: [f64; 2]) {
        self.x = Scalar::Num(pos[0]);
        self.y = Scalar::Num(pos[1]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    /// Two endpoints.
    Line,
    /// Center, start, end. Sweeps CCW from start to end.
    Arc,
    /// Center and a radius-defining rim point.
    Circle,
}

impl GeometryKind {
    /// Number of point ids this kind references.
    pub fn point_count(&self) -> usize {
        match self {
            GeometryKind::Line => 2,
            GeometryKind::Arc => 3,
            GeometryKind::Circle => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub id: u64,
    pub kind: GeometryKind,
    pub points: Vec<u64>,
    /// Construction geometry participates in constraints but is excluded
    /// from profile compilation.
    #[serde(default)]
    pub construction: bool,
}

impl Geometry {
    pub fn new(id: u64, kind: GeometryKind, points: Vec<u64>) -> Self {
        Self { id, kind, points, construction: false }
    }
}

/// Constraint kinds, serialized as their glyph identifiers. The midpoint
/// glyph has a legacy alias `⋱` that is rewritten to canonical `⋯` on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    #[serde(rename = "⏚")]
    Ground,
    #[serde(rename = "━")]
    Horizontal,
    #[serde(rename = "│")]
    Vertical,
    #[serde(rename = "≡")]
    Coincident,
    #[serde(rename = "⟺")]
    Distance,
    #[serde(rename = "⇌")]
    EqualLength,
    #[serde(rename = "⏛")]
    PointOnLine,
    #[serde(rename = "⋯", alias = "⋱")]
    Midpoint,
    #[serde(rename = "∠")]
    Angle,
    #[serde(rename = "⟂")]
    Perpendicular,
    #[serde(rename = "∥")]
    Parallel,
    #[serde(rename = "⟠")]
    Tangent,
}

impl ConstraintKind {
    /// Number of point ids this kind consumes.
    pub fn arity(&self) -> usize {
        match self {
            ConstraintKind::Ground => 1,
            ConstraintKind::Horizontal
            | ConstraintKind::Vertical
            | ConstraintKind::Coincident
            | ConstraintKind::Distance => 2,
            ConstraintKind::PointOnLine | ConstraintKind::Midpoint => 3,
            ConstraintKind::EqualLength
            | ConstraintKind::Angle
            | ConstraintKind::Perpendicular
            | ConstraintKind::Parallel
            | ConstraintKind::Tangent => 4,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            ConstraintKind::Ground => "⏚",
            ConstraintKind::Horizontal => "━",
            ConstraintKind::Vertical => "│",
            ConstraintKind::Coincident => "≡",
            ConstraintKind::Distance => "⟺",
            ConstraintKind::EqualLength => "⇌",
            ConstraintKind::PointOnLine => "⏛",
            ConstraintKind::Midpoint => "⋯",
            ConstraintKind::Angle => "∠",
            ConstraintKind::Perpendicular => "⟂",
            ConstraintKind::Parallel => "∥",
            ConstraintKind::Tangent => "⟠",
        }
    }
}

/// How a distance dimension on a circle or arc is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
    Radius,
    Diameter,
}

/// Solve-time status of a constraint. Transient: never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConstraintState {
    #[default]
    Unknown,
    Satisfied,
    Unsatisfied,
    OverConstrained,
    MissingReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: u64,
    pub kind: ConstraintKind,
    pub points: Vec<u64>,
    /// Target value for dimensional kinds. May arrive as an expression
    /// string; the expression pass resolves it before solving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Scalar>,
    /// Expression re-evaluated on every regeneration. Takes precedence over
    /// `value` when both are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_style: Option<DisplayStyle>,
    /// Owning geometry, for dimensions attached to circles/arcs. Removing
    /// that geometry removes this constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<u64>,
    /// Solver-internal constraints (arc radius ties) are stripped from the
    /// solve output.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub temporary: bool,
    #[serde(skip)]
    pub status: ConstraintState,
    #[serde(skip)]
    pub error: Option<String>,
}

impl Constraint {
    pub fn new(id: u64, kind: ConstraintKind, points: Vec<u64>) -> Self {
        Self {
            id,
            kind,
            points,
            value: None,
            value_expression: None,
            display_style: None,
            geometry: None,
            temporary: false,
            status: ConstraintState::Unknown,
            error: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(Scalar::Num(value));
        self
    }

    /// The resolved numeric target, if any.
    pub fn value_num(&self) -> Option<f64> {
        self.value.as_ref().and_then(Scalar::as_num)
    }
}

/// The sketch document: three id-keyed sets. Iteration order is id order,
/// which doubles as document order for the solver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sketch {
    pub points: BTreeMap<u64, Point>,
    pub geometries: BTreeMap<u64, Geometry>,
    pub constraints: BTreeMap<u64, Constraint>,
}

impl Sketch {
    /// An empty sketch: the origin point and its ground constraint.
    pub fn new() -> Self {
        let mut sketch = Self::default();
        sketch
            .points
            .insert(ORIGIN_POINT_ID, Point::new(ORIGIN_POINT_ID, 0.0, 0.0));
        let gid = sketch.next_constraint_id();
        sketch.constraints.insert(
            gid,
            Constraint::new(gid, ConstraintKind::Ground, vec![ORIGIN_POINT_ID]),
        );
        sketch
    }

    pub fn point_pos(&self, id: u64) -> Option<[f64; 2]> {
        self.points.get(&id).map(Point::pos)
    }

    pub fn set_point_pos(&mut self, id: u64, pos: [f64; 2]) {
        if let Some(p) = self.points.get_mut(&id) {
            p.set_pos(pos);
        }
    }

    pub fn is_fixed(&self, id: u64) -> bool {
        self.points.get(&id).map(|p| p.fixed).unwrap_or(false)
    }

    pub fn set_fixed(&mut self, id: u64, fixed: bool) {
        if let Some(p) = self.points.get_mut(&id) {
            p.fixed = fixed;
        }
    }

    pub fn next_point_id(&self) -> u64 {
        self.points.keys().next_back().map(|id| id + 1).unwrap_or(0)
    }

    pub fn next_geometry_id(&self) -> u64 {
        self.geometries.keys().next_back().map(|id| id + 1).unwrap_or(0)
    }

    pub fn next_constraint_id(&self) -> u64 {
        self.constraints.keys().next_back().map(|id| id + 1).unwrap_or(0)
    }

    /// Ids of ground constraints anchored at `point`.
    pub fn grounds_on(&self, point: u64) -> Vec<u64> {
        self.constraints
            .values()
            .filter(|c| c.kind == ConstraintKind::Ground && c.points.first() == Some(&point))
            .map(|c| c.id)
            .collect()
    }

    /// True if the point participates in any ground constraint.
    pub fn is_grounded(&self, point: u64) -> bool {
        !self.grounds_on(point).is_empty()
    }

    /// Total ground constraints in the document.
    pub fn ground_count(&self) -> usize {
        self.constraints
            .values()
            .filter(|c| c.kind == ConstraintKind::Ground)
            .count()
    }
}
