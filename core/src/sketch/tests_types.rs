use crate::sketch::types::{
    Constraint, ConstraintKind, GeometryKind, Point, Scalar, Sketch,
};

#[test]
fn test_constraint_kind_glyph_roundtrip() {
    let kinds = [
        (ConstraintKind::Ground, "\"⏚\""),
        (ConstraintKind::Horizontal, "\"━\""),
        (ConstraintKind::Vertical, "\"│\""),
        (ConstraintKind::Coincident, "\"≡\""),
        (ConstraintKind::Distance, "\"⟺\""),
        (ConstraintKind::EqualLength, "\"⇌\""),
        (ConstraintKind::PointOnLine, "\"⏛\""),
        (ConstraintKind::Midpoint, "\"⋯\""),
        (ConstraintKind::Angle, "\"∠\""),
        (ConstraintKind::Perpendicular, "\"⟂\""),
        (ConstraintKind::Parallel, "\"∥\""),
        (ConstraintKind::Tangent, "\"⟠\""),
    ];

    for (kind, json) in kinds {
        assert_eq!(serde_json::to_string(&kind).unwrap(), json);
        let back: ConstraintKind = serde_json::from_str(json).unwrap();
        assert_eq!(back, kind);
    }
}

#[test]
fn test_legacy_midpoint_alias_rewritten() {
    let parsed: ConstraintKind = serde_json::from_str("\"⋱\"").unwrap();
    assert_eq!(parsed, ConstraintKind::Midpoint);
    // Re-serialization emits the canonical glyph.
    assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"⋯\"");
}

#[test]
fn test_geometry_kind_lowercase() {
    assert_eq!(serde_json::to_string(&GeometryKind::Line).unwrap(), "\"line\"");
    assert_eq!(serde_json::to_string(&GeometryKind::Arc).unwrap(), "\"arc\"");
    assert_eq!(serde_json::to_string(&GeometryKind::Circle).unwrap(), "\"circle\"");
}

#[test]
fn test_scalar_untagged() {
    let num: Scalar = serde_json::from_str("3.5").unwrap();
    assert_eq!(num, Scalar::Num(3.5));

    let expr: Scalar = serde_json::from_str("\"width / 2\"").unwrap();
    assert_eq!(expr, Scalar::Expr("width / 2".to_string()));
    assert!(expr.is_expr());

    assert_eq!(serde_json::to_string(&Scalar::Num(4.0)).unwrap(), "4.0");
}

#[test]
fn test_scalar_coercion() {
    assert_eq!(Scalar::Num(2.5).coerce(), 2.5);
    assert_eq!(Scalar::Num(f64::NAN).coerce(), 0.0);
    assert_eq!(Scalar::Expr("7.25".to_string()).coerce(), 7.25);
    assert_eq!(Scalar::Expr("width".to_string()).coerce(), 0.0);
}

#[test]
fn test_sketch_document_roundtrip() {
    let mut sketch = Sketch::new();
    sketch.points.insert(1, Point::new(1, 1.5, -2.0));
    sketch.points.insert(2, Point::new(2, 4.0, 0.0));
    sketch.geometries.insert(
        0,
        crate::sketch::types::Geometry::new(0, GeometryKind::Line, vec![1, 2]),
    );
    let cid = sketch.next_constraint_id();
    sketch.constraints.insert(
        cid,
        Constraint::new(cid, ConstraintKind::Distance, vec![1, 2]).with_value(6.5),
    );

    let json = serde_json::to_string(&sketch).unwrap();
    let back: Sketch = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sketch);
}

#[test]
fn test_transient_fields_not_serialized() {
    let mut sketch = Sketch::new();
    sketch.points.insert(1, Point::new(1, 0.0, 0.0));
    let cid = sketch.next_constraint_id();
    let mut constraint = Constraint::new(cid, ConstraintKind::Ground, vec![1]);
    constraint.status = crate::sketch::types::ConstraintState::Unsatisfied;
    constraint.error = Some("should not persist".to_string());
    sketch.constraints.insert(cid, constraint);

    let json = serde_json::to_string(&sketch).unwrap();
    assert!(!json.contains("should not persist"));
    assert!(!json.contains("status"));

    let back: Sketch = serde_json::from_str(&json).unwrap();
    assert_eq!(
        back.constraints[&cid].status,
        crate::sketch::types::ConstraintState::Unknown
    );
    assert!(back.constraints[&cid].error.is_none());
}

#[test]
fn test_new_sketch_invariants() {
    let sketch = Sketch::new();
    assert!(sketch.points.contains_key(&0), "origin always exists");
    assert_eq!(sketch.ground_count(), 1);
    assert_eq!(sketch.point_pos(0), Some([0.0, 0.0]));
}

#[test]
fn test_arity_table() {
    assert_eq!(ConstraintKind::Ground.arity(), 1);
    assert_eq!(ConstraintKind::Coincident.arity(), 2);
    assert_eq!(ConstraintKind::Horizontal.arity(), 2);
    assert_eq!(ConstraintKind::Vertical.arity(), 2);
    assert_eq!(ConstraintKind::Distance.arity(), 2);
    assert_eq!(ConstraintKind::PointOnLine.arity(), 3);
    assert_eq!(ConstraintKind::Midpoint.arity(), 3);
    assert_eq!(ConstraintKind::EqualLength.arity(), 4);
    assert_eq!(ConstraintKind::Angle.arity(), 4);
    assert_eq!(ConstraintKind::Perpendicular.arity(), 4);
    assert_eq!(ConstraintKind::Parallel.arity(), 4);
    assert_eq!(ConstraintKind::Tangent.arity(), 4);
}
