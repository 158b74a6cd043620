use crate::sketch::editor::{GeometryRequest, SketchEditor, SketchError, SolveBudget};
use crate::sketch::types::{ConstraintKind, DisplayStyle, GeometryKind, ORIGIN_POINT_ID};

#[test]
fn test_new_editor_has_grounded_origin() {
    let editor = SketchEditor::new();
    let sketch = editor.sketch();

    assert!(sketch.points.contains_key(&ORIGIN_POINT_ID));
    assert_eq!(sketch.ground_count(), 1);
}

#[test]
fn test_create_rectangle_emits_expected_document() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let c = editor.add_point(10.0, 5.0);

    let lines = editor.create_rectangle(a, c).unwrap();
    assert_eq!(lines.len(), 4);

    let sketch = editor.sketch();

    // Two selected corners plus six allocated duplicates.
    let non_origin = sketch
        .points
        .keys()
        .filter(|&&id| id != ORIGIN_POINT_ID)
        .count();
    assert_eq!(non_origin, 8);

    assert_eq!(sketch.geometries.len(), 4);
    assert!(sketch
        .geometries
        .values()
        .all(|g| g.kind == GeometryKind::Line));

    let coincident = sketch
        .constraints
        .values()
        .filter(|c| c.kind == ConstraintKind::Coincident)
        .count();
    let perpendicular = sketch
        .constraints
        .values()
        .filter(|c| c.kind == ConstraintKind::Perpendicular)
        .count();
    assert_eq!(coincident, 4);
    assert_eq!(perpendicular, 3);

    // After the full solve the corners span the selected bounding box.
    let mut min = [f64::INFINITY, f64::INFINITY];
    let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
    for geometry in sketch.geometries.values() {
        for pid in &geometry.points {
            let pos = sketch.point_pos(*pid).unwrap();
            min[0] = min[0].min(pos[0]);
            min[1] = min[1].min(pos[1]);
            max[0] = max[0].max(pos[0]);
            max[1] = max[1].max(pos[1]);
        }
    }
    assert!((min[0] - 0.0).abs() < 1e-3 && (min[1] - 0.0).abs() < 1e-3);
    assert!((max[0] - 10.0).abs() < 1e-3 && (max[1] - 5.0).abs() < 1e-3);
}

#[test]
fn test_create_geometry_from_selection() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let b = editor.add_point(5.0, 0.0);

    editor.set_selection(vec![a, b]);
    let ids = editor.create_geometry(GeometryRequest::Line, None).unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(editor.sketch().geometries.len(), 1);
}

#[test]
fn test_create_geometry_wrong_selection_count() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);

    editor.set_selection(vec![a]);
    let before = editor.sketch().clone();
    let result = editor.create_geometry(GeometryRequest::Arc, None);

    assert!(matches!(result, Err(SketchError::InvalidSelection(_))));
    assert_eq!(editor.sketch(), &before, "no state change on rejection");
}

#[test]
fn test_create_constraint_arity_mismatch_changes_nothing() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);

    let before = editor.sketch().clone();
    let result = editor.create_constraint(ConstraintKind::Distance, Some(vec![a]));

    assert!(matches!(result, Err(SketchError::ArityMismatch { .. })));
    assert_eq!(editor.sketch(), &before);
}

#[test]
fn test_distance_on_circle_tags_radius_dimension() {
    let mut editor = SketchEditor::new();
    let center = editor.add_point(0.0, 0.0);
    let rim = editor.add_point(4.0, 0.0);
    let circle = editor
        .add_geometry(GeometryKind::Circle, vec![center, rim])
        .unwrap();

    let cid = editor
        .create_constraint(ConstraintKind::Distance, Some(vec![center, rim]))
        .unwrap();

    let constraint = &editor.sketch().constraints[&cid];
    assert_eq!(constraint.value_num(), Some(4.0), "seeded from the current radius");
    assert_eq!(constraint.display_style, Some(DisplayStyle::Radius));
    assert_eq!(constraint.geometry, Some(circle));
}

#[test]
fn test_remove_geometry_cascades_tagged_constraints() {
    let mut editor = SketchEditor::new();
    let center = editor.add_point(0.0, 0.0);
    let rim = editor.add_point(4.0, 0.0);
    let circle = editor
        .add_geometry(GeometryKind::Circle, vec![center, rim])
        .unwrap();
    let cid = editor
        .create_constraint(ConstraintKind::Distance, Some(vec![center, rim]))
        .unwrap();

    editor.remove_geometry(circle).unwrap();

    assert!(!editor.sketch().geometries.contains_key(&circle));
    assert!(!editor.sketch().constraints.contains_key(&cid));
}

#[test]
fn test_remove_point_cascades() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let b = editor.add_point(5.0, 0.0);
    let c = editor.add_point(5.0, 5.0);
    editor.add_geometry(GeometryKind::Line, vec![a, b]).unwrap();
    editor.add_geometry(GeometryKind::Line, vec![b, c]).unwrap();
    editor
        .create_constraint(ConstraintKind::Horizontal, Some(vec![a, b]))
        .unwrap();

    editor.remove_point(b).unwrap();

    let sketch = editor.sketch();
    assert!(!sketch.points.contains_key(&b));
    assert!(
        sketch.geometries.values().all(|g| !g.points.contains(&b)),
        "no surviving geometry references the removed point"
    );
    assert!(
        sketch.constraints.values().all(|c| !c.points.contains(&b)),
        "no surviving constraint references the removed point"
    );
}

#[test]
fn test_origin_and_last_ground_are_protected() {
    let mut editor = SketchEditor::new();

    assert!(matches!(
        editor.remove_point(ORIGIN_POINT_ID),
        Err(SketchError::OriginProtected)
    ));

    let ground_id = editor.sketch().grounds_on(ORIGIN_POINT_ID)[0];
    assert!(matches!(
        editor.remove_constraint(ground_id),
        Err(SketchError::GroundRequired)
    ));
}

#[test]
fn test_simplify_coincident_merges_to_lowest_id() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let b = editor.add_point(10.0, 0.0);
    let c = editor.add_point(10.0, 0.0);
    let d = editor.add_point(10.0, 10.0);
    let l1 = editor.add_geometry(GeometryKind::Line, vec![a, b]).unwrap();
    let l2 = editor.add_geometry(GeometryKind::Line, vec![c, d]).unwrap();
    editor
        .create_constraint(ConstraintKind::Coincident, Some(vec![b, c]))
        .unwrap();

    editor.simplify_coincident();

    let sketch = editor.sketch();
    assert!(!sketch.points.contains_key(&c), "absorbed point collected");
    assert_eq!(sketch.geometries[&l1].points, vec![a, b]);
    assert_eq!(sketch.geometries[&l2].points, vec![b, d], "rewritten to the lowest id");
    assert!(
        sketch
            .constraints
            .values()
            .all(|c| c.kind != ConstraintKind::Coincident),
        "degenerate coincident removed"
    );
}

#[test]
fn test_simplify_coincident_is_idempotent() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let b = editor.add_point(10.0, 0.0);
    let c = editor.add_point(10.0, 0.0);
    let d = editor.add_point(10.0, 10.0);
    editor.add_geometry(GeometryKind::Line, vec![a, b]).unwrap();
    editor.add_geometry(GeometryKind::Line, vec![c, d]).unwrap();
    editor
        .create_constraint(ConstraintKind::Coincident, Some(vec![b, c]))
        .unwrap();

    editor.simplify_coincident();
    let once = editor.sketch().clone();
    editor.simplify_coincident();

    assert_eq!(editor.sketch(), &once);
}

#[test]
fn test_solve_budget_variants_run() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 1.0);
    let b = editor.add_point(10.0, 3.0);
    editor
        .create_constraint(ConstraintKind::Horizontal, Some(vec![a, b]))
        .unwrap();

    let report = editor.solve(SolveBudget::Full);
    assert!(report.converged);

    let p1 = editor.sketch().point_pos(a).unwrap();
    let p2 = editor.sketch().point_pos(b).unwrap();
    assert!((p1[1] - p2[1]).abs() < 1e-4);

    // An explicit budget also runs.
    let report = editor.solve(SolveBudget::Iterations(3));
    assert!(report.iterations <= 3);
}
