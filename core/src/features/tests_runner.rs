use super::runner::{RegenOptions, Timeline};
use super::types::SketchFeature;
use crate::scene::{EntityId, Scene};
use crate::sketch::editor::SketchEditor;
use crate::sketch::external::ExternalRef;
use crate::sketch::types::{Constraint, ConstraintKind, Geometry, GeometryKind};

fn square_feature(name: &str) -> SketchFeature {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let b = editor.add_point(10.0, 0.0);
    let c = editor.add_point(10.0, 10.0);
    let d = editor.add_point(0.0, 10.0);
    editor.add_geometry(GeometryKind::Line, vec![a, b]).unwrap();
    editor.add_geometry(GeometryKind::Line, vec![b, c]).unwrap();
    editor.add_geometry(GeometryKind::Line, vec![c, d]).unwrap();
    editor.add_geometry(GeometryKind::Line, vec![d, a]).unwrap();
    SketchFeature::new(name).with_sketch(editor.into_sketch())
}

#[test]
fn test_single_feature_pipeline() {
    let mut timeline = Timeline::new();
    timeline.push(square_feature("base"));

    let mut scene = Scene::new();
    let succeeded = timeline.regenerate(&mut scene, &RegenOptions::default());

    assert_eq!(succeeded, 1);
    assert_eq!(scene.faces.len(), 1);
    assert_eq!(scene.edges.len(), 4);

    let feature = &timeline.features[0];
    assert!(feature.last_error.is_none());
    let report = feature.last_solve.expect("solve report recorded");
    assert!(report.converged);
}

#[test]
fn test_failing_feature_is_recorded_and_run_continues() {
    let mut broken = SketchFeature::new("broken");
    // A line referencing a point that does not exist.
    broken
        .sketch
        .geometries
        .insert(0, Geometry::new(0, GeometryKind::Line, vec![1, 99]));

    let mut timeline = Timeline::new();
    timeline.push(broken);
    timeline.push(square_feature("base"));

    let mut scene = Scene::new();
    let succeeded = timeline.regenerate(&mut scene, &RegenOptions::default());

    assert_eq!(succeeded, 1, "the valid feature still runs");
    assert!(timeline.features[0].last_error.is_some());
    assert!(timeline.features[1].last_error.is_none());
    assert_eq!(scene.faces.len(), 1);
}

#[test]
fn test_expression_environment_drives_dimensions() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let b = editor.add_point(10.0, 0.0);
    editor
        .create_constraint(ConstraintKind::Ground, Some(vec![a]))
        .unwrap();
    let mut sketch = editor.into_sketch();

    let cid = sketch.next_constraint_id();
    let mut dim = Constraint::new(cid, ConstraintKind::Distance, vec![a, b]);
    dim.value_expression = Some("span".to_string());
    sketch.constraints.insert(cid, dim);

    let mut timeline = Timeline::new();
    timeline.push(SketchFeature::new("dimensioned").with_sketch(sketch));

    let mut scene = Scene::new();
    let options = RegenOptions {
        expressions: "span = 40;".to_string(),
        ..Default::default()
    };
    timeline.regenerate(&mut scene, &options);

    let solved = &timeline.features[0].sketch;
    let pa = solved.point_pos(a).unwrap();
    let pb = solved.point_pos(b).unwrap();
    let dist = ((pa[0] - pb[0]).powi(2) + (pa[1] - pb[1]).powi(2)).sqrt();
    assert!((dist - 40.0).abs() < 1e-3, "expression-driven distance: {}", dist);
}

#[test]
fn test_external_reference_projects_and_pins() {
    let mut timeline = Timeline::new();
    timeline.push(square_feature("base"));

    // The second sketch binds two points to the first feature's bottom edge.
    let mut editor = SketchEditor::new();
    let pa = editor.add_point(3.0, 3.0);
    let pb = editor.add_point(4.0, 4.0);
    let mut follower = SketchFeature::new("follower").with_sketch(editor.into_sketch());
    follower.external_refs.push(ExternalRef {
        // Stale id: resolution falls back to the name and updates the record.
        edge_id: EntityId::deterministic("stale"),
        edge_name: "base:edge0".to_string(),
        solid_name: None,
        point_a: pa,
        point_b: pb,
    });
    timeline.push(follower);

    let mut scene = Scene::new();
    let succeeded = timeline.regenerate(&mut scene, &RegenOptions::default());
    assert_eq!(succeeded, 2);

    let follower = &timeline.features[1];
    let solved = &follower.sketch;

    // base:edge0 runs from (0,0) to (10,0) on the default plane.
    let a = solved.point_pos(pa).unwrap();
    let b = solved.point_pos(pb).unwrap();
    assert!((a[0] - 0.0).abs() < 1e-6 && a[1].abs() < 1e-6, "projected endpoint: {:?}", a);
    assert!((b[0] - 10.0).abs() < 1e-6 && b[1].abs() < 1e-6, "projected endpoint: {:?}", b);

    assert!(solved.is_fixed(pa) && solved.is_fixed(pb), "bound points are pinned");
    assert!(solved.is_grounded(pa) && solved.is_grounded(pb), "ground insurance added");

    // The stored record now carries the resolved edge id.
    let resolved = scene
        .resolve_edge(follower.external_refs[0].edge_id, "", None)
        .expect("updated id resolves directly");
    assert_eq!(resolved.name, "base:edge0");
}

#[test]
fn test_missing_external_edge_leaves_points_untouched() {
    let mut editor = SketchEditor::new();
    let pa = editor.add_point(3.0, 3.0);
    let pb = editor.add_point(4.0, 4.0);
    let mut feature = SketchFeature::new("dangling").with_sketch(editor.into_sketch());
    feature.external_refs.push(ExternalRef {
        edge_id: EntityId::deterministic("nowhere"),
        edge_name: "missing:edge".to_string(),
        solid_name: None,
        point_a: pa,
        point_b: pb,
    });

    let mut timeline = Timeline::new();
    timeline.push(feature);

    let mut scene = Scene::new();
    timeline.regenerate(&mut scene, &RegenOptions::default());

    let solved = &timeline.features[0].sketch;
    assert_eq!(solved.point_pos(pa), Some([3.0, 3.0]));
    assert!(!solved.is_fixed(pa), "missing edge leaves points unpinned");
}
