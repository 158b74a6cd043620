use kerf_core::features::{RegenOptions, SketchFeature, Timeline};
use kerf_core::scene::Scene;
use kerf_core::sketch::editor::{SketchEditor, SolveBudget};
use kerf_core::sketch::types::ConstraintKind;

#[test]
fn test_rectangle_feature_roundtrips_and_regenerates() {
    // Author a rectangle through the facade.
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let c = editor.add_point(20.0, 8.0);
    editor.create_rectangle(a, c).unwrap();
    let report = editor.solve(SolveBudget::Full);
    assert!(report.converged);

    let mut timeline = Timeline::new();
    timeline.push(SketchFeature::new("plate").with_sketch(editor.into_sketch()));

    // The persisted form survives a serialization round-trip.
    let json = serde_json::to_string(&timeline).unwrap();
    assert!(json.contains("⟂"), "constraint glyphs persist as-is");
    let mut restored: Timeline = serde_json::from_str(&json).unwrap();

    // Regenerating the restored history rebuilds the scene.
    let mut scene = Scene::new();
    let succeeded = restored.regenerate(&mut scene, &RegenOptions::default());

    assert_eq!(succeeded, 1);
    assert_eq!(scene.faces.len(), 1);
    assert_eq!(scene.edges.len(), 4);

    let face = &scene.faces[0];
    assert_eq!(face.groups.len(), 1);
    assert!(face.tessellation.triangle_count() >= 2);

    // Regeneration is stable: running the history again does not move points.
    let before = restored.features[0].sketch.clone();
    restored.regenerate(&mut scene, &RegenOptions::default());
    for (id, point) in &before.points {
        let after = restored.features[0].sketch.point_pos(*id).unwrap();
        let delta = ((point.pos()[0] - after[0]).powi(2) + (point.pos()[1] - after[1]).powi(2)).sqrt();
        assert!(delta < 1e-6, "point {} drifted on regeneration", id);
    }

    // The rectangle's constraint stack survives intact.
    let sketch = &restored.features[0].sketch;
    let perpendicular = sketch
        .constraints
        .values()
        .filter(|c| c.kind == ConstraintKind::Perpendicular)
        .count();
    assert_eq!(perpendicular, 3);
}
