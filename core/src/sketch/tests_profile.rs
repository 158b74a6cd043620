use crate::geometry::utils_2d::polygon_signed_area;
use crate::geometry::{PlaneBasis, Tessellation};
use crate::scene::EntityId;
use crate::sketch::editor::SketchEditor;
use crate::sketch::loops::build_profile_loops;
use crate::sketch::profile::{compile_profile, LoopRole, ProfileOptions};
use crate::sketch::types::{GeometryKind, Sketch};
use std::collections::BTreeSet;

/// Four lines forming an axis-aligned square. Returns the geometry ids.
fn add_square(editor: &mut SketchEditor, x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<u64> {
    let a = editor.add_point(x0, y0);
    let b = editor.add_point(x1, y0);
    let c = editor.add_point(x1, y1);
    let d = editor.add_point(x0, y1);
    vec![
        editor.add_geometry(GeometryKind::Line, vec![a, b]).unwrap(),
        editor.add_geometry(GeometryKind::Line, vec![b, c]).unwrap(),
        editor.add_geometry(GeometryKind::Line, vec![c, d]).unwrap(),
        editor.add_geometry(GeometryKind::Line, vec![d, a]).unwrap(),
    ]
}

fn compile(sketch: &Sketch) -> crate::sketch::profile::CompiledProfile {
    compile_profile(
        sketch,
        &PlaneBasis::default(),
        EntityId::deterministic("test-feature"),
        "sketch1",
        &ProfileOptions::default(),
    )
}

/// Unsigned area covered by a tessellation lying in the default (XY) plane.
fn tessellation_area(t: &Tessellation) -> f64 {
    let vertex = |i: u32| {
        let i = i as usize * 3;
        [t.vertices[i] as f64, t.vertices[i + 1] as f64]
    };
    t.indices
        .chunks(3)
        .map(|tri| {
            let (a, b, c) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
            ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])).abs() * 0.5
        })
        .sum()
}

// Scenario: outer square with a concentric inner square.
#[test]
fn test_square_with_hole() {
    let mut editor = SketchEditor::new();
    let outer_ids = add_square(&mut editor, 0.0, 0.0, 10.0, 10.0);
    let hole_ids = add_square(&mut editor, 3.0, 3.0, 7.0, 7.0);

    let compiled = compile(editor.sketch());
    let face = compiled.face.expect("closed profile yields a face");

    assert_eq!(face.groups.len(), 1);
    let group = &face.groups[0];
    assert_eq!(group.holes_2d.len(), 1);

    // Winding convention: outer clockwise, hole counter-clockwise.
    assert!(polygon_signed_area(&group.outer_2d) < 0.0);
    assert!(polygon_signed_area(&group.holes_2d[0]) > 0.0);

    // Triangulation covers the annular area.
    let area = tessellation_area(&face.tessellation);
    assert!((area - 84.0).abs() < 1e-2, "annular area: {}", area);

    // The boundary set is exactly the eight source lines, tagged by role.
    let outer_bound: BTreeSet<u64> = face
        .boundaries
        .iter()
        .filter(|b| b.role == LoopRole::Outer)
        .map(|b| b.geometry)
        .collect();
    let hole_bound: BTreeSet<u64> = face
        .boundaries
        .iter()
        .filter(|b| b.role == LoopRole::Hole)
        .map(|b| b.geometry)
        .collect();
    assert_eq!(outer_bound, outer_ids.iter().copied().collect::<BTreeSet<u64>>());
    assert_eq!(hole_bound, hole_ids.iter().copied().collect::<BTreeSet<u64>>());

    assert_eq!(compiled.edges.len(), 8);
}

#[test]
fn test_disjoint_squares_share_no_segments() {
    let mut editor = SketchEditor::new();
    add_square(&mut editor, 0.0, 0.0, 10.0, 10.0);
    add_square(&mut editor, 20.0, 0.0, 30.0, 10.0);

    let groups = build_profile_loops(editor.sketch(), 64);
    assert_eq!(groups.len(), 2);

    let first: BTreeSet<u64> = groups[0].outer.geometry_ids.iter().copied().collect();
    let second: BTreeSet<u64> = groups[1].outer.geometry_ids.iter().copied().collect();
    assert!(first.is_disjoint(&second), "no boundary loop shares a segment");
    assert_eq!(first.len(), 4);
    assert_eq!(second.len(), 4);
}

#[test]
fn test_classification_parity_three_levels() {
    let mut editor = SketchEditor::new();
    add_square(&mut editor, 0.0, 0.0, 12.0, 12.0);
    add_square(&mut editor, 3.0, 3.0, 9.0, 9.0);
    add_square(&mut editor, 5.0, 5.0, 7.0, 7.0);

    let groups = build_profile_loops(editor.sketch(), 64);

    // Even depths are outers (the outermost and the innermost square), the
    // middle one is a hole of the outermost.
    assert_eq!(groups.len(), 2);
    let with_hole = groups.iter().filter(|g| g.holes.len() == 1).count();
    let without_hole = groups.iter().filter(|g| g.holes.is_empty()).count();
    assert_eq!(with_hole, 1);
    assert_eq!(without_hole, 1);
}

#[test]
fn test_circle_annulus() {
    let mut editor = SketchEditor::new();
    let c1 = editor.add_point(0.0, 0.0);
    let r1 = editor.add_point(5.0, 0.0);
    editor.add_geometry(GeometryKind::Circle, vec![c1, r1]).unwrap();
    let c2 = editor.add_point(0.0, 0.0);
    let r2 = editor.add_point(2.0, 0.0);
    editor.add_geometry(GeometryKind::Circle, vec![c2, r2]).unwrap();

    let compiled = compile(editor.sketch());
    let face = compiled.face.expect("annulus yields a face");

    assert_eq!(face.groups.len(), 1);
    assert_eq!(face.groups[0].holes_2d.len(), 1);

    // Triangle area matches the sampled polygons, and sits near the
    // analytic annulus area.
    let area = tessellation_area(&face.tessellation);
    let expected = polygon_signed_area(&face.groups[0].outer_2d).abs()
        - polygon_signed_area(&face.groups[0].holes_2d[0]).abs();
    assert!((area - expected).abs() < 1e-2, "area {} vs polygons {}", area, expected);

    let analytic = std::f64::consts::PI * (25.0 - 4.0);
    assert!((area - analytic).abs() / analytic < 0.02, "area {} vs analytic {}", area, analytic);
}

#[test]
fn test_arc_and_line_close_a_half_disk() {
    let mut editor = SketchEditor::new();
    let center = editor.add_point(5.0, 0.0);
    let start = editor.add_point(10.0, 0.0);
    let end = editor.add_point(0.0, 0.0);
    editor
        .add_geometry(GeometryKind::Arc, vec![center, start, end])
        .unwrap();
    editor.add_geometry(GeometryKind::Line, vec![end, start]).unwrap();

    let compiled = compile(editor.sketch());
    let face = compiled.face.expect("arc plus chord close a region");

    assert_eq!(face.groups.len(), 1);
    let area = tessellation_area(&face.tessellation);
    let analytic = std::f64::consts::PI * 25.0 / 2.0;
    assert!((area - analytic).abs() < 0.5, "half disk area: {}", area);
}

#[test]
fn test_construction_geometry_is_excluded() {
    let mut editor = SketchEditor::new();
    add_square(&mut editor, 0.0, 0.0, 10.0, 10.0);
    let a = editor.add_point(0.0, 0.0);
    let c = editor.add_point(10.0, 10.0);
    let diagonal = editor.add_geometry(GeometryKind::Line, vec![a, c]).unwrap();
    editor.toggle_construction(diagonal).unwrap();

    let compiled = compile(editor.sketch());
    let face = compiled.face.expect("square still closes");

    assert_eq!(face.groups.len(), 1);
    assert!(face.groups[0].holes_2d.is_empty());
    assert!(
        face.boundaries.iter().all(|b| b.geometry != diagonal),
        "construction geometry stays out of the boundary"
    );
    assert_eq!(compiled.edges.len(), 4, "construction geometry emits no edge");
}

#[test]
fn test_open_chain_yields_no_face() {
    let mut editor = SketchEditor::new();
    let a = editor.add_point(0.0, 0.0);
    let b = editor.add_point(10.0, 0.0);
    editor.add_geometry(GeometryKind::Line, vec![a, b]).unwrap();

    let compiled = compile(editor.sketch());
    assert!(compiled.face.is_none());
    assert_eq!(compiled.edges.len(), 1);
}

#[test]
fn test_world_loops_lift_through_basis() {
    use crate::geometry::{Point3, Vector3};

    let mut editor = SketchEditor::new();
    add_square(&mut editor, 0.0, 0.0, 4.0, 4.0);

    let basis = PlaneBasis::from_normal(Point3::new(0.0, 0.0, 7.0), Vector3::z_axis().into_inner());
    let compiled = compile_profile(
        editor.sketch(),
        &basis,
        EntityId::deterministic("lifted"),
        "sketch2",
        &ProfileOptions::default(),
    );
    let face = compiled.face.unwrap();

    for world in &face.groups[0].outer_world {
        assert!((world.z - 7.0).abs() < 1e-9, "loop lifted onto the plane");
    }
    for edge in &compiled.edges {
        for p in &edge.polyline {
            assert!((p.z - 7.0).abs() < 1e-9);
        }
    }
}
