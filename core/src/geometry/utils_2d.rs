//! 2D math for the constraint catalog and the profile compiler.
//!
//! Everything operates on bare `[f64; 2]` points in sketch space. Angle
//! helpers work in degrees because constraint values are stored in degrees;
//! only the polar split returns radians, for arc sampling.

use std::f64::consts::PI;

/// Tolerance for floating-point comparisons
pub const EPSILON: f64 = 1e-6;

/// Distance between two 2D points.
#[inline]
pub fn distance(p1: [f64; 2], p2: [f64; 2]) -> f64 {
    (p2[0] - p1[0]).hypot(p2[1] - p1[1])
}

/// Midpoint of two 2D points.
#[inline]
pub fn midpoint(p1: [f64; 2], p2: [f64; 2]) -> [f64; 2] {
    [(p1[0] + p2[0]) * 0.5, (p1[1] + p2[1]) * 0.5]
}

/// 2D cross product (z-component of the 3D cross product).
/// Positive if v2 lies counter-clockwise of v1.
#[inline]
pub fn cross_2d(v1: [f64; 2], v2: [f64; 2]) -> f64 {
    v1[0] * v2[1] - v1[1] * v2[0]
}

// =============================================================================
// Angles
// =============================================================================

/// Normalize an angle in degrees into [0, 360).
#[inline]
pub fn normalize_deg(angle: f64) -> f64 {
    let a = angle % 360.0;
    if a < 0.0 {
        a + 360.0
    } else {
        a
    }
}

/// Shortest signed angular delta (degrees) that rotates `from` onto `to`,
/// in (-180, 180].
#[inline]
pub fn shortest_delta_deg(from: f64, to: f64) -> f64 {
    let mut d = normalize_deg(to) - normalize_deg(from);
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Directional angle of the segment from `a` to `b`, in degrees [0, 360).
#[inline]
pub fn segment_angle_deg(a: [f64; 2], b: [f64; 2]) -> f64 {
    normalize_deg((b[1] - a[1]).atan2(b[0] - a[0]).to_degrees())
}

/// Split a vector into polar form: (length, direction in radians [0, 2π)).
#[inline]
pub fn cartesian_to_polar(v: [f64; 2]) -> (f64, f64) {
    let radius = v[0].hypot(v[1]);
    let mut angle = v[1].atan2(v[0]);
    if angle < 0.0 {
        angle += 2.0 * PI;
    }
    (radius, angle)
}

/// Rotate `point` about `pivot` by `angle_deg` degrees (CCW positive).
pub fn rotate_about(pivot: [f64; 2], point: [f64; 2], angle_deg: f64) -> [f64; 2] {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let dx = point[0] - pivot[0];
    let dy = point[1] - pivot[1];
    [
        pivot[0] + dx * cos - dy * sin,
        pivot[1] + dx * sin + dy * cos,
    ]
}

// =============================================================================
// Lines
// =============================================================================

/// Closest point to `point` on the infinite line through `start`/`end`.
/// A degenerate line collapses to `start`.
pub fn closest_point_on_line(start: [f64; 2], end: [f64; 2], point: [f64; 2]) -> [f64; 2] {
    let d = [end[0] - start[0], end[1] - start[1]];
    let len_sq = d[0] * d[0] + d[1] * d[1];
    if len_sq < EPSILON * EPSILON {
        return start;
    }

    let t = ((point[0] - start[0]) * d[0] + (point[1] - start[1]) * d[1]) / len_sq;
    [start[0] + t * d[0], start[1] + t * d[1]]
}

/// Perpendicular distance from `point` to the infinite line.
pub fn distance_point_to_line(line_start: [f64; 2], line_end: [f64; 2], point: [f64; 2]) -> f64 {
    let along = [line_end[0] - line_start[0], line_end[1] - line_start[1]];
    let len = along[0].hypot(along[1]);
    if len < EPSILON {
        return distance(line_start, point);
    }

    let to_point = [point[0] - line_start[0], point[1] - line_start[1]];
    cross_2d(along, to_point).abs() / len
}

// =============================================================================
// Polygons
// =============================================================================

/// Signed area by the shoelace formula: half the summed cross products of
/// consecutive vertices. CCW winding is positive, CW negative.
pub fn polygon_signed_area(vertices: &[[f64; 2]]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }

    let mut twice_area = 0.0;
    for (i, &v) in vertices.iter().enumerate() {
        let w = vertices[(i + 1) % vertices.len()];
        twice_area += cross_2d(v, w);
    }
    twice_area * 0.5
}

/// Winding-number point-in-polygon test. Handles concave polygons and
/// either winding direction.
pub fn point_in_polygon(point: [f64; 2], polygon: &[[f64; 2]]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut winding: i32 = 0;
    for (i, &a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        // Which side of the edge a->b the point falls on.
        let side = cross_2d(
            [b[0] - a[0], b[1] - a[1]],
            [point[0] - a[0], point[1] - a[1]],
        );
        if a[1] <= point[1] && b[1] > point[1] && side > 0.0 {
            winding += 1;
        } else if a[1] > point[1] && b[1] <= point[1] && side < 0.0 {
            winding -= 1;
        }
    }

    winding != 0
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_and_midpoint() {
        assert!((distance([1.0, 2.0], [4.0, 6.0]) - 5.0).abs() < EPSILON);
        assert_eq!(midpoint([2.0, -4.0], [6.0, 10.0]), [4.0, 3.0]);
    }

    #[test]
    fn test_cross_2d_orientation() {
        assert!(cross_2d([1.0, 0.0], [0.0, 1.0]) > 0.0);
        assert!(cross_2d([0.0, 1.0], [1.0, 0.0]) < 0.0);
        assert_eq!(cross_2d([2.0, 3.0], [4.0, 6.0]), 0.0);
    }

    #[test]
    fn test_normalize_deg() {
        assert!((normalize_deg(370.0) - 10.0).abs() < EPSILON);
        assert!((normalize_deg(-90.0) - 270.0).abs() < EPSILON);
        assert!((normalize_deg(360.0) - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_shortest_delta_deg() {
        assert!((shortest_delta_deg(350.0, 10.0) - 20.0).abs() < EPSILON);
        assert!((shortest_delta_deg(10.0, 350.0) + 20.0).abs() < EPSILON);
        assert!((shortest_delta_deg(0.0, 180.0) - 180.0).abs() < EPSILON);
    }

    #[test]
    fn test_segment_angle_deg() {
        assert!((segment_angle_deg([0.0, 0.0], [1.0, 0.0]) - 0.0).abs() < EPSILON);
        assert!((segment_angle_deg([0.0, 0.0], [0.0, 1.0]) - 90.0).abs() < EPSILON);
        assert!((segment_angle_deg([2.0, 2.0], [1.0, 2.0]) - 180.0).abs() < EPSILON);
    }

    #[test]
    fn test_cartesian_to_polar() {
        let (r, a) = cartesian_to_polar([0.0, 2.0]);
        assert!((r - 2.0).abs() < EPSILON);
        assert!((a - std::f64::consts::FRAC_PI_2).abs() < EPSILON);

        // Negative quadrants land in [0, 2π).
        let (r, a) = cartesian_to_polar([0.0, -2.0]);
        assert!((r - 2.0).abs() < EPSILON);
        assert!((a - 3.0 * std::f64::consts::FRAC_PI_2).abs() < EPSILON);
    }

    #[test]
    fn test_rotate_about() {
        let p = rotate_about([1.0, 1.0], [2.0, 1.0], 90.0);
        assert!((p[0] - 1.0).abs() < EPSILON && (p[1] - 2.0).abs() < EPSILON);

        // A full turn is the identity.
        let q = rotate_about([3.0, -2.0], [5.0, 1.0], 360.0);
        assert!((q[0] - 5.0).abs() < EPSILON && (q[1] - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_closest_point_on_line() {
        // Projection beyond the segment end still lands on the line.
        let p = closest_point_on_line([0.0, 0.0], [2.0, 0.0], [7.0, 3.0]);
        assert!((p[0] - 7.0).abs() < EPSILON && p[1].abs() < EPSILON);

        // Degenerate line collapses to its anchor.
        let q = closest_point_on_line([4.0, 4.0], [4.0, 4.0], [0.0, 0.0]);
        assert_eq!(q, [4.0, 4.0]);
    }

    #[test]
    fn test_distance_point_to_line() {
        let d = distance_point_to_line([0.0, 0.0], [10.0, 0.0], [5.0, -3.0]);
        assert!((d - 3.0).abs() < EPSILON);

        let diagonal = distance_point_to_line([0.0, 0.0], [1.0, 1.0], [1.0, 0.0]);
        assert!((diagonal - std::f64::consts::FRAC_1_SQRT_2).abs() < EPSILON);
    }

    #[test]
    fn test_polygon_signed_area() {
        // CCW triangle, area 6.
        let ccw = [[0.0, 0.0], [4.0, 0.0], [4.0, 3.0]];
        assert!((polygon_signed_area(&ccw) - 6.0).abs() < EPSILON);

        // Reversing the winding flips the sign.
        let cw = [[0.0, 0.0], [4.0, 3.0], [4.0, 0.0]];
        assert!((polygon_signed_area(&cw) + 6.0).abs() < EPSILON);

        assert_eq!(polygon_signed_area(&[[0.0, 0.0], [1.0, 1.0]]), 0.0);
    }

    #[test]
    fn test_point_in_concave_polygon() {
        // L-shaped region: the notch at the top right is outside.
        let ell = [
            [0.0, 0.0],
            [4.0, 0.0],
            [4.0, 2.0],
            [2.0, 2.0],
            [2.0, 4.0],
            [0.0, 4.0],
        ];

        assert!(point_in_polygon([1.0, 1.0], &ell));
        assert!(point_in_polygon([1.0, 3.0], &ell));
        assert!(point_in_polygon([3.0, 1.0], &ell));
        assert!(!point_in_polygon([3.0, 3.0], &ell), "the notch is outside");
        assert!(!point_in_polygon([-1.0, 1.0], &ell));

        // CW winding classifies the same way.
        let mut reversed = ell;
        reversed.reverse();
        assert!(point_in_polygon([1.0, 1.0], &reversed));
        assert!(!point_in_polygon([3.0, 3.0], &reversed));
    }
}
