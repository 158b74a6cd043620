use super::{Matrix4, Point3, Vector3, EPSILON};
use serde::{Deserialize, Serialize};

/// An orthonormal frame describing a sketch plane in world coordinates.
///
/// `x` and `y` span the plane, `z` is its normal. Sketch-space (u, v)
/// coordinates lift to `origin + u*x + v*y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneBasis {
    pub origin: Point3,
    pub x: Vector3,
    pub y: Vector3,
    pub z: Vector3,
}

impl Default for PlaneBasis {
    fn default() -> Self {
        Self {
            origin: Point3::origin(),
            x: Vector3::x_axis().into_inner(),
            y: Vector3::y_axis().into_inner(),
            z: Vector3::z_axis().into_inner(),
        }
    }
}

impl PlaneBasis {
    pub fn new(origin: Point3, x: Vector3, y: Vector3, z: Vector3) -> Self {
        Self { origin, x, y, z }
    }

    /// Build a basis from an origin and a plane normal. The in-plane axes are
    /// derived by crossing the normal with the world axis least aligned to it.
    pub fn from_normal(origin: Point3, normal: Vector3) -> Self {
        let z = normal.normalize();
        let seed = if z.x.abs() < 0.9 {
            Vector3::x_axis().into_inner()
        } else {
            Vector3::y_axis().into_inner()
        };
        let y = z.cross(&seed).normalize();
        let x = y.cross(&z).normalize();
        Self { origin, x, y, z }
    }

    /// The affine transform mapping sketch-space (u, v, w) to world space.
    /// Columns are the basis vectors, translation is the origin.
    pub fn to_world(&self) -> Matrix4 {
        Matrix4::new(
            self.x.x, self.y.x, self.z.x, self.origin.x,
            self.x.y, self.y.y, self.z.y, self.origin.y,
            self.x.z, self.y.z, self.z.z, self.origin.z,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Lift a 2D sketch point into world space.
    pub fn lift(&self, uv: [f64; 2]) -> Point3 {
        self.origin + self.x * uv[0] + self.y * uv[1]
    }

    /// Project a world-space point onto the plane, returning (u, v).
    pub fn project(&self, p: &Point3) -> [f64; 2] {
        let d = p - self.origin;
        [d.dot(&self.x), d.dot(&self.y)]
    }

    /// True if the frame is orthonormal within tolerance.
    pub fn is_orthonormal(&self) -> bool {
        (self.x.norm() - 1.0).abs() < EPSILON
            && (self.y.norm() - 1.0).abs() < EPSILON
            && (self.z.norm() - 1.0).abs() < EPSILON
            && self.x.dot(&self.y).abs() < EPSILON
            && self.y.dot(&self.z).abs() < EPSILON
            && self.z.dot(&self.x).abs() < EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ApproxEq;

    #[test]
    fn test_default_is_xy_plane() {
        let basis = PlaneBasis::default();
        assert!(basis.is_orthonormal());
        assert!(basis.lift([3.0, 4.0]).approx_eq(&Point3::new(3.0, 4.0, 0.0)));
    }

    #[test]
    fn test_project_lift_roundtrip() {
        let basis = PlaneBasis::from_normal(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 1.0, 1.0));
        assert!(basis.is_orthonormal());

        let uv = [2.5, -1.5];
        let world = basis.lift(uv);
        let back = basis.project(&world);
        assert!((back[0] - uv[0]).abs() < EPSILON);
        assert!((back[1] - uv[1]).abs() < EPSILON);
    }

    #[test]
    fn test_to_world_matches_lift() {
        let basis = PlaneBasis::from_normal(Point3::new(0.0, 0.0, 5.0), Vector3::new(1.0, 0.0, 0.0));
        let m = basis.to_world();
        let uv = [1.0, 2.0];
        let lifted = basis.lift(uv);
        let via_matrix = m.transform_point(&Point3::new(uv[0], uv[1], 0.0));
        assert!(lifted.approx_eq(&via_matrix));
    }
}
