use super::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Flattened triangle buffers for an emitted face.
///
/// Layout matches what a renderer consumes directly: `vertices` is x/y/z
/// interleaved, `indices` are triangle triples, `normals` run parallel to
/// `vertices`. Edge polylines are carried by the emitted edge objects, not
/// here.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tessellation {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub normals: Vec<f32>,
}

impl Tessellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_vertex(&mut self, p: &Point3, normal: &Vector3) -> u32 {
        let idx = (self.vertices.len() / 3) as u32;
        self.vertices.push(p.x as f32);
        self.vertices.push(p.y as f32);
        self.vertices.push(p.z as f32);
        self.normals.push(normal.x as f32);
        self.normals.push(normal.y as f32);
        self.normals.push(normal.z as f32);
        idx
    }

    /// Append a triangle with a shared per-vertex normal.
    pub fn add_triangle(&mut self, p1: &Point3, p2: &Point3, p3: &Point3, normal: &Vector3) {
        let i1 = self.push_vertex(p1, normal);
        let i2 = self.push_vertex(p2, normal);
        let i3 = self.push_vertex(p3, normal);
        self.indices.push(i1);
        self.indices.push(i2);
        self.indices.push(i3);
    }
}
