use crate::geometry::{ray_triangle, Aabb, Ray, RayHit};
use crate::scatter::ScatterInstance;
use crate::scene::{RenderKey, Renderable, SceneSink};
use bytemuck::{Pod, Zeroable};
use cgmath::{Point3, Vector3};
use std::sync::Arc;

/// Integer grid coordinate of a cell; the cell is centered at
/// `(x * cell_size, y * cell_size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridIndex {
    pub x: i32,
    pub y: i32,
}

impl GridIndex {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Nearest index to a planar position.
    pub fn containing(x: f32, y: f32, cell_size: f32) -> Self {
        Self {
            x: (x / cell_size + 0.5).floor() as i32,
            y: (y / cell_size + 0.5).floor() as i32,
        }
    }

    /// Saturates at the edge of the index space.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub fn chebyshev(self, other: GridIndex) -> i32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).abs();
        i32::try_from(dx.max(dy)).unwrap_or(i32::MAX)
    }
}

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl TerrainVertex {
    pub fn point(&self) -> Point3<f32> {
        Point3::new(self.position[0], self.position[1], self.position[2])
    }
}

/// Regular grid of `(segments + 1)²` vertices, two triangles per quad.
/// Triangles of quad `(i, j)` sit at `2 * (i * segments + j)` and the next.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainMesh {
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
    pub segments: usize,
    pub segment_length: f32,
    /// Planar position of vertex `(0, 0)`.
    pub min_x: f32,
    pub min_y: f32,
}

impl TerrainMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangle(&self, t: usize) -> [Point3<f32>; 3] {
        let i = &self.indices[3 * t..3 * t + 3];
        [
            self.vertices[i[0] as usize].point(),
            self.vertices[i[1] as usize].point(),
            self.vertices[i[2] as usize].point(),
        ]
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Nearest surface hit, testing only the quads under the probe segment.
    pub fn ray_hit(&self, ray: &Ray, near: f32, far: f32) -> Option<RayHit> {
        if self.segments == 0 {
            return None;
        }
        let start = ray.at(near);
        let end = ray.at(far);
        let quad_range = |lo: f32, hi: f32, min: f32| {
            let first = ((lo - min) / self.segment_length).floor() as i64;
            let last = ((hi - min) / self.segment_length).floor() as i64;
            let max = self.segments as i64 - 1;
            if last < 0 || first > max {
                return None;
            }
            Some((first.max(0) as usize, last.min(max) as usize))
        };
        let (i0, i1) = quad_range(start.x.min(end.x), start.x.max(end.x), self.min_x)?;
        let (j0, j1) = quad_range(start.y.min(end.y), start.y.max(end.y), self.min_y)?;

        let mut best: Option<RayHit> = None;
        for i in i0..=i1 {
            for j in j0..=j1 {
                let quad = i * self.segments + j;
                for t in [2 * quad, 2 * quad + 1] {
                    let [a, b, c] = self.triangle(t);
                    if let Some(hit) = ray_triangle(ray, a, b, c, near, far) {
                        if best.map_or(true, |b| hit.distance < b.distance) {
                            best = Some(hit);
                        }
                    }
                }
            }
        }
        best
    }
}

/// Center and unit normal of one surface triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Face {
    pub center: Point3<f32>,
    pub normal: Vector3<f32>,
}

pub struct Cell {
    pub index: GridIndex,
    pub size: f32,
    pub generator_version: u64,
    pub mesh: Arc<TerrainMesh>,
    pub faces: Vec<Face>,
    pub vegetation: Arc<[ScatterInstance]>,
    pub structures: Arc<[ScatterInstance]>,
    pub bounds: Aabb,
    populated: bool,
}

impl Cell {
    pub(crate) fn new(
        index: GridIndex,
        size: f32,
        mesh: TerrainMesh,
        faces: Vec<Face>,
        vegetation: Vec<ScatterInstance>,
        structures: Vec<ScatterInstance>,
        bounds: Aabb,
    ) -> Self {
        Self {
            index,
            size,
            generator_version: 0,
            mesh: Arc::new(mesh),
            faces,
            vegetation: vegetation.into(),
            structures: structures.into(),
            bounds,
            populated: true,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn center(&self) -> (f32, f32) {
        (self.index.x as f32 * self.size, self.index.y as f32 * self.size)
    }

    pub fn attach(&self, sink: &mut dyn SceneSink) {
        sink.add(
            RenderKey::Terrain(self.index),
            Renderable::Terrain(Arc::clone(&self.mesh)),
        );
        sink.add(
            RenderKey::Vegetation(self.index),
            Renderable::Instances(Arc::clone(&self.vegetation)),
        );
        sink.add(
            RenderKey::Structures(self.index),
            Renderable::Instances(Arc::clone(&self.structures)),
        );
    }

    /// Pulls the cell out of the scene and releases its buffers. Calling it
    /// twice is harmless.
    pub fn dispose(&mut self, sink: &mut dyn SceneSink) {
        if !self.populated {
            return;
        }
        sink.remove(RenderKey::Terrain(self.index));
        sink.remove(RenderKey::Vegetation(self.index));
        sink.remove(RenderKey::Structures(self.index));
        self.faces = Vec::new();
        self.vegetation = Arc::from(Vec::new());
        self.structures = Arc::from(Vec::new());
        self.populated = false;
    }
}
