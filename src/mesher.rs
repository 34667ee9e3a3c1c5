use crate::cell::{Cell, Face, GridIndex, TerrainMesh, TerrainVertex};
use crate::config::{ScatterParams, TerrainParams};
use crate::geometry::Aabb;
use crate::heightfield::HeightField;
use crate::random::ScatterRng;
use crate::scatter::{scatter, ScatterKind, ScatterPass, MAX_OBJECT_EXTENT};
use cgmath::{InnerSpace, Vector3};

const UV_SCALE: f32 = 1.0 / 1000.0;

/// Builds terrain patches and their object scatter. Owns the scatter stream,
/// so the order cells are built in decides where objects land.
pub struct WorldMesher {
    heightfield: HeightField,
    scatter_params: ScatterParams,
    segment_length: f32,
    rng: ScatterRng,
}

impl WorldMesher {
    pub fn new(terrain: TerrainParams, scatter_params: ScatterParams) -> Self {
        let rng = ScatterRng::new(scatter_params.seed);
        Self {
            segment_length: terrain.segment_size,
            heightfield: HeightField::new(terrain),
            scatter_params,
            rng,
        }
    }

    pub fn heightfield(&self) -> &HeightField {
        &self.heightfield
    }

    pub fn segment_length(&self) -> f32 {
        self.segment_length
    }

    /// Swaps parameters in place. The scatter stream only restarts when its
    /// seed changes.
    pub fn reconfigure(&mut self, terrain: &TerrainParams, scatter_params: &ScatterParams) {
        if terrain != self.heightfield.params() {
            self.segment_length = terrain.segment_size;
            self.heightfield = HeightField::new(terrain.clone());
        }
        if scatter_params.seed != self.scatter_params.seed {
            self.rng = ScatterRng::new(scatter_params.seed);
        }
        self.scatter_params = scatter_params.clone();
    }

    pub fn build_cell(&mut self, index: GridIndex, size: f32) -> Cell {
        let origin_x = index.x as f32 * size;
        let origin_y = index.y as f32 * size;
        self.build(index, origin_x, origin_y, size, self.segment_length)
    }

    pub fn build(
        &mut self,
        index: GridIndex,
        origin_x: f32,
        origin_y: f32,
        size: f32,
        segment_length: f32,
    ) -> Cell {
        let mesh = triangulate(&self.heightfield, origin_x, origin_y, size, segment_length);
        let faces = faces_of(&mesh);

        let reference = self.scatter_params.reference_segment.max(f32::EPSILON);
        let segment_density = (segment_length / reference).powi(2);
        let pass = |kind, density_factor| ScatterPass {
            kind,
            density_factor,
            segment_density,
            max_slope_deg: self.scatter_params.max_slope_deg,
        };
        let vegetation_pass = pass(ScatterKind::Vegetation, self.scatter_params.vegetation_density);
        let structure_pass = pass(ScatterKind::Structure, self.scatter_params.structure_density);
        // Vegetation first: both passes share one continued stream.
        let vegetation = scatter(&mesh, &faces, vegetation_pass, &mut self.rng);
        let structures = scatter(&mesh, &faces, structure_pass, &mut self.rng);

        let mut bounds = Aabb::empty();
        for v in &mesh.vertices {
            bounds.include(v.point());
        }
        let bounds = bounds.grown(MAX_OBJECT_EXTENT);

        Cell::new(index, size, mesh, faces, vegetation, structures, bounds)
    }
}

/// Samples the height field on a regular grid centered at the origin and
/// splits every quad along its flatter diagonal.
pub fn triangulate(
    heightfield: &HeightField,
    origin_x: f32,
    origin_y: f32,
    size: f32,
    segment_length: f32,
) -> TerrainMesh {
    let segments = if segment_length > 0.0 {
        (size / segment_length).floor() as usize
    } else {
        0
    };
    let min_x = origin_x - size * 0.5;
    let min_y = origin_y - size * 0.5;
    let row = segments + 1;

    let mut vertices = Vec::with_capacity(row * row);
    for i in 0..row {
        for j in 0..row {
            let x = min_x + i as f32 * segment_length;
            let y = min_y + j as f32 * segment_length;
            vertices.push(TerrainVertex {
                position: [x, y, heightfield.elevation(x, y)],
                uv: [x * UV_SCALE, y * UV_SCALE],
            });
        }
    }

    let z = |idx: usize| vertices[idx].position[2];
    let mut indices = Vec::with_capacity(segments * segments * 6);
    for i in 0..segments {
        for j in 0..segments {
            let a = i * row + j;
            let b = a + 1;
            let c = a + row;
            let d = c + 1;
            let ad = (z(a) - z(d)).abs();
            let bc = (z(b) - z(c)).abs();
            let quad = if ad < bc {
                [a, d, b, a, c, d]
            } else {
                [a, c, b, b, c, d]
            };
            indices.extend(quad.iter().map(|&v| v as u32));
        }
    }

    TerrainMesh {
        vertices,
        indices,
        segments,
        segment_length,
        min_x,
        min_y,
    }
}

pub fn faces_of(mesh: &TerrainMesh) -> Vec<Face> {
    (0..mesh.triangle_count())
        .map(|t| {
            let [a, b, c] = mesh.triangle(t);
            let cross = (b - a).cross(c - a);
            let normal = if cross.magnitude2() > 0.0 {
                cross.normalize()
            } else {
                Vector3::unit_z()
            };
            let center = a + ((b - a) + (c - a)) / 3.0;
            Face { center, normal }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesher() -> WorldMesher {
        WorldMesher::new(TerrainParams::default(), ScatterParams::default())
    }

    #[test]
    fn grid_has_expected_vertex_and_triangle_counts() {
        let mut m = mesher();
        let cell = m.build(GridIndex::new(0, 0), 0.0, 0.0, 1000.0, 50.0);
        assert_eq!(cell.mesh.vertices.len(), 21 * 21);
        assert_eq!(cell.mesh.triangle_count(), 20 * 20 * 2);
        assert_eq!(cell.faces.len(), cell.mesh.triangle_count());
        assert!(cell.is_populated());
    }

    #[test]
    fn vertices_lie_on_the_height_field() {
        let mut m = mesher();
        let cell = m.build_cell(GridIndex::new(2, -1), 1000.0);
        let field = m.heightfield();
        for v in cell.mesh.vertices.iter().step_by(37) {
            let [x, y, z] = v.position;
            assert_eq!(z, field.elevation(x, y));
        }
        let first = cell.mesh.vertices[0].position;
        assert_eq!((first[0], first[1]), (1500.0, -1500.0));
    }

    #[test]
    fn every_face_normal_points_up() {
        let mut m = mesher();
        let cell = m.build_cell(GridIndex::new(1, 1), 1000.0);
        assert!(cell.faces.iter().all(|f| f.normal.z > 0.0));
        assert!(cell.faces.iter().all(|f| (f.normal.magnitude() - 1.0).abs() < 1e-4));
    }

    #[test]
    fn diagonal_follows_smaller_elevation_jump() {
        let field = HeightField::default();
        let mesh = triangulate(&field, 0.0, 0.0, 1000.0, 50.0);
        let row = mesh.segments + 1;
        for quad in 0..mesh.segments * mesh.segments {
            let (i, j) = (quad / mesh.segments, quad % mesh.segments);
            let a = i * row + j;
            let d = a + row + 1;
            let za = mesh.vertices[a].position[2];
            let zb = mesh.vertices[a + 1].position[2];
            let zc = mesh.vertices[a + row].position[2];
            let zd = mesh.vertices[d].position[2];
            let first = &mesh.indices[6 * quad..6 * quad + 3];
            if (za - zd).abs() < (zb - zc).abs() {
                assert_eq!(first, &[a as u32, d as u32, (a + 1) as u32]);
            } else {
                assert_eq!(first, &[a as u32, (a + row) as u32, (a + 1) as u32]);
            }
        }
    }

    #[test]
    fn scatter_is_reproducible_for_a_fixed_seed() {
        let index = GridIndex::new(3, 4);
        let first = mesher().build_cell(index, 1000.0);
        let second = mesher().build_cell(index, 1000.0);
        assert_eq!(first.vegetation.len(), second.vegetation.len());
        assert_eq!(first.structures.len(), second.structures.len());
        assert_eq!(&*first.vegetation, &*second.vegetation);
        assert_eq!(&*first.structures, &*second.structures);
    }

    #[test]
    fn scatter_stream_continues_between_cells() {
        let mut m = mesher();
        let index = GridIndex::new(3, 4);
        let first = m.build_cell(index, 1000.0);
        let again = m.build_cell(index, 1000.0);
        let total = first.vegetation.len() + first.structures.len();
        if total > 0 {
            assert_ne!(
                (&*first.vegetation, &*first.structures),
                (&*again.vegetation, &*again.structures)
            );
        }
    }

    #[test]
    fn instances_sit_on_flat_enough_triangles_inside_the_cell() {
        let mut m = mesher();
        let cell = m.build_cell(GridIndex::new(0, 0), 1000.0);
        for inst in cell.vegetation.iter().chain(cell.structures.iter()) {
            assert!(inst.position.x >= -500.0 && inst.position.x <= 500.0);
            assert!(inst.position.y >= -500.0 && inst.position.y <= 500.0);
            assert!((0.0..std::f32::consts::PI).contains(&inst.yaw));
        }
        assert!(cell.vegetation.iter().all(|i| i.kind == ScatterKind::Vegetation));
        assert!(cell.structures.iter().all(|i| i.kind == ScatterKind::Structure));
    }

    #[test]
    fn zero_density_disables_scatter() {
        let scatter_params = ScatterParams {
            vegetation_density: 0.0,
            structure_density: 0.0,
            ..ScatterParams::default()
        };
        let mut m = WorldMesher::new(TerrainParams::default(), scatter_params);
        let cell = m.build_cell(GridIndex::new(0, 0), 1000.0);
        assert!(cell.vegetation.is_empty());
        assert!(cell.structures.is_empty());
    }
}
