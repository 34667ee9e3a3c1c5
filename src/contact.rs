use crate::cell::Cell;
use crate::config::ContactParams;
use crate::flight::Vehicle;
use crate::geometry::{ray_horizontal_plane, Ray, RayHit};
use crate::particles::ParticlePool;
use crate::region_cache::RegionCache;
use crate::scatter::{ScatterInstance, MAX_OBJECT_EXTENT};
use crate::scene::SceneSink;
use cgmath::{Point3, Rotation, Vector3};

const WATER_COLOR: u32 = 0x0000ff;
const TERRAIN_COLOR: u32 = 0x8b6b3d;
const VEGETATION_COLOR: u32 = 0x7aa21d;
const STRUCTURE_COLOR: u32 = 0xc00000;

/// Penetration of this many meters stops the vehicle dead.
const SPEED_LOSS_DEPTH: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbeDirection {
    Left,
    Right,
    Forward,
    Down,
}

impl ProbeDirection {
    /// Cast order.
    pub const ALL: [ProbeDirection; 4] = [
        ProbeDirection::Left,
        ProbeDirection::Right,
        ProbeDirection::Forward,
        ProbeDirection::Down,
    ];

    pub fn body_vector(self) -> Vector3<f32> {
        match self {
            ProbeDirection::Left => Vector3::new(-1.0, 0.0, 0.0),
            ProbeDirection::Right => Vector3::new(1.0, 0.0, 0.0),
            ProbeDirection::Forward => Vector3::new(0.0, 1.0, 0.0),
            ProbeDirection::Down => Vector3::new(0.0, 0.0, -1.0),
        }
    }

    fn reach(self, params: &ContactParams) -> f32 {
        match self {
            ProbeDirection::Left | ProbeDirection::Right => params.side_probe,
            ProbeDirection::Forward => params.forward_probe,
            ProbeDirection::Down => params.down_probe,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceClass {
    Water,
    Terrain,
    Structure,
    Vegetation,
}

impl SurfaceClass {
    fn particle_color(self) -> u32 {
        match self {
            SurfaceClass::Water => WATER_COLOR,
            SurfaceClass::Terrain => TERRAIN_COLOR,
            SurfaceClass::Structure => STRUCTURE_COLOR,
            SurfaceClass::Vegetation => VEGETATION_COLOR,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeContact {
    pub surface: SurfaceClass,
    pub point: Point3<f32>,
    pub normal: Vector3<f32>,
    pub distance: f32,
    /// `max_distance - distance`
    pub penetration: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeReport {
    pub direction: ProbeDirection,
    pub max_distance: f32,
    pub contact: Option<ProbeContact>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactReport {
    pub probes: [ProbeReport; 4],
    /// Resting on terrain or water this tick.
    pub supported: bool,
}

impl ContactReport {
    pub fn probe(&self, direction: ProbeDirection) -> &ProbeReport {
        match direction {
            ProbeDirection::Left => &self.probes[0],
            ProbeDirection::Right => &self.probes[1],
            ProbeDirection::Forward => &self.probes[2],
            ProbeDirection::Down => &self.probes[3],
        }
    }

    pub fn hits(&self) -> impl Iterator<Item = &ProbeContact> {
        self.probes.iter().filter_map(|probe| probe.contact.as_ref())
    }
}

/// Sound hooks for contacts. Every method receives the airspeed after the
/// contact was resolved.
pub trait ContactListener {
    fn water(&mut self, _speed: f32) {}
    fn ground(&mut self, _speed: f32) {}
    fn roof(&mut self, _speed: f32) {}
    fn tree(&mut self, _speed: f32) {}
}

impl ContactListener for () {}

pub struct ContactResolver {
    params: ContactParams,
}

impl ContactResolver {
    pub fn new(params: ContactParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ContactParams {
        &self.params
    }

    pub fn set_params(&mut self, params: ContactParams) {
        self.params = params;
    }

    /// Probes the resident world around the vehicle, pushes it out of
    /// terrain and ages the contact particles.
    pub fn update(
        &self,
        vehicle: &mut Vehicle,
        cache: &RegionCache,
        dt: f32,
        particles: &mut ParticlePool,
        sink: &mut dyn SceneSink,
        listener: &mut dyn ContactListener,
    ) -> ContactReport {
        let cells: Vec<&Cell> = cache.cells().collect();
        let report = self.resolve(vehicle, &cells, particles, listener);
        particles.update(dt, vehicle.paused, sink);
        report
    }

    pub(crate) fn resolve(
        &self,
        vehicle: &mut Vehicle,
        cells: &[&Cell],
        particles: &mut ParticlePool,
        listener: &mut dyn ContactListener,
    ) -> ContactReport {
        let mut supported = false;
        let probes = ProbeDirection::ALL.map(|direction| {
            let max_distance = direction.reach(&self.params);
            let dir = vehicle.orientation.rotate_vector(direction.body_vector());
            let ray = Ray::new(vehicle.position, dir);
            let contact = nearest_contact(&ray, self.params.near, max_distance, cells);

            if let Some(contact) = contact {
                particles.spawn(contact.point, vehicle.velocity(), contact.surface.particle_color());
                match contact.surface {
                    SurfaceClass::Water => {
                        vehicle.position.z = vehicle.position.z.max(0.0);
                        supported = true;
                        if !vehicle.paused {
                            listener.water(vehicle.airspeed);
                        }
                    }
                    SurfaceClass::Terrain => {
                        vehicle.position += contact.normal * contact.penetration;
                        vehicle.airspeed *= (1.0 - contact.penetration / SPEED_LOSS_DEPTH).max(0.0);
                        supported = true;
                        listener.ground(vehicle.airspeed);
                    }
                    SurfaceClass::Structure => listener.roof(vehicle.airspeed),
                    SurfaceClass::Vegetation => listener.tree(vehicle.airspeed),
                }
                log::trace!("{direction:?} probe hit {:?} at {:.3}", contact.surface, contact.distance);
            }

            ProbeReport {
                direction,
                max_distance,
                contact,
            }
        });

        ContactReport { probes, supported }
    }
}

fn near_anchor(instance: &ScatterInstance, ray: &Ray, far: f32) -> bool {
    let reach = far + MAX_OBJECT_EXTENT;
    (instance.position.x - ray.origin.x).abs() <= reach
        && (instance.position.y - ray.origin.y).abs() <= reach
}

/// Nearest hit along the segment `[near, far]` over the water plane and
/// every populated cell the segment can reach. Ties keep the earlier class
/// in the order water, terrain, structure, vegetation.
fn nearest_contact(ray: &Ray, near: f32, far: f32, cells: &[&Cell]) -> Option<ProbeContact> {
    let mut best: Option<(SurfaceClass, RayHit)> = None;
    let mut offer = |surface: SurfaceClass, hit: Option<RayHit>| {
        if let Some(hit) = hit {
            if best.map_or(true, |(_, b)| hit.distance < b.distance) {
                best = Some((surface, hit));
            }
        }
    };

    offer(SurfaceClass::Water, ray_horizontal_plane(ray, 0.0, near, far));
    for cell in cells {
        if !cell.is_populated() || !cell.bounds.intersects_segment(ray, near, far) {
            continue;
        }
        offer(SurfaceClass::Terrain, cell.mesh.ray_hit(ray, near, far));
        for instance in cell.structures.iter().filter(|i| near_anchor(i, ray, far)) {
            offer(SurfaceClass::Structure, instance.ray_hit(ray, near, far));
        }
        for instance in cell.vegetation.iter().filter(|i| near_anchor(i, ray, far)) {
            offer(SurfaceClass::Vegetation, instance.ray_hit(ray, near, far));
        }
    }

    best.map(|(surface, hit)| ProbeContact {
        surface,
        point: ray.at(hit.distance),
        normal: hit.normal,
        distance: hit.distance,
        penetration: far - hit.distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{GridIndex, TerrainMesh, TerrainVertex};
    use crate::config::{FlightParams, ScatterParams, StreamingParams, TerrainParams};
    use crate::geometry::Aabb;
    use crate::heightfield::HeightField;
    use crate::mesher::{faces_of, triangulate};
    use crate::scatter::ScatterKind;
    use crate::scene::{NullSink, RenderKey, SceneRegistry};
    use cgmath::{InnerSpace, Quaternion, Rad, Rotation3};

    #[derive(Default)]
    struct Recorder {
        events: Vec<(&'static str, f32)>,
    }

    impl ContactListener for Recorder {
        fn water(&mut self, speed: f32) {
            self.events.push(("water", speed));
        }
        fn ground(&mut self, speed: f32) {
            self.events.push(("ground", speed));
        }
        fn roof(&mut self, speed: f32) {
            self.events.push(("roof", speed));
        }
        fn tree(&mut self, speed: f32) {
            self.events.push(("tree", speed));
        }
    }

    /// Level ground at `height` with no scatter.
    fn flat(height: f64) -> TerrainParams {
        TerrainParams {
            multiplier_1: 0.0,
            multiplier_2: 0.0,
            multiplier_3: 0.0,
            water_level: -height,
            ..TerrainParams::default()
        }
    }

    fn bare() -> ScatterParams {
        ScatterParams {
            vegetation_density: 0.0,
            structure_density: 0.0,
            ..ScatterParams::default()
        }
    }

    fn streamed(terrain: TerrainParams, scatter: ScatterParams) -> RegionCache {
        let mut cache = RegionCache::new(
            StreamingParams {
                cell_size: 1000.0,
                range: 1000.0,
                budget_ms: 1.0e9,
            },
            terrain,
            scatter,
        );
        cache.update(0.0, 0.0, &mut NullSink);
        cache
    }

    fn vehicle_at(x: f32, y: f32, z: f32) -> Vehicle {
        let mut vehicle = Vehicle::new(Point3::new(x, y, z), &FlightParams::default());
        vehicle.airspeed = 20.0;
        vehicle
    }

    fn one_cell(terrain: TerrainParams, structures: Vec<ScatterInstance>) -> Cell {
        one_cell_with(terrain, Vec::new(), structures)
    }

    fn one_cell_with(
        terrain: TerrainParams,
        vegetation: Vec<ScatterInstance>,
        structures: Vec<ScatterInstance>,
    ) -> Cell {
        let field = HeightField::new(terrain);
        let mesh = triangulate(&field, 0.0, 0.0, 1000.0, 50.0);
        let faces = faces_of(&mesh);
        let mut bounds = Aabb::empty();
        for v in &mesh.vertices {
            bounds.include(v.point());
        }
        Cell::new(
            GridIndex::new(0, 0),
            1000.0,
            mesh,
            faces,
            vegetation,
            structures,
            bounds.grown(MAX_OBJECT_EXTENT),
        )
    }

    #[test]
    fn clear_air_leaves_the_vehicle_alone() {
        let cache = streamed(TerrainParams::default(), ScatterParams::default());
        let resolver = ContactResolver::new(ContactParams::default());
        let mut vehicle = vehicle_at(120.0, 340.0, 5000.0);
        let before = vehicle.clone();
        let mut particles = ParticlePool::new(100);
        let mut recorder = Recorder::default();

        let report = resolver.update(&mut vehicle, &cache, 0.1, &mut particles, &mut NullSink, &mut recorder);
        assert!(!report.supported);
        assert_eq!(report.hits().count(), 0);
        assert_eq!(vehicle, before);
        assert!(particles.is_empty());
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn down_probe_just_above_ground_is_pushed_out() {
        let cache = streamed(flat(100.0), bare());
        let resolver = ContactResolver::new(ContactParams::default());
        let ground = cache.heightfield().elevation(10.0, 20.0);
        assert!((ground - 100.0).abs() < 1e-4);
        let mut vehicle = vehicle_at(10.0, 20.0, ground + 0.05);
        let mut particles = ParticlePool::new(100);
        let mut sink = SceneRegistry::new();
        let mut recorder = Recorder::default();

        let report = resolver.update(&mut vehicle, &cache, 0.0, &mut particles, &mut sink, &mut recorder);
        let down = report.probe(ProbeDirection::Down).contact.unwrap();
        assert_eq!(down.surface, SurfaceClass::Terrain);
        assert!((down.penetration - 0.25).abs() < 1e-3);
        assert!((down.normal.z - 1.0).abs() < 1e-5);
        assert!(report.supported);
        assert!((vehicle.position.z - (ground + 0.3)).abs() < 1e-3);
        assert!((vehicle.airspeed - 20.0 * (1.0 - down.penetration / 10.0)).abs() < 1e-4);
        assert_eq!(recorder.events.len(), 1);
        assert_eq!(recorder.events[0].0, "ground");
        assert_eq!(particles.len(), 1);
        assert!(sink.contains(&RenderKey::ContactParticles));
    }

    /// One 50 m quad rising half a meter per meter along +x.
    fn tilted_cell() -> Cell {
        let vertices = [(0.0, 0.0), (0.0, 50.0), (50.0, 0.0), (50.0, 50.0)]
            .iter()
            .map(|&(x, y)| TerrainVertex {
                position: [x, y, 100.0 + 0.5 * x],
                uv: [0.0, 0.0],
            })
            .collect::<Vec<_>>();
        let mesh = TerrainMesh {
            vertices,
            indices: vec![0, 2, 1, 1, 2, 3],
            segments: 1,
            segment_length: 50.0,
            min_x: 0.0,
            min_y: 0.0,
        };
        let faces = faces_of(&mesh);
        let mut bounds = Aabb::empty();
        for v in &mesh.vertices {
            bounds.include(v.point());
        }
        Cell::new(GridIndex::new(0, 0), 50.0, mesh, faces, Vec::new(), Vec::new(), bounds)
    }

    #[test]
    fn push_out_follows_the_surface_normal() {
        let cell = tilted_cell();
        let resolver = ContactResolver::new(ContactParams {
            side_probe: 0.01,
            forward_probe: 0.01,
            ..ContactParams::default()
        });
        let mut vehicle = vehicle_at(20.0, 20.0, 110.1);
        let start = vehicle.position;
        let mut particles = ParticlePool::new(100);

        let report = resolver.resolve(&mut vehicle, &[&cell], &mut particles, &mut ());
        let down = report.probe(ProbeDirection::Down).contact.unwrap();
        assert_eq!(down.surface, SurfaceClass::Terrain);
        assert!((down.penetration - 0.2).abs() < 1e-4);
        let expected = Vector3::new(-0.5, 0.0, 1.0).normalize();
        assert!((down.normal - expected).magnitude() < 1e-4);

        let moved = vehicle.position - start;
        assert!((moved - expected * 0.2).magnitude() < 1e-4);
        assert!((vehicle.airspeed - 20.0 * 0.98).abs() < 1e-4);
    }

    #[test]
    fn water_holds_the_vehicle_at_sea_level() {
        let cache = streamed(flat(-50.0), bare());
        let resolver = ContactResolver::new(ContactParams::default());
        let mut vehicle = vehicle_at(0.0, 0.0, 0.1);
        let mut particles = ParticlePool::new(100);
        let mut recorder = Recorder::default();

        let report = resolver.update(&mut vehicle, &cache, 0.0, &mut particles, &mut NullSink, &mut recorder);
        let down = report.probe(ProbeDirection::Down).contact.unwrap();
        assert_eq!(down.surface, SurfaceClass::Water);
        assert!(report.supported);
        assert_eq!(vehicle.position.z, 0.1);
        assert_eq!(vehicle.airspeed, 20.0);
        assert_eq!(recorder.events, vec![("water", 20.0)]);
        assert_eq!(particles.iter().next().unwrap().color, WATER_COLOR);

        vehicle.paused = true;
        let mut quiet = Recorder::default();
        resolver.update(&mut vehicle, &cache, 0.0, &mut particles, &mut NullSink, &mut quiet);
        assert!(quiet.events.is_empty());
    }

    #[test]
    fn structures_are_reported_but_do_not_move_the_vehicle() {
        let terrain = flat(100.0);
        let house = ScatterInstance {
            kind: ScatterKind::Structure,
            position: Point3::new(0.0, 0.0, 100.0),
            yaw: 0.0,
            scale: Vector3::new(7.0, 5.0, 5.0),
        };
        let cell = one_cell(terrain, vec![house]);
        let resolver = ContactResolver::new(ContactParams::default());
        // Facing +x, so the right probe points back along -y and the
        // forward probe at the wall.
        let mut vehicle = vehicle_at(-5.0, 0.0, 102.0);
        vehicle.orientation = Quaternion::from_angle_z(Rad(-std::f32::consts::FRAC_PI_2));
        let before = vehicle.clone();
        let mut particles = ParticlePool::new(100);
        let mut recorder = Recorder::default();

        let report = resolver.resolve(&mut vehicle, &[&cell], &mut particles, &mut recorder);
        let forward = report.probe(ProbeDirection::Forward).contact.unwrap();
        assert_eq!(forward.surface, SurfaceClass::Structure);
        assert!((forward.distance - 1.5).abs() < 1e-3);
        assert!((forward.normal.x + 1.0).abs() < 1e-4);
        assert!(!report.supported);
        assert_eq!(vehicle, before);
        assert!(recorder.events.contains(&("roof", 20.0)));
    }

    #[test]
    fn trees_are_reported_but_do_not_move_the_vehicle() {
        let tree = ScatterInstance {
            kind: ScatterKind::Vegetation,
            position: Point3::new(0.0, 0.0, 100.0),
            yaw: 0.0,
            scale: Vector3::new(1.0, 1.0, 1.0),
        };
        let cell = one_cell_with(flat(100.0), vec![tree], Vec::new());
        let resolver = ContactResolver::new(ContactParams::default());
        // Level with the trunk, below the crown, right wing toward the tree.
        let mut vehicle = vehicle_at(-3.0, 0.0, 101.5);
        let before = vehicle.clone();
        let mut particles = ParticlePool::new(100);
        let mut recorder = Recorder::default();

        let report = resolver.resolve(&mut vehicle, &[&cell], &mut particles, &mut recorder);
        let right = report.probe(ProbeDirection::Right).contact.unwrap();
        assert_eq!(right.surface, SurfaceClass::Vegetation);
        assert!((right.distance - 2.5).abs() < 1e-3);
        assert_eq!(report.hits().count(), 1);
        assert!(!report.supported);
        assert_eq!(vehicle, before);
        assert_eq!(recorder.events, vec![("tree", 20.0)]);
        assert_eq!(particles.len(), 1);
        assert_eq!(particles.iter().next().unwrap().color, VEGETATION_COLOR);
    }

    #[test]
    fn nearest_geometry_wins() {
        let house = |z: f32| ScatterInstance {
            kind: ScatterKind::Structure,
            position: Point3::new(0.0, 0.0, z),
            yaw: 0.0,
            scale: Vector3::new(7.0, 5.0, 5.0),
        };
        let ray = Ray::new(Point3::new(0.0, 0.0, 100.25), -Vector3::unit_z());

        // Roof peak at 99.93, under the ground.
        let buried = one_cell(flat(100.0), vec![house(94.6)]);
        let contact = nearest_contact(&ray, 0.0, 1.0, &[&buried]).unwrap();
        assert_eq!(contact.surface, SurfaceClass::Terrain);
        assert!((contact.distance - 0.25).abs() < 1e-4);

        // Roof peak at 100.13, above it.
        let poking = one_cell(flat(100.0), vec![house(94.8)]);
        let contact = nearest_contact(&ray, 0.0, 0.3, &[&poking]).unwrap();
        assert_eq!(contact.surface, SurfaceClass::Structure);
        assert!((contact.distance - 0.12).abs() < 1e-2);
    }

    #[test]
    fn disposed_cells_are_skipped() {
        let mut cell = one_cell(flat(100.0), Vec::new());
        cell.dispose(&mut NullSink);
        let ray = Ray::new(Point3::new(0.0, 0.0, 100.1), -Vector3::unit_z());
        assert!(nearest_contact(&ray, 0.0, 0.3, &[&cell]).is_none());
    }
}
