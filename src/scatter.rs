use crate::cell::{Face, TerrainMesh};
use crate::geometry::{
    ray_sphere, ray_vertical_cylinder, ray_yawed_box, slope_degrees, Ray, RayHit, YawedBox,
};
use crate::random::ScatterRng;
use cgmath::{Matrix4, Point3, Quaternion, Rad, Rotation3, Vector3};
use std::f32::consts::PI;

const TRUNK_RADIUS: f32 = 0.5;
const TRUNK_BOTTOM: f32 = -1.0;
const TRUNK_TOP: f32 = 3.0;
const CROWN_HEIGHT: f32 = 6.0;
const CROWN_RADIUS: f32 = 4.0;

const WALL_HALF: f32 = 0.5;
const ROOF_HALF: f32 = 0.566;
const ROOF_BASE: f32 = 0.5;
const ROOF_PEAK: f32 = 1.066;

const STRUCTURE_SCALE: Vector3<f32> = Vector3::new(7.0, 5.0, 5.0);
const VEGETATION_SCALE: Vector3<f32> = Vector3::new(1.0, 1.0, 1.0);

/// Largest distance any object reaches from its anchor point.
pub const MAX_OBJECT_EXTENT: f32 = CROWN_HEIGHT + CROWN_RADIUS;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScatterKind {
    Vegetation,
    Structure,
}

impl ScatterKind {
    fn scale(self) -> Vector3<f32> {
        match self {
            ScatterKind::Vegetation => VEGETATION_SCALE,
            ScatterKind::Structure => STRUCTURE_SCALE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScatterInstance {
    pub kind: ScatterKind,
    pub position: Point3<f32>,
    /// Rotation about vertical, radians.
    pub yaw: f32,
    pub scale: Vector3<f32>,
}

impl ScatterInstance {
    pub fn rotation(&self) -> Quaternion<f32> {
        Quaternion::from_angle_z(Rad(self.yaw))
    }

    /// Translation, then yaw, then scale.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(Vector3::new(self.position.x, self.position.y, self.position.z))
            * Matrix4::from_angle_z(Rad(self.yaw))
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn ray_hit(&self, ray: &Ray, near: f32, far: f32) -> Option<RayHit> {
        let s = self.scale;
        match self.kind {
            ScatterKind::Vegetation => {
                let trunk = ray_vertical_cylinder(
                    ray,
                    self.position,
                    TRUNK_RADIUS * s.x,
                    TRUNK_BOTTOM * s.z,
                    TRUNK_TOP * s.z,
                    near,
                    far,
                );
                let crown_center = self.position + Vector3::new(0.0, 0.0, CROWN_HEIGHT * s.z);
                let crown = ray_sphere(ray, crown_center, CROWN_RADIUS * s.x, near, far);
                nearest(trunk, crown)
            }
            ScatterKind::Structure => {
                let walls = YawedBox {
                    center: self.position,
                    yaw: self.yaw,
                    half_x: WALL_HALF * s.x,
                    half_y: WALL_HALF * s.y,
                    z_min: -WALL_HALF * s.z,
                    z_max: WALL_HALF * s.z,
                };
                let roof = YawedBox {
                    half_x: ROOF_HALF * s.x,
                    half_y: ROOF_HALF * s.y,
                    z_min: ROOF_BASE * s.z,
                    z_max: ROOF_PEAK * s.z,
                    ..walls
                };
                nearest(
                    ray_yawed_box(ray, &walls, near, far),
                    ray_yawed_box(ray, &roof, near, far),
                )
            }
        }
    }
}

fn nearest(a: Option<RayHit>, b: Option<RayHit>) -> Option<RayHit> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.distance < a.distance { b } else { a }),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Density knobs of one scatter pass.
#[derive(Clone, Copy, Debug)]
pub struct ScatterPass {
    pub kind: ScatterKind,
    pub density_factor: f32,
    /// `(segment_length / reference_segment)²`
    pub segment_density: f32,
    pub max_slope_deg: f32,
}

/// Places instances of one kind over the mesh. A counting sweep draws one
/// number per eligible triangle, then a placement sweep draws three per
/// instance (two barycentric weights and a yaw).
pub fn scatter(
    mesh: &TerrainMesh,
    faces: &[Face],
    pass: ScatterPass,
    rng: &mut ScatterRng,
) -> Vec<ScatterInstance> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    let mut total = 0usize;
    for (t, face) in faces.iter().enumerate() {
        let angle = slope_degrees(face.normal);
        if angle >= pass.max_slope_deg {
            continue;
        }
        let flatness = pass.max_slope_deg - angle;
        let count =
            (pass.segment_density * pass.density_factor * rng.next_unit() * flatness).floor();
        if count < 1.0 {
            continue;
        }
        total += count as usize;
        counts.push((t, count as usize));
    }

    let scale = pass.kind.scale();
    let mut instances = Vec::with_capacity(total);
    for (t, count) in counts {
        let [a, b, c] = mesh.triangle(t);
        for _ in 0..count {
            let wa = rng.next_unit();
            let wb = rng.next_unit() * (1.0 - wa);
            let wc = 1.0 - wa - wb;
            let position = Point3::new(
                a.x * wa + b.x * wb + c.x * wc,
                a.y * wa + b.y * wb + c.y * wc,
                a.z * wa + b.z * wb + c.z * wc,
            );
            let yaw = rng.next_unit() * PI;
            instances.push(ScatterInstance {
                kind: pass.kind,
                position,
                yaw,
                scale,
            });
        }
    }
    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    fn tree_at(x: f32, y: f32, z: f32) -> ScatterInstance {
        ScatterInstance {
            kind: ScatterKind::Vegetation,
            position: Point3::new(x, y, z),
            yaw: 0.0,
            scale: VEGETATION_SCALE,
        }
    }

    #[test]
    fn tree_crown_and_trunk_are_hittable() {
        let tree = tree_at(0.0, 0.0, 0.0);
        let into_crown = Ray::new(Point3::new(-10.0, 0.0, 6.0), Vector3::unit_x());
        let hit = tree.ray_hit(&into_crown, 0.0, 7.5).unwrap();
        assert!((hit.distance - 6.0).abs() < 1e-4);

        let into_trunk = Ray::new(Point3::new(-5.0, 0.0, 1.0), Vector3::unit_x());
        let hit = tree.ray_hit(&into_trunk, 0.0, 7.5).unwrap();
        assert!((hit.distance - 4.5).abs() < 1e-4);

        let above = Ray::new(Point3::new(-5.0, 0.0, 20.0), Vector3::unit_x());
        assert!(tree.ray_hit(&above, 0.0, 7.5).is_none());
    }

    #[test]
    fn structure_roof_sits_above_walls() {
        let house = ScatterInstance {
            kind: ScatterKind::Structure,
            position: Point3::new(0.0, 0.0, 0.0),
            yaw: 0.0,
            scale: STRUCTURE_SCALE,
        };
        let onto_roof = Ray::new(Point3::new(0.0, 0.0, 5.5), -Vector3::unit_z());
        let hit = house.ray_hit(&onto_roof, 0.0, 0.3).unwrap();
        assert!(hit.normal.z > 0.9);
        let beside = Ray::new(Point3::new(10.0, 0.0, 5.5), -Vector3::unit_z());
        assert!(house.ray_hit(&beside, 0.0, 0.3).is_none());
    }

    #[test]
    fn model_matrix_places_origin_at_position() {
        let mut tree = tree_at(3.0, 4.0, 5.0);
        tree.yaw = 1.0;
        let m = tree.model_matrix();
        assert!((m.w.truncate() - Vector3::new(3.0, 4.0, 5.0)).magnitude() < 1e-6);
    }
}
