use cgmath::{InnerSpace, Point3, Vector3};

const PARALLEL_EPSILON: f32 = 1e-8;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3<f32>,
    /// Unit length.
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        let len_sq = direction.magnitude2();
        let direction = if len_sq > PARALLEL_EPSILON {
            direction / len_sq.sqrt()
        } else {
            Vector3::new(0.0, 0.0, -1.0)
        };
        Self { origin, direction }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }
}

/// A hit distance along a ray plus the surface normal there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub normal: Vector3<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn include(&mut self, p: Point3<f32>) {
        self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn grown(&self, by: f32) -> Self {
        Self {
            min: Point3::new(self.min.x - by, self.min.y - by, self.min.z - by),
            max: Point3::new(self.max.x + by, self.max.y + by, self.max.z + by),
        }
    }

    /// Whether the segment `[near, far]` of the ray touches the box.
    pub fn intersects_segment(&self, ray: &Ray, near: f32, far: f32) -> bool {
        let origin = [ray.origin.x, ray.origin.y, ray.origin.z];
        let dir = [ray.direction.x, ray.direction.y, ray.direction.z];
        let lo = [self.min.x, self.min.y, self.min.z];
        let hi = [self.max.x, self.max.y, self.max.z];
        let mut t0 = near;
        let mut t1 = far;
        for axis in 0..3 {
            if dir[axis].abs() < PARALLEL_EPSILON {
                if origin[axis] < lo[axis] || origin[axis] > hi[axis] {
                    return false;
                }
                continue;
            }
            let inv = dir[axis].recip();
            let mut a = (lo[axis] - origin[axis]) * inv;
            let mut b = (hi[axis] - origin[axis]) * inv;
            if a > b {
                std::mem::swap(&mut a, &mut b);
            }
            t0 = t0.max(a);
            t1 = t1.min(b);
            if t0 > t1 {
                return false;
            }
        }
        true
    }
}

fn within(t: f32, near: f32, far: f32) -> bool {
    t >= near && t <= far
}

/// Double-sided Möller–Trumbore. The returned normal is the face normal
/// `(b - a) x (c - a)`, not flipped toward the ray.
pub fn ray_triangle(
    ray: &Ray,
    a: Point3<f32>,
    b: Point3<f32>,
    c: Point3<f32>,
    near: f32,
    far: f32,
) -> Option<RayHit> {
    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let inv_det = det.recip();
    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    if !within(t, near, far) {
        return None;
    }
    Some(RayHit {
        distance: t,
        normal: edge1.cross(edge2).normalize(),
    })
}

/// Horizontal plane `z = height`, hit from either side.
pub fn ray_horizontal_plane(ray: &Ray, height: f32, near: f32, far: f32) -> Option<RayHit> {
    if ray.direction.z.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = (height - ray.origin.z) / ray.direction.z;
    if !within(t, near, far) {
        return None;
    }
    Some(RayHit {
        distance: t,
        normal: Vector3::unit_z(),
    })
}

pub fn ray_sphere(
    ray: &Ray,
    center: Point3<f32>,
    radius: f32,
    near: f32,
    far: f32,
) -> Option<RayHit> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.magnitude2() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    // Entry point first; a ray starting inside reports the exit.
    let t = [-b - root, -b + root]
        .into_iter()
        .find(|&t| within(t, near, far))?;
    Some(RayHit {
        distance: t,
        normal: (ray.at(t) - center).normalize(),
    })
}

/// Side wall of a vertical cylinder spanning `z_min..=z_max`.
pub fn ray_vertical_cylinder(
    ray: &Ray,
    base: Point3<f32>,
    radius: f32,
    z_min: f32,
    z_max: f32,
    near: f32,
    far: f32,
) -> Option<RayHit> {
    let ox = ray.origin.x - base.x;
    let oy = ray.origin.y - base.y;
    let dx = ray.direction.x;
    let dy = ray.direction.y;
    let a = dx * dx + dy * dy;
    if a < PARALLEL_EPSILON {
        return None;
    }
    let b = ox * dx + oy * dy;
    let c = ox * ox + oy * oy - radius * radius;
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    for t in [(-b - root) / a, (-b + root) / a] {
        if !within(t, near, far) {
            continue;
        }
        let hit = ray.at(t);
        if hit.z < base.z + z_min || hit.z > base.z + z_max {
            continue;
        }
        let normal = Vector3::new(hit.x - base.x, hit.y - base.y, 0.0).normalize();
        return Some(RayHit { distance: t, normal });
    }
    None
}

/// Box rotated by `yaw` about vertical around `center`, spanning
/// `±half_x`, `±half_y` and `z_min..=z_max` in its own frame.
#[derive(Clone, Copy, Debug)]
pub struct YawedBox {
    pub center: Point3<f32>,
    pub yaw: f32,
    pub half_x: f32,
    pub half_y: f32,
    pub z_min: f32,
    pub z_max: f32,
}

pub fn ray_yawed_box(ray: &Ray, shape: &YawedBox, near: f32, far: f32) -> Option<RayHit> {
    let YawedBox { center, yaw, half_x, half_y, z_min, z_max } = *shape;
    let (sin, cos) = yaw.sin_cos();
    // Into the box frame (rotate by -yaw).
    let to_local = |v: Vector3<f32>| Vector3::new(cos * v.x + sin * v.y, -sin * v.x + cos * v.y, v.z);
    let to_world = |v: Vector3<f32>| Vector3::new(cos * v.x - sin * v.y, sin * v.x + cos * v.y, v.z);

    let origin = to_local(ray.origin - center);
    let dir = to_local(ray.direction);
    let o = [origin.x, origin.y, origin.z];
    let d = [dir.x, dir.y, dir.z];
    let lo = [-half_x, -half_y, z_min];
    let hi = [half_x, half_y, z_max];

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_axis = 0usize;
    let mut enter_sign = -1.0f32;
    let mut exit_axis = 0usize;
    let mut exit_sign = 1.0f32;
    for axis in 0..3 {
        if d[axis].abs() < PARALLEL_EPSILON {
            if o[axis] < lo[axis] || o[axis] > hi[axis] {
                return None;
            }
            continue;
        }
        let inv = d[axis].recip();
        let t_lo = (lo[axis] - o[axis]) * inv;
        let t_hi = (hi[axis] - o[axis]) * inv;
        let (near_t, near_sign, far_t, far_sign) = if t_lo < t_hi {
            (t_lo, -1.0, t_hi, 1.0)
        } else {
            (t_hi, 1.0, t_lo, -1.0)
        };
        if near_t > t_enter {
            t_enter = near_t;
            enter_axis = axis;
            enter_sign = near_sign;
        }
        if far_t < t_exit {
            t_exit = far_t;
            exit_axis = axis;
            exit_sign = far_sign;
        }
        if t_enter > t_exit {
            return None;
        }
    }

    let (t, axis, sign) = if within(t_enter, near, far) {
        (t_enter, enter_axis, enter_sign)
    } else if within(t_exit, near, far) {
        (t_exit, exit_axis, exit_sign)
    } else {
        return None;
    };
    let mut local_normal = Vector3::new(0.0, 0.0, 0.0);
    local_normal[axis] = sign;
    Some(RayHit {
        distance: t,
        normal: to_world(local_normal),
    })
}

/// Angle in degrees between `normal` and world up.
pub fn slope_degrees(normal: Vector3<f32>) -> f32 {
    let len = normal.magnitude();
    if len <= PARALLEL_EPSILON {
        return 90.0;
    }
    (normal.z / len).clamp(-1.0, 1.0).acos().to_degrees()
}
