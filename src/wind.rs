use crate::config::WindParams;
use crate::region_cache::RegionCache;
use cgmath::{InnerSpace, Point3, Quaternion, Rad, Rotation, Rotation3, Vector3};

/// Lift falls off as `1 / (LIFT_FALLOFF + distance)`.
const LIFT_FALLOFF: f32 = 50.0;

/// Source of the air mass the vehicle flies in.
pub trait AmbientWind {
    /// m/s, pointing where the air comes from.
    fn wind_vector(&self) -> Vector3<f32>;
    /// Vertical air movement at `position`, m/s.
    fn ambient_lift(&self, position: Point3<f32>, cells: &RegionCache) -> f32;
}

/// Uniform wind whose ridge lift comes from terrain faces turned into it.
#[derive(Clone, Debug, Default)]
pub struct Wind {
    params: WindParams,
}

impl Wind {
    pub fn new(params: WindParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &WindParams {
        &self.params
    }

    pub fn set_params(&mut self, params: WindParams) {
        self.params = params;
    }
}

impl AmbientWind for Wind {
    fn wind_vector(&self) -> Vector3<f32> {
        let rotation = Quaternion::from_angle_z(Rad(self.params.direction.to_radians()));
        rotation.rotate_vector(Vector3::new(0.0, self.params.speed / 3.6, 0.0))
    }

    fn ambient_lift(&self, position: Point3<f32>, cells: &RegionCache) -> f32 {
        let wind = self.wind_vector();
        if wind.magnitude2() == 0.0 {
            return 0.0;
        }
        let heading = wind.normalize();
        let range = self.params.range;

        let mut sum = 0.0f32;
        for cell in cells.cells() {
            let (cx, cy) = cell.center();
            let reach = range + cell.size * 0.5;
            if (cx - position.x).abs() > reach || (cy - position.y).abs() > reach {
                continue;
            }
            for face in &cell.faces {
                let offset = face.center - position;
                if offset.x.abs() > range || offset.y.abs() > range || offset.z.abs() > range {
                    continue;
                }
                sum += face.normal.dot(heading) / (LIFT_FALLOFF + offset.magnitude());
            }
        }
        self.params.lift_factor / 3.6 * self.params.speed * sum
    }
}
