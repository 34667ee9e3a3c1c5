use crate::config::FlightParams;
use cgmath::{InnerSpace, Point3, Quaternion, Rad, Rotation, Rotation3, Vector3};
use std::f32::consts::PI;

const KMH: f32 = 3.6;
const FAST_KMH: f32 = 200.0;
const REDLINE_KMH: f32 = 280.0;
const STALL_PITCH_GAIN: f32 = 0.01;

/// Control targets for one tick. Axis targets are clamped to `[-1, 1]`, and
/// a zero target never overwrites one already asserted this tick, so several
/// input sources can be merged by calling the setters in turn.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlInput {
    elevator: f32,
    aileron: f32,
    rudder: f32,
    pub accelerate: bool,
    pub brake: bool,
    pub toggle_gear: bool,
    pub toggle_pause: bool,
}

fn assert_axis(slot: &mut f32, value: f32) {
    if value.is_finite() && value != 0.0 {
        *slot = value.clamp(-1.0, 1.0);
    }
}

impl ControlInput {
    pub fn set_elevator(&mut self, value: f32) {
        assert_axis(&mut self.elevator, value);
    }

    pub fn set_aileron(&mut self, value: f32) {
        assert_axis(&mut self.aileron, value);
    }

    pub fn set_rudder(&mut self, value: f32) {
        assert_axis(&mut self.rudder, value);
    }

    /// Elevator, aileron, rudder.
    pub fn axes(&self) -> [f32; 3] {
        [self.elevator, self.aileron, self.rudder]
    }
}

/// Roll, pitch and yaw in radians, derived from the orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Attitude {
    /// Positive with the right wing down.
    pub roll: f32,
    /// Positive nose up.
    pub pitch: f32,
    /// Heading clockwise from +y.
    pub yaw: f32,
}

impl Attitude {
    pub fn from_orientation(orientation: Quaternion<f32>) -> Self {
        let right = orientation.rotate_vector(Vector3::unit_x());
        let forward = orientation.rotate_vector(Vector3::unit_y());
        let up = orientation.rotate_vector(Vector3::unit_z());
        let world_up = Vector3::unit_z();

        let level = world_up - forward * world_up.dot(forward);
        let roll = if level.magnitude2() > f32::EPSILON {
            let level = level.normalize();
            let roll = level.dot(up).clamp(-1.0, 1.0).acos();
            if right.dot(level) > 0.0 {
                -roll
            } else {
                roll
            }
        } else {
            0.0
        };

        let flat = Vector3::new(forward.x, forward.y, 0.0);
        let (pitch, yaw) = if flat.magnitude2() > f32::EPSILON {
            let flat = flat.normalize();
            let pitch = forward.dot(flat).clamp(-1.0, 1.0).acos();
            let pitch = if forward.z < 0.0 { -pitch } else { pitch };
            (pitch, flat.x.atan2(flat.y))
        } else {
            (forward.z.signum() * PI / 2.0, 0.0)
        };

        Self { roll, pitch, yaw }
    }

    /// Roll measured from the nearer of upright and inverted flight.
    pub fn folded_roll(&self) -> f32 {
        if self.roll > PI / 2.0 {
            PI - self.roll
        } else if self.roll < -PI / 2.0 {
            -PI - self.roll
        } else {
            self.roll
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vehicle {
    pub position: Point3<f32>,
    pub orientation: Quaternion<f32>,
    /// m/s along the body forward axis.
    pub airspeed: f32,
    pub input: ControlInput,
    /// Rate-limited elevator, aileron, rudder.
    pub deflection: [f32; 3],
    pub brake_position: f32,
    /// 0 retracted, 1 extended.
    pub gear_position: f32,
    /// -1, 0 or 1.
    pub gear_direction: f32,
    pub flight_time: f32,
    pub paused: bool,
    /// Net vertical speed of the last running tick.
    pub lift: f32,
    pub attitude: Attitude,
}

impl Vehicle {
    pub fn new(position: Point3<f32>, params: &FlightParams) -> Self {
        Self {
            position,
            orientation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            airspeed: params.initial_speed,
            input: ControlInput::default(),
            deflection: [0.0; 3],
            brake_position: 0.0,
            gear_position: 0.0,
            gear_direction: 0.0,
            flight_time: 0.0,
            paused: false,
            lift: 0.0,
            attitude: Attitude::default(),
        }
    }

    pub fn right(&self) -> Vector3<f32> {
        self.orientation.rotate_vector(Vector3::unit_x())
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.orientation.rotate_vector(Vector3::unit_y())
    }

    pub fn up(&self) -> Vector3<f32> {
        self.orientation.rotate_vector(Vector3::unit_z())
    }

    /// Airspeed along the nose.
    pub fn velocity(&self) -> Vector3<f32> {
        self.forward() * self.airspeed
    }

    pub fn refresh_attitude(&mut self) {
        self.attitude = Attitude::from_orientation(self.orientation);
    }

    /// Reverses a moving gear, or starts a resting one toward the other end.
    pub fn toggle_gear(&mut self) {
        self.gear_direction = if self.gear_direction != 0.0 {
            -self.gear_direction
        } else if self.gear_position > 0.0 {
            -1.0
        } else {
            1.0
        };
    }

    fn rotate_body(&mut self, axis: Vector3<f32>, angle: f32) {
        if angle != 0.0 {
            self.orientation =
                (self.orientation * Quaternion::from_axis_angle(axis, Rad(angle))).normalize();
        }
    }

    fn rotate_world(&mut self, axis: Vector3<f32>, angle: f32) {
        if angle != 0.0 {
            self.orientation =
                (Quaternion::from_axis_angle(axis, Rad(angle)) * self.orientation).normalize();
        }
    }
}

/// Vertical sink in m/s for an airspeed in m/s.
pub fn sink_rate(airspeed: f32, roll: f32, stall_speed: f32) -> f32 {
    let kmh = airspeed * KMH;
    let stall_kmh = stall_speed * KMH;
    let roll_penalty = roll.abs() / PI;
    let fast = ((kmh - FAST_KMH) / 50.0).max(0.0);
    let redline = ((kmh - REDLINE_KMH) / 10.0).max(0.0);
    let stalled = ((stall_kmh - kmh) / 10.0).max(0.0);
    0.5 + airspeed / 50.0 + roll_penalty + fast + redline + stalled
}

/// Speed after trading `dz` meters of climb against kinetic energy; zero
/// instead of NaN when the climb costs more than is available.
pub fn energy_exchange(speed: f32, dz: f32, gravity: f32) -> f32 {
    (speed * speed - 2.0 * gravity * dz).max(0.0).sqrt()
}

fn overspeed_factor(airspeed: f32) -> f32 {
    let over = (airspeed * KMH - REDLINE_KMH).max(0.0);
    (1.0 - over * over / (20.0 * 20.0) / 200.0).max(0.0)
}

fn approach(current: f32, target: f32, max_step: f32) -> f32 {
    if current < target {
        (current + max_step).min(target)
    } else if current > target {
        (current - max_step).max(target)
    } else {
        current
    }
}

pub struct FlightIntegrator {
    params: FlightParams,
}

impl FlightIntegrator {
    pub fn new(params: FlightParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FlightParams {
        &self.params
    }

    pub fn set_params(&mut self, params: FlightParams) {
        self.params = params;
    }

    /// Advances the vehicle by `dt` seconds. `supported` is the flag the
    /// contact pass produced on the previous tick.
    pub fn step(
        &self,
        vehicle: &mut Vehicle,
        dt: f32,
        ambient_lift: f32,
        wind: Vector3<f32>,
        supported: bool,
    ) {
        let p = &self.params;
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let input = vehicle.input;
        if input.toggle_pause {
            vehicle.paused = !vehicle.paused;
            log::info!("simulation {}", if vehicle.paused { "paused" } else { "resumed" });
        }
        if input.toggle_gear {
            vehicle.toggle_gear();
        }

        // Control surfaces move even while paused.
        let axes = [Vector3::unit_x(), Vector3::unit_y(), -Vector3::unit_z()];
        for (a, (axis, target)) in axes.into_iter().zip(input.axes()).enumerate() {
            let deflection = approach(vehicle.deflection[a], target, p.control_rate * dt);
            vehicle.deflection[a] = deflection;
            vehicle.rotate_body(axis, deflection * p.control_authority * dt);
        }
        let brake_target = if input.brake { 1.0 } else { 0.0 };
        vehicle.brake_position = approach(vehicle.brake_position, brake_target, p.brake_rate * dt);

        if !vehicle.paused {
            let accelerate = if input.accelerate { 1.0 } else { 0.0 };
            vehicle.airspeed += p.acceleration * dt * accelerate;
            vehicle.airspeed -= p.acceleration * dt * vehicle.brake_position;
            vehicle.airspeed = vehicle.airspeed.max(0.0);

            let attitude = Attitude::from_orientation(vehicle.orientation);
            vehicle.lift = ambient_lift - sink_rate(vehicle.airspeed, attitude.roll, p.stall_speed);

            let start_z = vehicle.position.z;
            vehicle.position += vehicle.forward() * (vehicle.airspeed * dt);
            vehicle.position -= wind * dt;
            vehicle.position.z += vehicle.lift * dt;
            let dz = vehicle.position.z - start_z;

            vehicle.airspeed = energy_exchange(vehicle.airspeed, dz, p.gravity);
            vehicle.airspeed *= overspeed_factor(vehicle.airspeed);

            if vehicle.airspeed < p.stall_speed && !supported {
                let margin = p.stall_speed - vehicle.airspeed;
                let sign = if vehicle.up().z > 0.0 { -1.0 } else { 1.0 };
                vehicle.rotate_body(
                    Vector3::unit_x(),
                    STALL_PITCH_GAIN * dt * margin * margin * margin * sign,
                );
            }

            let attitude = Attitude::from_orientation(vehicle.orientation);
            let folded = attitude.folded_roll();
            let level = if attitude.roll > PI / 2.0 {
                PI
            } else if attitude.roll < -PI / 2.0 {
                -PI
            } else {
                0.0
            };
            vehicle.rotate_body(Vector3::unit_y(), (level - attitude.roll) * p.roll_bleed * dt);
            vehicle.rotate_world(Vector3::unit_z(), -folded * p.bank_turn_rate * dt);

            if vehicle.gear_direction != 0.0 {
                vehicle.gear_position += vehicle.gear_direction * p.gear_rate * dt;
                if vehicle.gear_position >= 1.0 {
                    vehicle.gear_position = 1.0;
                    vehicle.gear_direction = 0.0;
                } else if vehicle.gear_position <= 0.0 {
                    vehicle.gear_position = 0.0;
                    vehicle.gear_direction = 0.0;
                }
            }

            vehicle.flight_time += dt;
        }

        vehicle.refresh_attitude();
        vehicle.input = ControlInput::default();
    }
}
