//! Browser binding. The page owns rendering, audio and input; it feeds
//! controls in, ticks once per animation frame and pulls geometry out.

use crate::cell::GridIndex;
use crate::contact::ContactListener;
use crate::flight::ControlInput;
use crate::scene::{RenderKey, Renderable, SceneRegistry};
use crate::surfaces::SurfaceRig;
use crate::{SimConfig, Simulation};
use cgmath::Point3;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn start() {
    crate::init_logging();
}

/// Contact sounds collected during one tick, as `[kind, speed]` pairs with
/// kind 0 water, 1 ground, 2 roof, 3 tree.
#[derive(Default)]
struct SoundQueue {
    events: Vec<f32>,
}

impl ContactListener for SoundQueue {
    fn water(&mut self, speed: f32) {
        self.events.extend([0.0, speed]);
    }
    fn ground(&mut self, speed: f32) {
        self.events.extend([1.0, speed]);
    }
    fn roof(&mut self, speed: f32) {
        self.events.extend([2.0, speed]);
    }
    fn tree(&mut self, speed: f32) {
        self.events.extend([3.0, speed]);
    }
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct WebSimulation {
    sim: Simulation,
    scene: SceneRegistry,
    input: ControlInput,
    sounds: SoundQueue,
    rig: SurfaceRig,
}

#[wasm_bindgen]
impl WebSimulation {
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: Option<String>,
        x: f32,
        y: f32,
        altitude: f32,
    ) -> Result<WebSimulation, JsValue> {
        let config = match config_json {
            Some(json) => SimConfig::from_json_str(&json).map_err(js_error)?,
            None => SimConfig::default(),
        };
        let mut sim = Simulation::new(config, Point3::new(x, y, 0.0)).map_err(js_error)?;
        sim.place_vehicle(x, y, altitude);
        Ok(WebSimulation {
            sim,
            scene: SceneRegistry::new(),
            input: ControlInput::default(),
            sounds: SoundQueue::default(),
            rig: SurfaceRig::default(),
        })
    }

    pub fn set_elevator(&mut self, value: f32) {
        self.input.set_elevator(value);
    }

    pub fn set_aileron(&mut self, value: f32) {
        self.input.set_aileron(value);
    }

    pub fn set_rudder(&mut self, value: f32) {
        self.input.set_rudder(value);
    }

    pub fn set_accelerate(&mut self, on: bool) {
        self.input.accelerate |= on;
    }

    pub fn set_brake(&mut self, on: bool) {
        self.input.brake |= on;
    }

    pub fn toggle_gear(&mut self) {
        self.input.toggle_gear = true;
    }

    pub fn toggle_pause(&mut self) {
        self.input.toggle_pause = true;
    }

    /// Runs one tick with the controls asserted since the last one.
    pub fn tick(&mut self, dt: f32) -> bool {
        let input = std::mem::take(&mut self.input);
        self.sounds.events.clear();
        self.sim
            .tick(dt, input, &mut self.scene, &mut self.sounds)
            .contact
            .supported
    }

    /// Returns true when generated cells will be rebuilt.
    pub fn apply_setting(&mut self, name: &str, value: f64) -> Result<bool, JsValue> {
        let invalidation = self.sim.apply_setting(name, value).map_err(js_error)?;
        Ok(invalidation == crate::Invalidation::Cells)
    }

    pub fn config_json(&self) -> Result<String, JsValue> {
        self.sim.config().to_json_pretty().map_err(js_error)
    }

    /// `[x, y, z]`
    pub fn position(&self) -> Vec<f32> {
        let p = self.sim.vehicle().position;
        vec![p.x, p.y, p.z]
    }

    /// `[x, y, z, w]`
    pub fn orientation(&self) -> Vec<f32> {
        let q = self.sim.vehicle().orientation;
        vec![q.v.x, q.v.y, q.v.z, q.s]
    }

    /// `[airspeed, lift, roll, pitch, yaw, gear, brake, flight time]`
    pub fn instruments(&self) -> Vec<f32> {
        let v = self.sim.vehicle();
        vec![
            v.airspeed,
            v.lift,
            v.attitude.roll,
            v.attitude.pitch,
            v.attitude.yaw,
            v.gear_position,
            v.brake_position,
            v.flight_time,
        ]
    }

    pub fn paused(&self) -> bool {
        self.sim.vehicle().paused
    }

    pub fn sounds(&self) -> Vec<f32> {
        self.sounds.events.clone()
    }

    /// Resident cell indices, flattened `[gx, gy, ...]`.
    pub fn resident_cells(&self) -> Vec<i32> {
        self.sim
            .cache()
            .cells()
            .flat_map(|cell| [cell.index.x, cell.index.y])
            .collect()
    }

    pub fn terrain_vertices(&self, gx: i32, gy: i32) -> Option<Vec<u8>> {
        match self.scene.get(&RenderKey::Terrain(GridIndex::new(gx, gy)))? {
            Renderable::Terrain(mesh) => Some(mesh.vertex_bytes().to_vec()),
            _ => None,
        }
    }

    pub fn terrain_indices(&self, gx: i32, gy: i32) -> Option<Vec<u8>> {
        match self.scene.get(&RenderKey::Terrain(GridIndex::new(gx, gy)))? {
            Renderable::Terrain(mesh) => Some(mesh.index_bytes().to_vec()),
            _ => None,
        }
    }

    /// Column-major model matrices, 16 floats per instance.
    pub fn vegetation(&self, gx: i32, gy: i32) -> Vec<f32> {
        self.instance_matrices(RenderKey::Vegetation(GridIndex::new(gx, gy)))
    }

    pub fn structures(&self, gx: i32, gy: i32) -> Vec<f32> {
        self.instance_matrices(RenderKey::Structures(GridIndex::new(gx, gy)))
    }

    /// Resolves the airframe model's node names, in traversal order.
    pub fn bind_airframe(&mut self, node_names: Vec<String>) {
        self.rig = SurfaceRig::resolve(node_names.iter().map(String::as_str));
    }

    /// `[node, tx, ty, tz, rx, ry, rz]` per resolved control surface.
    pub fn surface_poses(&self) -> Vec<f32> {
        self.rig
            .poses(self.sim.vehicle())
            .into_iter()
            .flat_map(|(node, pose)| {
                [
                    node.0 as f32,
                    pose.translation.x,
                    pose.translation.y,
                    pose.translation.z,
                    pose.rotation.x,
                    pose.rotation.y,
                    pose.rotation.z,
                ]
            })
            .collect()
    }

    /// `[x, y, z, scale, color]` per particle.
    pub fn particles(&self) -> Vec<f32> {
        match self.scene.get(&RenderKey::ContactParticles) {
            Some(Renderable::Particles(batch)) => batch
                .iter()
                .flat_map(|p| [p.position.x, p.position.y, p.position.z, p.scale, p.color as f32])
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl WebSimulation {
    fn instance_matrices(&self, key: RenderKey) -> Vec<f32> {
        match self.scene.get(&key) {
            Some(Renderable::Instances(instances)) => instances
                .iter()
                .flat_map(|instance| {
                    let matrix: [f32; 16] = *instance.model_matrix().as_ref();
                    matrix
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
