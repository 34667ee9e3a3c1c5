use crate::scene::{RenderKey, Renderable, SceneSink};
use cgmath::{Point3, Vector3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::collections::VecDeque;
use std::sync::Arc;

const INITIAL_SCALE: f32 = 2.0;
const SHRINK_RATE: f32 = 4.0;
const DRAG: f32 = 0.98;
const MIN_SCALE: f32 = 0.1;
const SCATTER_SPEED: f32 = 15.0;
const RISE_SPEED: f32 = 5.0;
const PARTICLE_SEED: u64 = 0x5eed_d057;

/// A puff of dust or spray thrown up by a contact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: Point3<f32>,
    pub velocity: Vector3<f32>,
    pub scale: f32,
    /// 0xRRGGBB
    pub color: u32,
}

/// Bounded pool of cosmetic contact particles; the oldest is dropped once
/// the cap is reached.
pub struct ParticlePool {
    particles: VecDeque<Particle>,
    capacity: usize,
    rng: Pcg32,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: VecDeque::with_capacity(capacity),
            capacity,
            rng: Pcg32::seed_from_u64(PARTICLE_SEED),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.particles.len() > capacity {
            self.particles.pop_front();
        }
    }

    /// Spawns at `position`, carried along by the vehicle's own velocity
    /// plus a random upward kick.
    pub fn spawn(&mut self, position: Point3<f32>, carrier_velocity: Vector3<f32>, color: u32) {
        if self.capacity == 0 {
            return;
        }
        let kick = Vector3::new(
            self.rng.gen::<f32>() * SCATTER_SPEED,
            self.rng.gen::<f32>() * SCATTER_SPEED,
            self.rng.gen::<f32>() * SCATTER_SPEED + RISE_SPEED,
        );
        if self.particles.len() >= self.capacity {
            self.particles.pop_front();
        }
        self.particles.push_back(Particle {
            position,
            velocity: carrier_velocity + kick,
            scale: INITIAL_SCALE,
            color,
        });
    }

    /// Ages particles unless paused, drops burnt-out ones and republishes
    /// the batch.
    pub fn update(&mut self, dt: f32, paused: bool, sink: &mut dyn SceneSink) {
        if !paused {
            for p in self.particles.iter_mut() {
                p.scale -= dt * SHRINK_RATE;
                p.velocity *= DRAG;
                p.position += p.velocity * dt;
            }
            self.particles.retain(|p| p.scale > MIN_SCALE);
        }

        if self.particles.is_empty() {
            sink.remove(RenderKey::ContactParticles);
        } else {
            let batch: Arc<[Particle]> = self.particles.iter().copied().collect();
            sink.add(RenderKey::ContactParticles, Renderable::Particles(batch));
        }
    }
}
