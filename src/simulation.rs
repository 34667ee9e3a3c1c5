use crate::config::{ConfigError, Invalidation, SimConfig};
use crate::contact::{ContactListener, ContactReport, ContactResolver};
use crate::flight::{ControlInput, FlightIntegrator, Vehicle};
use crate::particles::ParticlePool;
use crate::region_cache::{RegionCache, StreamStats};
use crate::scene::SceneSink;
use crate::wind::{AmbientWind, Wind};
use cgmath::Point3;

/// What one tick did.
#[derive(Clone, Copy, Debug)]
pub struct TickReport {
    pub ambient_lift: f32,
    pub stream: StreamStats,
    pub contact: ContactReport,
}

/// Owns every piece of simulation state. One `tick` integrates the flight,
/// streams cells around the new position, then resolves contact.
pub struct Simulation {
    config: SimConfig,
    cache: RegionCache,
    integrator: FlightIntegrator,
    resolver: ContactResolver,
    wind: Wind,
    particles: ParticlePool,
    vehicle: Vehicle,
    supported: bool,
}

impl Simulation {
    pub fn new(config: SimConfig, start: Point3<f32>) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "simulation starting at ({:.1}, {:.1}, {:.1}), cell size {} m, range {} m",
            start.x,
            start.y,
            start.z,
            config.streaming.cell_size,
            config.streaming.range
        );
        Ok(Self {
            cache: RegionCache::new(
                config.streaming.clone(),
                config.terrain.clone(),
                config.scatter.clone(),
            ),
            integrator: FlightIntegrator::new(config.flight.clone()),
            resolver: ContactResolver::new(config.contact.clone()),
            wind: Wind::new(config.wind.clone()),
            particles: ParticlePool::new(config.contact.max_particles),
            vehicle: Vehicle::new(start, &config.flight),
            supported: false,
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn cache(&self) -> &RegionCache {
        &self.cache
    }

    pub fn wind(&self) -> &Wind {
        &self.wind
    }

    pub fn particles(&self) -> &ParticlePool {
        &self.particles
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut Vehicle {
        &mut self.vehicle
    }

    pub fn supported(&self) -> bool {
        self.supported
    }

    pub fn ground_elevation(&self, x: f32, y: f32) -> f32 {
        self.cache.heightfield().elevation(x, y)
    }

    /// Puts the vehicle `height` meters above the ground or sea at `(x, y)`.
    pub fn place_vehicle(&mut self, x: f32, y: f32, height: f32) {
        let surface = self.ground_elevation(x, y).max(0.0);
        self.vehicle.position = Point3::new(x, y, surface + height);
        self.vehicle.refresh_attitude();
    }

    pub fn tick(
        &mut self,
        dt: f32,
        input: ControlInput,
        sink: &mut dyn SceneSink,
        listener: &mut dyn ContactListener,
    ) -> TickReport {
        self.vehicle.input = input;
        let ambient_lift = self.wind.ambient_lift(self.vehicle.position, &self.cache);
        let wind = self.wind.wind_vector();
        self.integrator
            .step(&mut self.vehicle, dt, ambient_lift, wind, self.supported);

        let position = self.vehicle.position;
        let stream = self.cache.update(position.x, position.y, sink);

        let contact = self.resolver.update(
            &mut self.vehicle,
            &self.cache,
            dt,
            &mut self.particles,
            sink,
            listener,
        );
        self.supported = contact.supported;

        TickReport {
            ambient_lift,
            stream,
            contact,
        }
    }

    /// Hot-reloads one named parameter. Rejected values leave the running
    /// simulation untouched.
    pub fn apply_setting(&mut self, name: &str, value: f64) -> Result<Invalidation, ConfigError> {
        let invalidation = self.config.set(name, value).map_err(|e| {
            log::warn!("rejected setting {name} = {value}: {e}");
            e
        })?;
        log::info!("setting {name} = {value}");
        self.propagate(invalidation);
        Ok(invalidation)
    }

    /// Swaps in a whole configuration, invalidating cells when the generator
    /// or cell size changed.
    pub fn apply_config(&mut self, config: SimConfig) -> Result<Invalidation, ConfigError> {
        config.validate()?;
        let invalidation = if config.terrain != self.config.terrain
            || config.scatter != self.config.scatter
            || config.streaming.cell_size != self.config.streaming.cell_size
        {
            Invalidation::Cells
        } else {
            Invalidation::None
        };
        self.config = config;
        self.propagate(invalidation);
        Ok(invalidation)
    }

    fn propagate(&mut self, invalidation: Invalidation) {
        let config = &self.config;
        self.cache.set_streaming(config.streaming.clone());
        if invalidation == Invalidation::Cells {
            self.cache.set_generator(&config.terrain, &config.scatter);
        }
        self.integrator.set_params(config.flight.clone());
        self.resolver.set_params(config.contact.clone());
        self.wind.set_params(config.wind.clone());
        self.particles.set_capacity(config.contact.max_particles);
    }
}
