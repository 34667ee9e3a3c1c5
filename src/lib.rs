pub mod cell;
pub mod config;
pub mod contact;
pub mod flight;
pub mod geometry;
pub mod heightfield;
pub mod mesher;
pub mod particles;
pub mod random;
pub mod region_cache;
pub mod scatter;
pub mod scene;
pub mod simulation;
pub mod surfaces;
pub mod wind;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use config::{ConfigError, Invalidation, SimConfig};
pub use simulation::{Simulation, TickReport};

/// Installs the platform logger. Safe to call more than once.
pub fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            let _ = console_log::init_with_level(log::Level::Debug);
        } else {
            let env = env_logger::Env::default().default_filter_or("info");
            let _ = env_logger::Builder::from_env(env).try_init();
        }
    }
}
