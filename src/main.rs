use clap::Parser;
use soaring_playground::contact::ContactListener;
use soaring_playground::flight::ControlInput;
use soaring_playground::scene::SceneRegistry;
use soaring_playground::{init_logging, ConfigError, SimConfig, Simulation};
use cgmath::Point3;
use std::path::PathBuf;
use std::process::ExitCode;
use web_time::Instant;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Flies the glider simulation without a renderer")]
struct Args {
    /// Simulated seconds to fly
    #[arg(long, default_value_t = 60.0)]
    duration: f32,

    /// Tick length in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// JSON configuration file; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parameter override as name=value, may be repeated
    #[arg(long = "set", value_name = "NAME=VALUE")]
    overrides: Vec<String>,

    /// Start position east, meters
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    start_x: f32,

    /// Start position north, meters
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    start_y: f32,

    /// Start height above ground or sea, meters
    #[arg(long, default_value_t = 300.0)]
    altitude: f32,

    /// Start paused; only the control surfaces move
    #[arg(long)]
    paused: bool,

    /// Elevator held for the whole flight, -1..1
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    elevator: f32,

    /// Ailerons held for the whole flight, -1..1
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    aileron: f32,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

#[derive(Default)]
struct ContactTally {
    water: u32,
    ground: u32,
    roof: u32,
    tree: u32,
}

impl ContactListener for ContactTally {
    fn water(&mut self, speed: f32) {
        self.water += 1;
        log::debug!("splash at {:.1} km/h", speed * 3.6);
    }

    fn ground(&mut self, speed: f32) {
        self.ground += 1;
        log::debug!("ground contact at {:.1} km/h", speed * 3.6);
    }

    fn roof(&mut self, speed: f32) {
        self.roof += 1;
        log::debug!("roof strike at {:.1} km/h", speed * 3.6);
    }

    fn tree(&mut self, speed: f32) {
        self.tree += 1;
        log::debug!("tree strike at {:.1} km/h", speed * 3.6);
    }
}

fn load_config(args: &Args) -> Result<SimConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("loading configuration from {}", path.display());
            SimConfig::load_json(path)?
        }
        None => SimConfig::default(),
    };
    for raw in &args.overrides {
        config.apply_override(raw)?;
    }
    Ok(config)
}

fn run(args: Args) -> Result<(), ConfigError> {
    let config = load_config(&args)?;
    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let mut sim = Simulation::new(config, Point3::new(args.start_x, args.start_y, 0.0))?;
    sim.place_vehicle(args.start_x, args.start_y, args.altitude);
    sim.vehicle_mut().paused = args.paused;

    let mut sink = SceneRegistry::new();
    let mut tally = ContactTally::default();
    let dt = args.dt.max(1.0e-4);
    let ticks = (args.duration.max(0.0) / dt).ceil() as u64;
    let ticks_per_report = (1.0 / dt).round().max(1.0) as u64;
    let wall = Instant::now();
    let mut cut_short = 0u64;

    for tick in 1..=ticks {
        let mut input = ControlInput::default();
        input.set_elevator(args.elevator);
        input.set_aileron(args.aileron);
        let report = sim.tick(dt, input, &mut sink, &mut tally);
        if report.stream.cut_short {
            cut_short += 1;
        }

        if tick % ticks_per_report == 0 || tick == ticks {
            let v = sim.vehicle();
            let ground = sim.ground_elevation(v.position.x, v.position.y);
            log::info!(
                "t={:6.1}s pos=({:8.1}, {:8.1}) alt={:7.1}m agl={:7.1}m speed={:5.1}km/h vario={:+5.2}m/s lift={:+5.2} roll={:+5.1}° pitch={:+5.1}° yaw={:+6.1}° cells={} renderables={}{}",
                v.flight_time,
                v.position.x,
                v.position.y,
                v.position.z,
                v.position.z - ground.max(0.0),
                v.airspeed * 3.6,
                v.lift,
                report.ambient_lift,
                v.attitude.roll.to_degrees(),
                v.attitude.pitch.to_degrees(),
                v.attitude.yaw.to_degrees(),
                report.stream.resident,
                sink.len(),
                if report.contact.supported { " supported" } else { "" }
            );
        }
    }

    let stats = sim.cache().last_stats();
    log::info!(
        "flew {} ticks in {:.2}s wall time; {} cells resident with {} trees and {} houses; {} ticks ran out of streaming budget",
        ticks,
        wall.elapsed().as_secs_f64(),
        stats.resident,
        stats.vegetation,
        stats.structures,
        cut_short
    );
    log::info!(
        "contacts: {} water, {} ground, {} roof, {} tree",
        tally.water,
        tally.ground,
        tally.roof,
        tally.tree
    );
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
