use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Noise periods, multipliers and the sea level offset of the height field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    pub period_a: f64,
    pub period_b: f64,
    pub period_c: f64,
    pub multiplier_1: f64,
    pub multiplier_2: f64,
    pub multiplier_3: f64,
    pub water_level: f64,
    pub segment_size: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 0,
            period_a: 0.003,
            period_b: 0.001,
            period_c: 0.0002,
            multiplier_1: 300.0,
            multiplier_2: 500.0,
            multiplier_3: 500.0,
            water_level: 500.0,
            segment_size: 50.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScatterParams {
    pub seed: u64,
    pub reference_segment: f32,
    pub vegetation_density: f32,
    pub structure_density: f32,
    /// Steepest triangle (degrees from vertical) that still receives objects.
    pub max_slope_deg: f32,
}

impl Default for ScatterParams {
    fn default() -> Self {
        Self {
            seed: 12_345_678,
            reference_segment: 50.0,
            vegetation_density: 0.5,
            structure_density: 0.1,
            max_slope_deg: 30.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingParams {
    pub cell_size: f32,
    pub range: f32,
    /// Wall-clock budget of a single `RegionCache::update`, in milliseconds.
    pub budget_ms: f64,
}

impl Default for StreamingParams {
    fn default() -> Self {
        Self {
            cell_size: 1000.0,
            range: 3000.0,
            budget_ms: 5.0,
        }
    }
}

/// Largest accepted add threshold, in cells.
pub const MAX_STREAM_REACH: f32 = 256.0;

impl StreamingParams {
    pub fn budget(&self) -> Duration {
        Duration::try_from_secs_f64(self.budget_ms.max(0.0) / 1000.0).unwrap_or(Duration::MAX)
    }

    pub fn add_threshold(&self) -> f32 {
        1.5 * self.range / self.cell_size
    }

    pub fn remove_threshold(&self) -> f32 {
        2.0 * self.range / self.cell_size
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlightParams {
    /// m/s
    pub stall_speed: f32,
    pub initial_speed: f32,
    pub control_rate: f32,
    pub control_authority: f32,
    pub brake_rate: f32,
    pub acceleration: f32,
    pub gear_rate: f32,
    pub roll_bleed: f32,
    pub bank_turn_rate: f32,
    pub gravity: f32,
}

impl Default for FlightParams {
    fn default() -> Self {
        Self {
            stall_speed: 60.0 / 3.6,
            initial_speed: 90.0 / 3.6,
            control_rate: 10.0,
            control_authority: 1.6,
            brake_rate: 5.0,
            acceleration: 10.0,
            gear_rate: 1.2,
            roll_bleed: 0.1,
            bank_turn_rate: 1.8 / std::f32::consts::PI,
            gravity: 9.81,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindParams {
    /// Degrees, rotation of the wind vector about vertical.
    pub direction: f32,
    /// km/h
    pub speed: f32,
    pub range: f32,
    pub lift_factor: f32,
}

impl Default for WindParams {
    fn default() -> Self {
        Self {
            direction: 90.0,
            speed: 30.0,
            range: 500.0,
            lift_factor: 2.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContactParams {
    pub side_probe: f32,
    pub forward_probe: f32,
    pub down_probe: f32,
    pub near: f32,
    pub max_particles: usize,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            side_probe: 7.5,
            forward_probe: 2.2,
            down_probe: 0.3,
            near: 0.0,
            max_particles: 100,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub terrain: TerrainParams,
    pub scatter: ScatterParams,
    pub streaming: StreamingParams,
    pub flight: FlightParams,
    pub wind: WindParams,
    pub contact: ContactParams,
}

/// What a configuration change made stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalidation {
    None,
    /// Generated cells no longer match the parameters and must be rebuilt.
    Cells,
}

#[derive(Debug)]
pub enum ConfigError {
    UnknownParameter(String),
    InvalidValue { name: String, value: f64, reason: &'static str },
    MalformedOverride(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownParameter(name) => write!(f, "unknown parameter '{name}'"),
            Self::InvalidValue { name, value, reason } => {
                write!(f, "invalid value {value} for '{name}': {reason}")
            }
            Self::MalformedOverride(raw) => {
                write!(f, "expected name=value, got '{raw}'")
            }
            Self::Io(e) => write!(f, "config io error: {e}"),
            Self::Json(e) => write!(f, "config json error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Every name accepted by [`SimConfig::set`].
pub const PARAMETER_NAMES: &[&str] = &[
    "terrain_seed",
    "period_a",
    "period_b",
    "period_c",
    "multiplier_1",
    "multiplier_2",
    "multiplier_3",
    "water_level",
    "segment_size",
    "scatter_seed",
    "vegetation_density",
    "structure_density",
    "max_slope",
    "cell_size",
    "range",
    "budget_ms",
    "stall_speed",
    "control_rate",
    "control_authority",
    "brake_rate",
    "acceleration",
    "gear_rate",
    "roll_bleed",
    "bank_turn_rate",
    "wind_direction",
    "wind_speed",
    "wind_range",
    "lift_factor",
    "side_probe",
    "forward_probe",
    "down_probe",
    "max_particles",
];

fn invalid(name: &str, value: f64, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value,
        reason,
    }
}

fn positive(name: &str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(name, value, "must be positive"))
    }
}

fn non_negative(name: &str, value: f64) -> Result<f64, ConfigError> {
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(invalid(name, value, "must not be negative"))
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("segment_size", self.terrain.segment_size as f64)?;
        positive("cell_size", self.streaming.cell_size as f64)?;
        positive("range", self.streaming.range as f64)?;
        if self.terrain.segment_size > self.streaming.cell_size {
            return Err(invalid(
                "segment_size",
                self.terrain.segment_size as f64,
                "must not exceed cell_size",
            ));
        }
        if self.streaming.add_threshold() > MAX_STREAM_REACH {
            return Err(invalid(
                "range",
                self.streaming.range as f64,
                "streams more than 256 cells each way at this cell_size",
            ));
        }
        positive("stall_speed", self.flight.stall_speed as f64)?;
        Ok(())
    }

    /// Hot-reload a single named parameter. The whole config is left
    /// untouched when the value is rejected.
    pub fn set(&mut self, name: &str, value: f64) -> Result<Invalidation, ConfigError> {
        if !value.is_finite() {
            return Err(invalid(name, value, "must be finite"));
        }

        let mut next = self.clone();
        let invalidation = match name {
            "terrain_seed" => {
                next.terrain.seed = non_negative(name, value)? as u32;
                Invalidation::Cells
            }
            "period_a" => {
                next.terrain.period_a = non_negative(name, value)?;
                Invalidation::Cells
            }
            "period_b" => {
                next.terrain.period_b = non_negative(name, value)?;
                Invalidation::Cells
            }
            "period_c" => {
                next.terrain.period_c = non_negative(name, value)?;
                Invalidation::Cells
            }
            "multiplier_1" => {
                next.terrain.multiplier_1 = value;
                Invalidation::Cells
            }
            "multiplier_2" => {
                next.terrain.multiplier_2 = value;
                Invalidation::Cells
            }
            "multiplier_3" => {
                next.terrain.multiplier_3 = value;
                Invalidation::Cells
            }
            "water_level" => {
                next.terrain.water_level = value;
                Invalidation::Cells
            }
            "segment_size" => {
                next.terrain.segment_size = positive(name, value)? as f32;
                Invalidation::Cells
            }
            "scatter_seed" => {
                next.scatter.seed = non_negative(name, value)? as u64;
                Invalidation::Cells
            }
            "vegetation_density" => {
                next.scatter.vegetation_density = non_negative(name, value)? as f32;
                Invalidation::Cells
            }
            "structure_density" => {
                next.scatter.structure_density = non_negative(name, value)? as f32;
                Invalidation::Cells
            }
            "max_slope" => {
                if !(0.0..=90.0).contains(&value) {
                    return Err(invalid(name, value, "must be within 0..=90 degrees"));
                }
                next.scatter.max_slope_deg = value as f32;
                Invalidation::Cells
            }
            // Size mismatch alone evicts every resident cell.
            "cell_size" => {
                next.streaming.cell_size = positive(name, value)? as f32;
                Invalidation::Cells
            }
            "range" => {
                next.streaming.range = positive(name, value)? as f32;
                Invalidation::None
            }
            "budget_ms" => {
                next.streaming.budget_ms = non_negative(name, value)?;
                Invalidation::None
            }
            "stall_speed" => {
                next.flight.stall_speed = positive(name, value)? as f32;
                Invalidation::None
            }
            "control_rate" => {
                next.flight.control_rate = positive(name, value)? as f32;
                Invalidation::None
            }
            "control_authority" => {
                next.flight.control_authority = non_negative(name, value)? as f32;
                Invalidation::None
            }
            "brake_rate" => {
                next.flight.brake_rate = positive(name, value)? as f32;
                Invalidation::None
            }
            "acceleration" => {
                next.flight.acceleration = non_negative(name, value)? as f32;
                Invalidation::None
            }
            "gear_rate" => {
                next.flight.gear_rate = positive(name, value)? as f32;
                Invalidation::None
            }
            "roll_bleed" => {
                next.flight.roll_bleed = non_negative(name, value)? as f32;
                Invalidation::None
            }
            "bank_turn_rate" => {
                next.flight.bank_turn_rate = non_negative(name, value)? as f32;
                Invalidation::None
            }
            "wind_direction" => {
                next.wind.direction = value as f32;
                Invalidation::None
            }
            "wind_speed" => {
                next.wind.speed = non_negative(name, value)? as f32;
                Invalidation::None
            }
            "wind_range" => {
                next.wind.range = non_negative(name, value)? as f32;
                Invalidation::None
            }
            "lift_factor" => {
                next.wind.lift_factor = value as f32;
                Invalidation::None
            }
            "side_probe" => {
                next.contact.side_probe = positive(name, value)? as f32;
                Invalidation::None
            }
            "forward_probe" => {
                next.contact.forward_probe = positive(name, value)? as f32;
                Invalidation::None
            }
            "down_probe" => {
                next.contact.down_probe = positive(name, value)? as f32;
                Invalidation::None
            }
            "max_particles" => {
                next.contact.max_particles = non_negative(name, value)? as usize;
                Invalidation::None
            }
            _ => return Err(ConfigError::UnknownParameter(name.to_string())),
        };

        next.validate()?;
        *self = next;
        Ok(invalidation)
    }

    /// Parses a `name=value` override as passed on the command line.
    pub fn apply_override(&mut self, raw: &str) -> Result<Invalidation, ConfigError> {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedOverride(raw.to_string()))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::MalformedOverride(raw.to_string()))?;
        self.set(name.trim(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_parameter_is_settable() {
        for name in PARAMETER_NAMES {
            let mut config = SimConfig::default();
            let value = match *name {
                "segment_size" => 25.0,
                "cell_size" => 2000.0,
                "max_slope" => 20.0,
                _ => 1.0,
            };
            assert!(config.set(name, value).is_ok(), "rejected {name}");
        }
    }

    #[test]
    fn terrain_changes_invalidate_cells_but_flight_changes_do_not() {
        let mut config = SimConfig::default();
        assert_eq!(config.set("period_a", 0.004).unwrap(), Invalidation::Cells);
        assert_eq!(config.set("cell_size", 500.0).unwrap(), Invalidation::Cells);
        assert_eq!(config.set("stall_speed", 15.0).unwrap(), Invalidation::None);
        assert_eq!(config.streaming.cell_size, 500.0);
    }

    #[test]
    fn rejected_values_leave_config_unchanged() {
        let mut config = SimConfig::default();
        assert!(matches!(
            config.set("cell_size", -10.0),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("segment_size", 5000.0),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("nope", 1.0),
            Err(ConfigError::UnknownParameter(_))
        ));
        assert!(config.set("range", f64::NAN).is_err());
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn overrides_parse_name_value_pairs() {
        let mut config = SimConfig::default();
        config.apply_override("wind_speed = 12.5").unwrap();
        assert_eq!(config.wind.speed, 12.5);
        assert!(matches!(
            config.apply_override("wind_speed"),
            Err(ConfigError::MalformedOverride(_))
        ));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = SimConfig::from_json_str(r#"{ "streaming": { "cell_size": 500.0 } }"#).unwrap();
        assert_eq!(config.streaming.cell_size, 500.0);
        assert_eq!(config.streaming.range, 3000.0);
        assert_eq!(config.terrain, TerrainParams::default());

        let round = SimConfig::from_json_str(&config.to_json_pretty().unwrap()).unwrap();
        assert_eq!(round, config);
    }

    #[test]
    fn thresholds_follow_range_and_cell_size() {
        let streaming = StreamingParams::default();
        assert_eq!(streaming.add_threshold(), 4.5);
        assert_eq!(streaming.remove_threshold(), 6.0);
    }

    #[test]
    fn streaming_reach_is_bounded() {
        let mut config = SimConfig::default();
        assert!(config.set("range", 170_000.0).is_ok());
        assert!(matches!(
            config.set("range", 1_000_000.0),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(config.set("cell_size", 100.0).is_err());
        assert_eq!(config.streaming.range, 170_000.0);
        assert_eq!(config.streaming.cell_size, 1000.0);
    }
}
