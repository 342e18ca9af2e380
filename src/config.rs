//! JSON simulation configuration and the ship topology builder.
//!
//! A configuration file lists the ships to load. Each ship declares its
//! rigid body, its named structural parts and the devices mounted on them;
//! devices refer to their part by name.
//!
//! ```json
//! {
//!   "timestep": 0.02,
//!   "comms": { "speed": 50.0 },
//!   "ships": [{
//!     "name": "scout",
//!     "body": { "mass": 10.0, "moment": 12500.0 },
//!     "controller": { "program": "python3", "args": ["pilot.py"] },
//!     "parts": [{ "name": "hull" }],
//!     "actuators": [{ "type": "engine", "name": "engine", "part": "hull",
//!                     "min_intensity": -4, "max_intensity": 4,
//!                     "min_angle": -1, "max_angle": 1 }],
//!     "sensors": [{ "type": "position", "name": "gps", "part": "hull", "reading_time": 1 }]
//!   }]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actuators::Engine;
use crate::comms::{CommsConfig, CommunicationEngine, Receiver, Sender, SenderBounds, DEFAULT_TOLERANCE};
use crate::error_gen::ErrorGenerator;
use crate::interval::Interval;
use crate::physics::{BodyConfig, BodyId};
use crate::sensors::{MultiSensor, Sensor, SensorKind};
use crate::structure::{Structure, StructuralPart};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ship '{ship}': {device} has invalid part '{part}'")]
    UnknownPart {
        ship: String,
        device: String,
        part: String,
    },
    #[error("ship '{0}' has invalid mass")]
    InvalidMass(String),
    #[error("ship '{0}' has invalid moment of inertia")]
    InvalidMoment(String),
    #[error("setting '{setting}' has invalid value {value}")]
    InvalidSetting { setting: &'static str, value: f64 },
    #[error("ship '{ship}' declares part '{part}' more than once")]
    DuplicatePart { ship: String, part: String },
    #[error("ship '{0}' is declared more than once")]
    DuplicateShip(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tick_interval_ms: u64,
    /// Simulated seconds per tick.
    pub timestep: f64,
    /// Destruction watcher polling period.
    pub watch_interval_ms: u64,
    pub comms: CommsConfig,
    pub ships: Vec<ShipConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 20,
            timestep: 0.02,
            watch_interval_ms: 1000,
            comms: CommsConfig::default(),
            ships: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the tick settings, the channel model and every ship.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let comms = &self.comms;
        let settings = [
            ("tick_interval_ms", self.tick_interval_ms as f64, self.tick_interval_ms > 0),
            ("watch_interval_ms", self.watch_interval_ms as f64, self.watch_interval_ms > 0),
            ("timestep", self.timestep, self.timestep > 0.0 && self.timestep.is_finite()),
            ("comms.speed", comms.speed, comms.speed > 0.0 && comms.speed.is_finite()),
            ("comms.max_noise", comms.max_noise, comms.max_noise >= 0.0 && comms.max_noise.is_finite()),
            (
                "comms.negligible_intensity",
                comms.negligible_intensity,
                comms.negligible_intensity > 0.0 && comms.negligible_intensity.is_finite(),
            ),
        ];
        if let Some(&(setting, value, _)) = settings.iter().find(|(_, _, valid)| !valid) {
            return Err(ConfigError::InvalidSetting { setting, value });
        }

        let mut names = HashSet::new();
        for ship in &self.ships {
            if !names.insert(ship.name.as_str()) {
                return Err(ConfigError::DuplicateShip(ship.name.clone()));
            }
            ship.validate()?;
        }
        Ok(())
    }

    pub fn ship(&self, name: &str) -> Option<&ShipConfig> {
        self.ships.iter().find(|ship| ship.name == name)
    }
}

/// External program driving one ship over stdin/stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipConfig {
    pub name: String,
    #[serde(default)]
    pub body: BodyConfig,
    #[serde(default)]
    pub controller: Option<ControllerConfig>,
    #[serde(default)]
    pub parts: Vec<PartConfig>,
    #[serde(default)]
    pub actuators: Vec<ActuatorConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub communication: Vec<CommunicationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartConfig {
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Error generator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorConfig {
    pub error_max: f64,
    pub offset_max: f64,
    pub error_max_minfac: f64,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            error_max: 0.0,
            offset_max: 0.0,
            error_max_minfac: 1.0,
        }
    }
}

impl ErrorConfig {
    pub fn generator(&self) -> ErrorGenerator {
        ErrorGenerator::with_min_factor(self.error_max, self.offset_max, self.error_max_minfac)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActuatorConfig {
    Engine(EngineConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub part: String,
    pub min_intensity: f64,
    pub max_intensity: f64,
    pub min_angle: f64,
    pub max_angle: f64,
    #[serde(default = "default_multiplier")]
    pub intensity_mult: f64,
    #[serde(default)]
    pub thrust_error: Option<ErrorConfig>,
    #[serde(default)]
    pub angle_error: Option<ErrorConfig>,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SensorConfig {
    Position(SensorSpec),
    Angle(SensorSpec),
    Speed(SensorSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub part: String,
    pub reading_time: f64,
    #[serde(default)]
    pub error_max: f64,
    #[serde(default)]
    pub offset_max: f64,
    /// Measurement axis of speed sensors, radians from the part orientation.
    #[serde(default)]
    pub angle: f64,
}

impl SensorConfig {
    fn spec(&self) -> &SensorSpec {
        match self {
            SensorConfig::Position(spec) | SensorConfig::Angle(spec) | SensorConfig::Speed(spec) => spec,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CommunicationConfig {
    Receiver(ReceiverConfig),
    Sender(SenderConfig),
}

impl CommunicationConfig {
    fn part(&self) -> &str {
        match self {
            CommunicationConfig::Receiver(config) => &config.part,
            CommunicationConfig::Sender(config) => &config.part,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub part: String,
    /// Receiver sensibility.
    #[serde(default)]
    pub minimum_intensity: f64,
    pub frequency: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub configurable: bool,
    #[serde(default)]
    pub min_frequency: Option<f64>,
    #[serde(default)]
    pub max_frequency: Option<f64>,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub part: String,
    pub intensity: f64,
    pub frequency: f64,
    #[serde(default)]
    pub configurable: bool,
    #[serde(default)]
    pub min_frequency: Option<f64>,
    #[serde(default)]
    pub max_frequency: Option<f64>,
    #[serde(default)]
    pub min_intensity: Option<f64>,
    #[serde(default)]
    pub max_intensity: Option<f64>,
    #[serde(default)]
    pub frequency_error: Option<ErrorConfig>,
    #[serde(default)]
    pub intensity_error: Option<ErrorConfig>,
}

fn bounds(min: Option<f64>, max: Option<f64>) -> Interval {
    Interval::new(min.unwrap_or(f64::NEG_INFINITY), max.unwrap_or(f64::INFINITY))
}

impl ShipConfig {
    /// Checks mass, moment, part names and device part references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.body.mass <= 0.0 || !self.body.mass.is_finite() {
            return Err(ConfigError::InvalidMass(self.name.clone()));
        }
        if self.body.moment <= 0.0 || !self.body.moment.is_finite() {
            return Err(ConfigError::InvalidMoment(self.name.clone()));
        }

        let mut parts = HashSet::new();
        for part in &self.parts {
            if !parts.insert(part.name.as_str()) {
                return Err(ConfigError::DuplicatePart {
                    ship: self.name.clone(),
                    part: part.name.clone(),
                });
            }
        }

        let references = self
            .actuators
            .iter()
            .map(|ActuatorConfig::Engine(engine)| ("Actuator", engine.part.as_str()))
            .chain(self.sensors.iter().map(|sensor| ("Sensor", sensor.spec().part.as_str())))
            .chain(self.communication.iter().map(|device| ("Communication", device.part())));
        for (device, part) in references {
            if !parts.contains(part) {
                return Err(ConfigError::UnknownPart {
                    ship: self.name.clone(),
                    device: device.to_string(),
                    part: part.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Builds the ship's device tree bound to `body`. Receivers register
    /// with `comms`.
    pub fn build(&self, body: BodyId, comms: &mut CommunicationEngine) -> Result<Structure, ConfigError> {
        self.validate()?;

        let mut parts: Vec<(&str, StructuralPart)> = self
            .parts
            .iter()
            .map(|part| (part.name.as_str(), StructuralPart::new((part.x, part.y))))
            .collect();
        for ActuatorConfig::Engine(config) in &self.actuators {
            let part = self.part_mut(&mut parts, &config.part)?;
            let mut engine = Engine::limited_linear(
                part.anchor(),
                (config.min_intensity, config.max_intensity),
                (config.min_angle, config.max_angle),
                config.intensity_mult,
            );
            if let Some(error) = &config.thrust_error {
                engine = engine.with_thrust_error(error.generator());
            }
            if let Some(error) = &config.angle_error {
                engine = engine.with_angle_error(error.generator());
            }
            part.add_device(Box::new(engine), config.name.as_deref());
        }

        for config in &self.sensors {
            let spec = config.spec();
            let part = self.part_mut(&mut parts, &spec.part)?;
            let anchor = part.anchor();
            let error = ErrorGenerator::new(spec.error_max, spec.offset_max);
            let name = spec.name.as_deref();
            match config {
                SensorConfig::Position(_) => {
                    let sensor = MultiSensor::position(&anchor, spec.reading_time, spec.error_max, spec.offset_max);
                    part.add_device(Box::new(sensor), name)
                }
                SensorConfig::Angle(_) => {
                    let sensor = Sensor::new(SensorKind::Angle, anchor, spec.reading_time, error);
                    part.add_device(Box::new(sensor), name)
                }
                SensorConfig::Speed(_) => {
                    let kind = SensorKind::Speed { angle: spec.angle };
                    part.add_device(Box::new(Sensor::new(kind, anchor, spec.reading_time, error)), name)
                }
            };
        }

        for config in &self.communication {
            let part = self.part_mut(&mut parts, config.part())?;
            match config {
                CommunicationConfig::Receiver(config) => {
                    let receiver = if config.configurable {
                        Receiver::configurable(
                            part.anchor(),
                            config.minimum_intensity,
                            config.frequency,
                            config.tolerance,
                            bounds(config.min_frequency, config.max_frequency),
                            comms,
                        )
                    } else {
                        Receiver::basic(
                            part.anchor(),
                            config.minimum_intensity,
                            config.frequency,
                            config.tolerance,
                            comms,
                        )
                    };
                    part.add_device(Box::new(receiver), config.name.as_deref());
                }
                CommunicationConfig::Sender(config) => {
                    let mut sender = if config.configurable {
                        let bounds = SenderBounds {
                            frequency: bounds(config.min_frequency, config.max_frequency),
                            intensity: bounds(config.min_intensity, config.max_intensity),
                        };
                        Sender::configurable(part.anchor(), config.intensity, config.frequency, bounds)
                    } else {
                        Sender::basic(part.anchor(), config.intensity, config.frequency)
                    };
                    if let Some(error) = &config.frequency_error {
                        sender = sender.with_frequency_error(error.generator());
                    }
                    if let Some(error) = &config.intensity_error {
                        sender = sender.with_intensity_error(error.generator());
                    }
                    part.add_device(Box::new(sender), config.name.as_deref());
                }
            }
        }

        let mut ship = Structure::ship(body);
        for (name, part) in parts {
            ship.add_part(part, Some(name));
        }
        Ok(ship)
    }

    fn part_mut<'p>(
        &self,
        parts: &'p mut [(&str, StructuralPart)],
        name: &str,
    ) -> Result<&'p mut StructuralPart, ConfigError> {
        parts
            .iter_mut()
            .find(|(part_name, _)| *part_name == name)
            .map(|(_, part)| part)
            .ok_or_else(|| ConfigError::UnknownPart {
                ship: self.name.clone(),
                device: "Device".to_string(),
                part: name.to_string(),
            })
    }
}
