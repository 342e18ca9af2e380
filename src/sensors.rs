//! Sensors read the physical state of a structural part through an
//! [`ErrorGenerator`], re-sampling at most once per reading interval.

use glam::DVec2;

use crate::device::{
    communicate_command, dispatch, Children, CommandDevice, CommandTable, Device, DeviceBase, DeviceFault, SimContext,
};
use crate::device::group::IS_GROUP_INFO;
use crate::error_gen::ErrorGenerator;
use crate::physics::PhysicsWorld;
use crate::protocol::{expect_args, format_number, CommandError, INVALID_COMMAND};
use crate::structure::PartAnchor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorKind {
    XPosition,
    YPosition,
    /// Part orientation in degrees.
    Angle,
    /// Velocity component along `angle` radians from the part orientation.
    Speed { angle: f64 },
}

impl SensorKind {
    pub fn device_type(self) -> &'static str {
        match self {
            SensorKind::XPosition => "x-position-sensor",
            SensorKind::YPosition => "y-position-sensor",
            SensorKind::Angle => "angle-sensor",
            SensorKind::Speed { .. } => "speed-sensor",
        }
    }

    fn sample(self, anchor: &PartAnchor, world: &dyn PhysicsWorld) -> f64 {
        match self {
            SensorKind::XPosition => anchor.position(world).x,
            SensorKind::YPosition => anchor.position(world).y,
            SensorKind::Angle => anchor.angle(world).to_degrees(),
            SensorKind::Speed { angle } => {
                let axis = DVec2::from_angle(angle + anchor.angle(world));
                anchor.velocity(world).dot(axis)
            }
        }
    }
}

pub struct Sensor {
    base: DeviceBase,
    kind: SensorKind,
    anchor: PartAnchor,
    reading_time: f64,
    error: ErrorGenerator,
    /// `(sample time, value)` of the cached reading.
    last: Option<(f64, f64)>,
}

const SENSOR_COMMANDS: CommandTable<Sensor> = &[
    ("read", Sensor::cmd_read),
    ("reading-time", Sensor::cmd_reading_time),
    ("max-error", Sensor::cmd_max_error),
    ("max-offset", Sensor::cmd_max_offset),
];

impl Sensor {
    pub fn new(kind: SensorKind, anchor: PartAnchor, reading_time: f64, error: ErrorGenerator) -> Self {
        Self {
            base: DeviceBase::new(kind.device_type()),
            kind,
            anchor,
            reading_time,
            error,
            last: None,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn reading_time(&self) -> f64 {
        self.reading_time
    }

    /// Worst-case deviation of a reading: jitter plus offset bound.
    pub fn max_error(&self) -> f64 {
        self.error.max_error() + self.error.max_offset()
    }

    pub fn max_offset(&self) -> f64 {
        self.error.max_offset()
    }

    /// Debounced reading at `ctx.now`.
    pub fn reading(&mut self, ctx: &SimContext<'_>) -> f64 {
        match self.last {
            Some((at, value)) if ctx.now - at <= self.reading_time => value,
            _ => {
                let value = self.error.apply(self.kind.sample(&self.anchor, &*ctx.world));
                self.last = Some((ctx.now, value));
                value
            }
        }
    }

    fn cmd_read(&mut self, ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.reading(ctx)))
    }

    fn cmd_reading_time(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.reading_time))
    }

    fn cmd_max_error(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.max_error()))
    }

    fn cmd_max_offset(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.max_offset()))
    }
}

impl CommandDevice for Sensor {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }

    fn command_tables(&self) -> &'static [CommandTable<Self>] {
        &[SENSOR_COMMANDS]
    }
}

impl Device for Sensor {
    fn act(&mut self, _ctx: &mut SimContext<'_>) -> Result<(), DeviceFault> {
        Ok(())
    }

    fn communicate(&mut self, input: &str, ctx: &mut SimContext<'_>) -> String {
        communicate_command(self, input, ctx)
    }

    fn info_mut(&mut self) -> Option<&mut DeviceBase> {
        Some(&mut self.base)
    }
}

/// Group of single-axis sensors sharing one part and reading interval.
///
/// Metadata verbs (`reading-time`, `max-error`, `max-offset`) are answered
/// by the first child so callers need not descend the tree.
pub struct MultiSensor {
    base: DeviceBase,
    sensors: Children<Sensor>,
}

const MULTI_SENSOR_COMMANDS: CommandTable<MultiSensor> = &[
    ("device-count", MultiSensor::cmd_device_count),
    ("reading-time", MultiSensor::cmd_reading_time),
    ("max-error", MultiSensor::cmd_max_error),
    ("max-offset", MultiSensor::cmd_max_offset),
];

impl MultiSensor {
    pub fn new(device_type: &str) -> Self {
        let mut base = DeviceBase::new(device_type);
        base.set_info(IS_GROUP_INFO, Some("yes"));
        Self {
            base,
            sensors: Children::new(),
        }
    }

    /// `x`/`y` position sensor pair. Each axis draws its own error offset.
    pub fn position(anchor: &PartAnchor, reading_time: f64, error_max: f64, offset_max: f64) -> Self {
        let mut sensor = Self::new("position-sensor");
        for (name, kind) in [("x", SensorKind::XPosition), ("y", SensorKind::YPosition)] {
            let error = ErrorGenerator::new(error_max, offset_max);
            sensor.add_sensor(Sensor::new(kind, anchor.clone(), reading_time, error), Some(name));
        }
        sensor
    }

    pub fn add_sensor(&mut self, sensor: Sensor, name: Option<&str>) -> usize {
        self.sensors.add(Box::new(sensor), name)
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    fn forward(&mut self, verb: &str, ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        let Some(first) = self.sensors.get_mut(0) else {
            return Ok(INVALID_COMMAND.to_string());
        };
        let mut words = Vec::with_capacity(args.len() + 1);
        words.push(verb.to_string());
        words.extend_from_slice(args);
        Ok(dispatch(first, ctx, &words))
    }

    fn cmd_device_count(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self.sensors.len().to_string())
    }

    fn cmd_reading_time(&mut self, ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        self.forward("reading-time", ctx, args)
    }

    fn cmd_max_error(&mut self, ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        self.forward("max-error", ctx, args)
    }

    fn cmd_max_offset(&mut self, ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        self.forward("max-offset", ctx, args)
    }
}

impl CommandDevice for MultiSensor {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }

    fn command_tables(&self) -> &'static [CommandTable<Self>] {
        &[MULTI_SENSOR_COMMANDS]
    }
}

impl Device for MultiSensor {
    fn act(&mut self, ctx: &mut SimContext<'_>) -> Result<(), DeviceFault> {
        self.sensors.act_all(ctx)
    }

    fn communicate(&mut self, input: &str, ctx: &mut SimContext<'_>) -> String {
        match self.sensors.route(input, ctx) {
            Some(reply) => reply,
            None => communicate_command(self, input, ctx),
        }
    }

    fn info_mut(&mut self) -> Option<&mut DeviceBase> {
        Some(&mut self.base)
    }
}
