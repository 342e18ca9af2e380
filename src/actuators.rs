//! Actuators push a structural part every tick.

use crate::device::{
    communicate_command, CommandDevice, Device, DeviceBase, DeviceFault, Property, PropertySetter, SimContext,
};
use crate::error_gen::ErrorGenerator;
use crate::interval::IntervalSet;
use crate::protocol::{format_number, parse_number, CommandError};
use crate::structure::PartAnchor;

/// Thruster with a linear intensity-to-thrust map.
///
/// Writes outside the admissible intensity or angle sets are ignored and
/// leave the current value in place.
pub struct Engine {
    base: DeviceBase,
    anchor: PartAnchor,
    intensity: f64,
    angle: f64,
    thrust: f64,
    multiplier: f64,
    thrust_offset: f64,
    valid_intensities: IntervalSet,
    valid_angles: IntervalSet,
    thrust_error: Option<ErrorGenerator>,
    angle_error: Option<ErrorGenerator>,
}

const ENGINE_PROPERTIES: &[Property<Engine>] = &[
    Property {
        name: "intensity",
        get: Engine::intensity_text,
        set: Some(Engine::set_intensity_text as PropertySetter<Engine>),
    },
    Property {
        name: "angle",
        get: Engine::angle_text,
        set: Some(Engine::set_angle_text as PropertySetter<Engine>),
    },
    Property {
        name: "thrust",
        get: Engine::thrust_text,
        set: None,
    },
];

impl Engine {
    pub fn linear(anchor: PartAnchor, multiplier: f64, thrust_offset: f64) -> Self {
        Self {
            base: DeviceBase::new("engine"),
            anchor,
            intensity: 0.0,
            angle: 0.0,
            thrust: thrust_offset,
            multiplier,
            thrust_offset,
            valid_intensities: IntervalSet::unbounded(),
            valid_angles: IntervalSet::unbounded(),
            thrust_error: None,
            angle_error: None,
        }
    }

    pub fn limited_linear(
        anchor: PartAnchor,
        intensity_range: (f64, f64),
        angle_range: (f64, f64),
        multiplier: f64,
    ) -> Self {
        let mut engine = Self::linear(anchor, multiplier, 0.0);
        engine.valid_intensities = IntervalSet::single(intensity_range.0, intensity_range.1);
        engine.valid_angles = IntervalSet::single(angle_range.0, angle_range.1);
        engine
    }

    #[must_use]
    pub fn with_thrust_error(mut self, error: ErrorGenerator) -> Self {
        self.thrust_error = Some(error);
        self
    }

    #[must_use]
    pub fn with_angle_error(mut self, error: ErrorGenerator) -> Self {
        self.angle_error = Some(error);
        self
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn thrust(&self) -> f64 {
        self.thrust
    }

    pub fn map_intensity_to_thrust(&self, intensity: f64) -> f64 {
        self.thrust_offset + intensity * self.multiplier
    }

    /// Returns whether the value was accepted.
    pub fn set_intensity(&mut self, intensity: f64) -> bool {
        if !self.valid_intensities.contains(intensity) {
            return false;
        }
        self.intensity = intensity;
        self.thrust = self.map_intensity_to_thrust(intensity);
        true
    }

    /// Returns whether the value was accepted.
    pub fn set_angle(&mut self, angle: f64) -> bool {
        if !self.valid_angles.contains(angle) {
            return false;
        }
        self.angle = angle;
        true
    }

    fn intensity_text(&self) -> String {
        format_number(self.intensity)
    }

    fn angle_text(&self) -> String {
        format_number(self.angle)
    }

    fn thrust_text(&self) -> String {
        format_number(self.thrust)
    }

    fn set_intensity_text(&mut self, value: &str) -> Result<(), CommandError> {
        self.set_intensity(parse_number(value)?);
        Ok(())
    }

    fn set_angle_text(&mut self, value: &str) -> Result<(), CommandError> {
        self.set_angle(parse_number(value)?);
        Ok(())
    }

    fn check_finite(&self, quantity: &'static str, value: f64) -> Result<f64, DeviceFault> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(DeviceFault::NonFinite {
                device: self.base.device_type().to_string(),
                quantity,
                value,
            })
        }
    }
}

impl CommandDevice for Engine {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }

    fn properties(&self) -> Option<&'static [Property<Self>]> {
        Some(ENGINE_PROPERTIES)
    }
}

impl Device for Engine {
    fn act(&mut self, ctx: &mut SimContext<'_>) -> Result<(), DeviceFault> {
        let thrust = self.thrust_error.map_or(self.thrust, |error| error.apply(self.thrust));
        let angle = self.angle_error.map_or(self.angle, |error| error.apply(self.angle));
        let thrust = self.check_finite("thrust", thrust)?;
        let angle = self.check_finite("angle", angle)?;

        self.anchor.apply_force(&mut *ctx.world, thrust, 0.0, 0.0, angle);
        Ok(())
    }

    fn communicate(&mut self, input: &str, ctx: &mut SimContext<'_>) -> String {
        communicate_command(self, input, ctx)
    }

    fn info_mut(&mut self) -> Option<&mut DeviceBase> {
        Some(&mut self.base)
    }
}
