//! Radio devices exposing the communication engine to controllers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::DVec2;

use super::engine::{CommunicationEngine, SignalReceiver};
use crate::device::{communicate_command, CommandDevice, CommandTable, Device, DeviceBase, DeviceFault, SimContext};
use crate::error_gen::ErrorGenerator;
use crate::interval::Interval;
use crate::physics::PhysicsWorld;
use crate::protocol::{expect_args, format_number, CommandError, ERR, OK_LOWER};
use crate::structure::PartAnchor;

pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// Undrained deliveries kept per receiver; the oldest are dropped first.
pub const INBOX_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
struct Tuning {
    frequency: f64,
    tolerance: f64,
    sensibility: f64,
    inbox: VecDeque<f64>,
}

impl Tuning {
    fn accept(&mut self, intensity: f64, frequency: f64) {
        let frequency_diff = (frequency - self.frequency).abs();
        if frequency_diff > self.tolerance {
            return;
        }

        let intensity = if frequency_diff == 0.0 {
            intensity
        } else {
            intensity * (self.tolerance - frequency_diff) / self.tolerance
        };
        if intensity <= self.sensibility {
            return;
        }

        if self.inbox.len() == INBOX_CAPACITY {
            self.inbox.pop_front();
        }
        self.inbox.push_back(intensity - self.sensibility);
    }
}

/// Receiver state shared between the device tree and the engine.
#[derive(Debug)]
pub struct ReceiverSlot {
    anchor: PartAnchor,
    tuning: Mutex<Tuning>,
}

impl ReceiverSlot {
    fn tuning(&self) -> MutexGuard<'_, Tuning> {
        self.tuning.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SignalReceiver for ReceiverSlot {
    fn position(&self, world: &dyn PhysicsWorld) -> DVec2 {
        self.anchor.position(world)
    }

    fn signal_received(&self, intensity: f64, frequency: f64) {
        self.tuning().accept(intensity, frequency);
    }
}

/// Fixed or tunable radio receiver.
///
/// Delivered intensities are reduced by the sensibility and queued until a
/// controller drains them with `get-received`.
pub struct Receiver {
    base: DeviceBase,
    slot: Arc<ReceiverSlot>,
    frequency_bounds: Option<Interval>,
}

const RECEIVER_COMMANDS: CommandTable<Receiver> = &[
    ("get-received", Receiver::cmd_get_received),
    ("get-frequency", Receiver::cmd_get_frequency),
    ("get-tolerance", Receiver::cmd_get_tolerance),
    ("get-sensibility", Receiver::cmd_get_sensibility),
];

const CONFIGURABLE_RECEIVER_COMMANDS: CommandTable<Receiver> = &[
    ("set-frequency", Receiver::cmd_set_frequency),
    ("min-frequency", Receiver::cmd_min_frequency),
    ("max-frequency", Receiver::cmd_max_frequency),
];

impl Receiver {
    /// Builds a receiver and registers it with `engine`.
    pub fn basic(
        anchor: PartAnchor,
        sensibility: f64,
        frequency: f64,
        tolerance: f64,
        engine: &mut CommunicationEngine,
    ) -> Self {
        let slot = Arc::new(ReceiverSlot {
            anchor,
            tuning: Mutex::new(Tuning {
                frequency,
                tolerance,
                sensibility,
                inbox: VecDeque::new(),
            }),
        });
        engine.add_receiver(&slot);

        Self {
            base: DeviceBase::new("receiver"),
            slot,
            frequency_bounds: None,
        }
    }

    /// Receiver whose frequency controllers may retune within `bounds`.
    pub fn configurable(
        anchor: PartAnchor,
        sensibility: f64,
        frequency: f64,
        tolerance: f64,
        bounds: Interval,
        engine: &mut CommunicationEngine,
    ) -> Self {
        let mut receiver = Self::basic(anchor, sensibility, frequency, tolerance, engine);
        receiver.base.set_device_type("configurable-receiver");
        receiver.frequency_bounds = Some(bounds);
        receiver
    }

    pub fn frequency(&self) -> f64 {
        self.slot.tuning().frequency
    }

    pub fn tolerance(&self) -> f64 {
        self.slot.tuning().tolerance
    }

    pub fn sensibility(&self) -> f64 {
        self.slot.tuning().sensibility
    }

    /// Returns whether the value was accepted. Fixed receivers never retune.
    pub fn set_frequency(&mut self, frequency: f64) -> bool {
        match self.frequency_bounds {
            Some(bounds) if bounds.contains(frequency) => {
                self.slot.tuning().frequency = frequency;
                true
            }
            _ => false,
        }
    }

    /// Drains the inbox in arrival order.
    pub fn take_received(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.slot.tuning().inbox).into()
    }

    fn cmd_get_received(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self
            .take_received()
            .into_iter()
            .map(format_number)
            .collect::<Vec<_>>()
            .join(","))
    }

    fn cmd_get_frequency(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.frequency()))
    }

    fn cmd_get_tolerance(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.tolerance()))
    }

    fn cmd_get_sensibility(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.sensibility()))
    }

    fn cmd_set_frequency(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        let [value] = expect_args::<1>(args)?;
        Ok(set_reply(value, |frequency| {
            self.set_frequency(frequency);
        }))
    }

    fn cmd_min_frequency(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.frequency_bounds.map_or(f64::NEG_INFINITY, |b| b.start)))
    }

    fn cmd_max_frequency(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.frequency_bounds.map_or(f64::INFINITY, |b| b.end)))
    }
}

impl CommandDevice for Receiver {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }

    fn command_tables(&self) -> &'static [CommandTable<Self>] {
        if self.frequency_bounds.is_some() {
            &[CONFIGURABLE_RECEIVER_COMMANDS, RECEIVER_COMMANDS]
        } else {
            &[RECEIVER_COMMANDS]
        }
    }
}

impl Device for Receiver {
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

/// Admissible ranges of a configurable sender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SenderBounds {
    pub frequency: Interval,
    pub intensity: Interval,
}

/// Emits a signal from its part's position on `send-signal`.
pub struct Sender {
    base: DeviceBase,
    anchor: PartAnchor,
    intensity: f64,
    frequency: f64,
    frequency_error: Option<ErrorGenerator>,
    intensity_error: Option<ErrorGenerator>,
    bounds: Option<SenderBounds>,
}

const SENDER_COMMANDS: CommandTable<Sender> = &[
    ("send-signal", Sender::cmd_send_signal),
    ("get-frequency", Sender::cmd_get_frequency),
    ("get-intensity", Sender::cmd_get_intensity),
];

const CONFIGURABLE_SENDER_COMMANDS: CommandTable<Sender> = &[
    ("set-frequency", Sender::cmd_set_frequency),
    ("set-intensity", Sender::cmd_set_intensity),
    ("min-frequency", Sender::cmd_min_frequency),
    ("max-frequency", Sender::cmd_max_frequency),
    ("min-intensity", Sender::cmd_min_intensity),
    ("max-intensity", Sender::cmd_max_intensity),
];

impl Sender {
    pub fn basic(anchor: PartAnchor, intensity: f64, frequency: f64) -> Self {
        Self {
            base: DeviceBase::new("sender"),
            anchor,
            intensity,
            frequency,
            frequency_error: None,
            intensity_error: None,
            bounds: None,
        }
    }

    pub fn configurable(
        anchor: PartAnchor,
        intensity: f64,
        frequency: f64,
        bounds: SenderBounds,
    ) -> Self {
        let mut sender = Self::basic(anchor, intensity, frequency);
        sender.base.set_device_type("configurable-sender");
        sender.bounds = Some(bounds);
        sender
    }

    #[must_use]
    pub fn with_frequency_error(mut self, error: ErrorGenerator) -> Self {
        self.frequency_error = Some(error);
        self
    }

    #[must_use]
    pub fn with_intensity_error(mut self, error: ErrorGenerator) -> Self {
        self.intensity_error = Some(error);
        self
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Returns whether the value was accepted.
    pub fn set_frequency(&mut self, frequency: f64) -> bool {
        match self.bounds {
            Some(bounds) if bounds.frequency.contains(frequency) => {
                self.frequency = frequency;
                true
            }
            _ => false,
        }
    }

    /// Returns whether the value was accepted.
    pub fn set_intensity(&mut self, intensity: f64) -> bool {
        match self.bounds {
            Some(bounds) if bounds.intensity.contains(intensity) => {
                self.intensity = intensity;
                true
            }
            _ => false,
        }
    }

    /// Queues a signal at the engine with the error generators applied.
    pub fn send(&self, ctx: &mut SimContext<'_>) {
        let origin = self.anchor.position(&*ctx.world);
        let frequency = self
            .frequency_error
            .map_or(self.frequency, |error| error.apply(self.frequency));
        let intensity = self
            .intensity_error
            .map_or(self.intensity, |error| error.apply(self.intensity));
        ctx.comms.send(origin, intensity, frequency);
    }

    fn bound(&self, pick: impl Fn(&SenderBounds) -> Interval, upper: bool) -> String {
        let interval = self.bounds.as_ref().map_or_else(Interval::unbounded, pick);
        format_number(if upper { interval.end } else { interval.start })
    }

    fn cmd_send_signal(&mut self, ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        self.send(ctx);
        Ok(OK_LOWER.to_string())
    }

    fn cmd_get_frequency(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.frequency))
    }

    fn cmd_get_intensity(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(format_number(self.intensity))
    }

    fn cmd_set_frequency(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        let [value] = expect_args::<1>(args)?;
        Ok(set_reply(value, |frequency| {
            self.set_frequency(frequency);
        }))
    }

    fn cmd_set_intensity(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        let [value] = expect_args::<1>(args)?;
        Ok(set_reply(value, |intensity| {
            self.set_intensity(intensity);
        }))
    }

    fn cmd_min_frequency(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self.bound(|b| b.frequency, false))
    }

    fn cmd_max_frequency(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self.bound(|b| b.frequency, true))
    }

    fn cmd_min_intensity(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self.bound(|b| b.intensity, false))
    }

    fn cmd_max_intensity(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self.bound(|b| b.intensity, true))
    }
}

impl CommandDevice for Sender {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }

    fn command_tables(&self) -> &'static [CommandTable<Self>] {
        if self.bounds.is_some() {
            &[CONFIGURABLE_SENDER_COMMANDS, SENDER_COMMANDS]
        } else {
            &[SENDER_COMMANDS]
        }
    }
}

impl Device for Sender {
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

/// Setter reply: `<<err>>` when `value` is not a number, `<<ok>>` otherwise,
/// whether or not the write was in range.
fn set_reply(value: &str, apply: impl FnOnce(f64)) -> String {
    match value.trim().parse::<f64>() {
        Ok(number) => {
            apply(number);
            OK_LOWER.to_string()
        }
        Err(_) => ERR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning(frequency: f64, tolerance: f64, sensibility: f64) -> Tuning {
        Tuning {
            frequency,
            tolerance,
            sensibility,
            inbox: VecDeque::new(),
        }
    }

    #[test]
    fn test_exact_frequency_is_not_attenuated() {
        let mut t = tuning(100.0, 2.0, 0.0);
        t.accept(50.0, 100.0);
        assert_eq!(t.inbox, vec![50.0]);
    }

    #[test]
    fn test_mismatch_attenuates_linearly() {
        let mut t = tuning(100.0, 2.0, 5.0);
        t.accept(40.0, 101.0);
        // 40 * (2 - 1) / 2 = 20, minus sensibility 5
        assert_eq!(t.inbox, vec![15.0]);
    }

    #[test]
    fn test_out_of_tolerance_and_weak_signals_dropped() {
        let mut t = tuning(100.0, 2.0, 10.0);
        t.accept(1000.0, 102.5);
        t.accept(10.0, 100.0);
        assert!(t.inbox.is_empty());
    }

    #[test]
    fn test_zero_tolerance_accepts_only_exact_match() {
        let mut t = tuning(5.0, 0.0, 0.0);
        t.accept(3.0, 5.0);
        t.accept(3.0, 5.000_001);
        assert_eq!(t.inbox, vec![3.0]);
    }

    #[test]
    fn test_full_inbox_drops_oldest() {
        let mut t = tuning(1.0, 0.5, 0.0);
        for i in 0..INBOX_CAPACITY + 3 {
            t.accept(i as f64 + 1.0, 1.0);
        }
        assert_eq!(t.inbox.len(), INBOX_CAPACITY);
        assert_eq!(t.inbox.front(), Some(&4.0));
        assert_eq!(t.inbox.back(), Some(&(INBOX_CAPACITY as f64 + 3.0)));
    }
}
