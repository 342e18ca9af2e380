//! Device capability interface and command dispatch.
//!
//! Every node of a ship's device tree implements [`Device`]. Devices that
//! speak the shell-style command protocol implement [`CommandDevice`] and
//! resolve verbs through an ordered chain of static [`CommandTable`]s:
//! device-specific tables first, then property verbs, then the base verbs
//! every device answers (`device-type`, `device-desc`, `get-info`).

pub mod group;
pub mod property;

pub use group::{Children, DeviceGroup};
pub use property::{Property, PropertyGetter, PropertySetter};

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::comms::CommunicationEngine;
use crate::physics::PhysicsWorld;
use crate::protocol::{self, expect_args, CommandError, COMMAND_ERROR, INVALID_COMMAND, NULL};

/// Shared simulation state a device may touch while acting or answering.
pub struct SimContext<'a> {
    pub world: &'a mut dyn PhysicsWorld,
    pub comms: &'a mut CommunicationEngine,
    /// Seconds since the simulation started.
    pub now: f64,
}

impl<'a> SimContext<'a> {
    pub fn new(world: &'a mut dyn PhysicsWorld, comms: &'a mut CommunicationEngine, now: f64) -> Self {
        Self { world, comms, now }
    }
}

/// Tick-time failure. These are never encoded in protocol replies; they
/// propagate to whoever drives the tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceFault {
    #[error("{device}: non-finite {quantity} ({value})")]
    NonFinite {
        device: String,
        quantity: &'static str,
        value: f64,
    },
}

pub trait Device: Send {
    /// Periodic simulation step.
    fn act(&mut self, ctx: &mut SimContext<'_>) -> Result<(), DeviceFault>;

    /// Text protocol entry point. Never fails: every problem is a reply.
    fn communicate(&mut self, input: &str, ctx: &mut SimContext<'_>) -> String;

    /// Info store, for devices that have one.
    fn info_mut(&mut self) -> Option<&mut DeviceBase> {
        None
    }
}

/// Type, description and free-form info shared by all command devices.
#[derive(Debug, Clone, Default)]
pub struct DeviceBase {
    device_type: String,
    description: String,
    info: HashMap<String, String>,
}

impl DeviceBase {
    pub fn new(device_type: &str) -> Self {
        Self {
            device_type: device_type.to_string(),
            description: "not specified".to_string(),
            info: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn set_device_type(&mut self, device_type: &str) {
        self.device_type = device_type.to_string();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// `None` removes the entry.
    pub fn set_info(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.info.insert(name.to_string(), value.to_string());
            }
            None => {
                self.info.remove(name);
            }
        }
    }

    pub fn info(&self, name: &str) -> Option<&str> {
        self.info.get(name).map(String::as_str)
    }

    fn cmd_device_type(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self.device_type.clone())
    }

    fn cmd_device_desc(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self.description.clone())
    }

    fn cmd_get_info(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        let [name] = expect_args::<1>(args)?;
        Ok(self.info(name).unwrap_or(NULL).to_string())
    }
}

pub type Handler<D> = fn(&mut D, &mut SimContext<'_>, &[String]) -> Result<String, CommandError>;

/// Static verb table for one device type.
pub type CommandTable<D> = &'static [(&'static str, Handler<D>)];

const BASE_COMMANDS: CommandTable<DeviceBase> = &[
    ("device-type", DeviceBase::cmd_device_type),
    ("device-desc", DeviceBase::cmd_device_desc),
    ("get-info", DeviceBase::cmd_get_info),
];

fn lookup<D>(table: CommandTable<D>, verb: &str) -> Option<Handler<D>> {
    table
        .iter()
        .find(|(name, _)| *name == verb)
        .map(|(_, handler)| *handler)
}

/// A device answering shell-style commands.
pub trait CommandDevice: Sized + Send + 'static {
    fn base(&self) -> &DeviceBase;
    fn base_mut(&mut self) -> &mut DeviceBase;

    /// Device-specific tables, most specific first.
    fn command_tables(&self) -> &'static [CommandTable<Self>] {
        &[]
    }

    /// Property table; `Some` enables the property verbs.
    fn properties(&self) -> Option<&'static [Property<Self>]> {
        None
    }
}

/// Resolves already tokenized words against the device's table chain.
pub fn dispatch<D: CommandDevice>(device: &mut D, ctx: &mut SimContext<'_>, words: &[String]) -> String {
    let Some((verb, args)) = words.split_first() else {
        return INVALID_COMMAND.to_string();
    };

    for &table in device.command_tables() {
        if let Some(handler) = lookup(table, verb) {
            return settle(verb, handler(device, ctx, args));
        }
    }

    if let Some(properties) = device.properties() {
        if let Some(result) = property::run(device, properties, verb, args) {
            return settle(verb, result);
        }
    }

    if let Some(handler) = lookup(BASE_COMMANDS, verb) {
        return settle(verb, handler(device.base_mut(), ctx, args));
    }

    INVALID_COMMAND.to_string()
}

/// Tokenizes `input` and dispatches it.
pub fn communicate_command<D: CommandDevice>(device: &mut D, input: &str, ctx: &mut SimContext<'_>) -> String {
    match protocol::split(input) {
        Ok(words) => dispatch(device, ctx, &words),
        Err(err) => {
            debug!("Rejected command line {:?}: {}", input, err);
            INVALID_COMMAND.to_string()
        }
    }
}

fn settle(verb: &str, result: Result<String, CommandError>) -> String {
    result.unwrap_or_else(|err| {
        debug!("Command '{}' failed: {}", verb, err);
        COMMAND_ERROR.to_string()
    })
}

/// Command device with no tick behaviour.
#[derive(Debug, Clone)]
pub struct DefaultDevice {
    base: DeviceBase,
}

impl DefaultDevice {
    pub fn new(base: DeviceBase) -> Self {
        Self { base }
    }
}

impl Default for DefaultDevice {
    fn default() -> Self {
        Self::new(DeviceBase::new("none"))
    }
}

impl CommandDevice for DefaultDevice {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }
}

impl Device for DefaultDevice {
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
