use std::collections::HashMap;

use super::{communicate_command, CommandDevice, CommandTable, Device, DeviceBase, DeviceFault, SimContext};
use crate::protocol::{expect_args, invalid_device_index, CommandError, INVALID_DEVICE};

pub const NAME_IN_GROUP_INFO: &str = "device-name-in-group";
pub const IS_GROUP_INFO: &str = "is-device-group";

/// Ordered child list plus name table. Each routing step consumes exactly
/// one `segment:` prefix of the input.
pub struct Children<T: ?Sized + Device = dyn Device> {
    devices: Vec<Box<T>>,
    names: HashMap<String, usize>,
}

impl<T: ?Sized + Device> Children<T> {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Appends `device`; a name also stamps the child's info store.
    pub fn add(&mut self, mut device: Box<T>, name: Option<&str>) -> usize {
        let index = self.devices.len();
        if let Some(name) = name {
            if let Some(base) = device.info_mut() {
                base.set_info(NAME_IN_GROUP_INFO, Some(name));
            }
            self.names.insert(name.to_string(), index);
        }
        self.devices.push(device);
        index
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.devices.get_mut(index).map(|device| &mut **device)
    }

    /// Forwards an addressed message to a child.
    ///
    /// Returns `None` when `input` carries no address, leaving it to the
    /// owning group's own command tables.
    pub fn route(&mut self, input: &str, ctx: &mut SimContext<'_>) -> Option<String> {
        let (segment, rest) = input.split_once(':')?;

        let device = if let Ok(index) = segment.trim().parse::<i64>() {
            match usize::try_from(index).ok().and_then(|i| self.devices.get_mut(i)) {
                Some(device) => device,
                None => return Some(invalid_device_index(index)),
            }
        } else {
            match self.names.get(segment) {
                Some(&index) => &mut self.devices[index],
                None => return Some(INVALID_DEVICE.to_string()),
            }
        };

        Some(device.communicate(rest, ctx))
    }

    /// Ticks every child in insertion order, stopping at the first fault.
    pub fn act_all(&mut self, ctx: &mut SimContext<'_>) -> Result<(), DeviceFault> {
        for device in &mut self.devices {
            device.act(ctx)?;
        }
        Ok(())
    }
}

impl<T: ?Sized + Device> Default for Children<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Composite device addressing its children by position or name.
pub struct DeviceGroup {
    base: DeviceBase,
    children: Children,
}

const GROUP_COMMANDS: CommandTable<DeviceGroup> = &[("device-count", DeviceGroup::cmd_device_count)];

impl DeviceGroup {
    pub fn new(device_type: &str) -> Self {
        Self::with_base(DeviceBase::new(device_type))
    }

    pub fn with_base(mut base: DeviceBase) -> Self {
        base.set_info(IS_GROUP_INFO, Some("yes"));
        Self {
            base,
            children: Children::new(),
        }
    }

    pub fn add_device(&mut self, device: Box<dyn Device>, name: Option<&str>) -> usize {
        self.children.add(device, name)
    }

    pub fn device_count(&self) -> usize {
        self.children.len()
    }

    fn cmd_device_count(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok(self.device_count().to_string())
    }
}

impl Default for DeviceGroup {
    fn default() -> Self {
        Self::new("device-group")
    }
}

impl CommandDevice for DeviceGroup {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }

    fn command_tables(&self) -> &'static [CommandTable<Self>] {
        &[GROUP_COMMANDS]
    }
}

impl Device for DeviceGroup {
    fn act(&mut self, ctx: &mut SimContext<'_>) -> Result<(), DeviceFault> {
        self.children.act_all(ctx)
    }

    fn communicate(&mut self, input: &str, ctx: &mut SimContext<'_>) -> String {
        match self.children.route(input, ctx) {
            Some(reply) => reply,
            None => communicate_command(self, input, ctx),
        }
    }

    fn info_mut(&mut self) -> Option<&mut DeviceBase> {
        Some(&mut self.base)
    }
}
