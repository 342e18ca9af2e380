use glam::DVec2;
use shipbus::actuators::Engine;
use shipbus::comms::CommunicationEngine;
use shipbus::device::group::{IS_GROUP_INFO, NAME_IN_GROUP_INFO};
use shipbus::device::{
    communicate_command, Children, CommandDevice, CommandTable, DefaultDevice, Device, DeviceBase, DeviceFault,
    DeviceGroup, Property, PropertySetter, SimContext,
};
use shipbus::physics::RigidBodyWorld;
use shipbus::protocol::*;
use shipbus::structure::PartAnchor;

fn ask(device: &mut dyn Device, line: &str) -> String {
    let mut world = RigidBodyWorld::new();
    let mut comms = CommunicationEngine::default();
    let mut ctx = SimContext::new(&mut world, &mut comms, 0.0);
    device.communicate(line, &mut ctx)
}

fn named(device_type: &str) -> Box<DefaultDevice> {
    Box::new(DefaultDevice::new(DeviceBase::new(device_type)))
}

fn two_child_group() -> DeviceGroup {
    let mut group = DeviceGroup::new("bus");
    group.add_device(named("alpha"), Some("a"));
    group.add_device(named("beta"), None);
    group
}

#[test]
fn test_base_verbs() {
    let mut device = DefaultDevice::new(DeviceBase::new("beacon").with_description("Test beacon"));

    assert_eq!(ask(&mut device, "device-type"), "beacon");
    assert_eq!(ask(&mut device, "device-desc"), "Test beacon");
    assert_eq!(ask(&mut device, "get-info color"), NULL);

    let mut plain = DefaultDevice::default();
    assert_eq!(ask(&mut plain, "device-type"), "none");
    assert_eq!(ask(&mut plain, "device-desc"), "not specified");
}

#[test]
fn test_unknown_and_empty_commands() {
    let mut device = DefaultDevice::default();

    assert_eq!(ask(&mut device, "warp 9"), INVALID_COMMAND);
    assert_eq!(ask(&mut device, ""), INVALID_COMMAND);
    assert_eq!(ask(&mut device, "   "), INVALID_COMMAND);
}

#[test]
fn test_tokenizer_failure_is_invalid_command() {
    let mut device = DefaultDevice::default();

    assert_eq!(ask(&mut device, "get-info \"color"), INVALID_COMMAND);
    assert_eq!(ask(&mut device, "get-info color\\"), INVALID_COMMAND);
}

#[test]
fn test_handler_failure_is_command_error() {
    let mut device = DefaultDevice::default();

    // Wrong arity on known verbs
    assert_eq!(ask(&mut device, "device-type now"), COMMAND_ERROR);
    assert_eq!(ask(&mut device, "get-info"), COMMAND_ERROR);
    assert_eq!(COMMAND_ERROR, "An error ocurred running the command");
}

#[test]
fn test_quoted_arguments_reach_handler() {
    let mut base = DeviceBase::new("beacon");
    base.set_info("call sign", Some("Red Five"));
    let mut device = DefaultDevice::new(base);

    assert_eq!(ask(&mut device, "get-info 'call sign'"), "Red Five");
    assert_eq!(ask(&mut device, "get-info \"call sign\""), "Red Five");
}

#[test]
fn test_group_routes_by_index() {
    let mut group = two_child_group();

    assert_eq!(ask(&mut group, "0: device-type"), "alpha");
    assert_eq!(ask(&mut group, "1:device-type"), "beta");
    assert_eq!(ask(&mut group, " 1 : device-type"), "beta");
}

#[test]
fn test_group_rejects_bad_index() {
    let mut group = two_child_group();

    assert_eq!(ask(&mut group, "2: device-type"), "Error: Invalid device '2'");
    assert_eq!(ask(&mut group, "-1: device-type"), "Error: Invalid device '-1'");
}

#[test]
fn test_group_routes_by_name() {
    let mut group = two_child_group();

    assert_eq!(ask(&mut group, "a: device-type"), "alpha");
    assert_eq!(ask(&mut group, "b: device-type"), INVALID_DEVICE);
    assert_eq!(ask(&mut group, ": device-type"), INVALID_DEVICE);
}

#[test]
fn test_group_own_verbs() {
    let mut group = two_child_group();

    assert_eq!(ask(&mut group, "device-count"), "2");
    assert_eq!(ask(&mut group, "device-type"), "bus");
    assert_eq!(ask(&mut group, &format!("get-info {IS_GROUP_INFO}")), "yes");
    assert_eq!(ask(&mut group, "device-count 1"), COMMAND_ERROR);
}

#[test]
fn test_named_child_knows_its_name() {
    let mut group = two_child_group();

    assert_eq!(ask(&mut group, &format!("a: get-info {NAME_IN_GROUP_INFO}")), "a");
    assert_eq!(ask(&mut group, &format!("1: get-info {NAME_IN_GROUP_INFO}")), NULL);
}

#[test]
fn test_nested_groups_strip_one_segment_per_level() {
    let mut inner = DeviceGroup::new("rack");
    inner.add_device(named("leaf"), Some("leaf"));

    let mut outer = DeviceGroup::new("bus");
    outer.add_device(Box::new(inner), Some("inner"));

    assert_eq!(ask(&mut outer, "inner:leaf: device-type"), "leaf");
    assert_eq!(ask(&mut outer, "0:0: device-type"), "leaf");
    assert_eq!(ask(&mut outer, "inner: device-count"), "1");
    assert_eq!(ask(&mut outer, "inner:1: device-type"), "Error: Invalid device '1'");
}

fn engine() -> Engine {
    Engine::limited_linear(PartAnchor::new(DVec2::ZERO), (-4.0, 4.0), (-1.0, 1.0), 2.0)
}

#[test]
fn test_engine_property_listing() {
    let mut engine = engine();

    assert_eq!(ask(&mut engine, "device-type"), "engine");
    assert_eq!(ask(&mut engine, "list-properties"), "intensity:angle:thrust");
    assert_eq!(ask(&mut engine, "show-properties"), "intensity=0:angle=0:thrust=0");
}

#[test]
fn test_engine_property_writes() {
    let mut engine = engine();

    assert_eq!(ask(&mut engine, "set-property intensity 3"), OK);
    assert_eq!(ask(&mut engine, "get-property intensity"), "3");
    assert_eq!(ask(&mut engine, "get-property thrust"), "6");

    // Out of range writes are accepted and ignored
    assert_eq!(ask(&mut engine, "set-property intensity 10"), OK);
    assert_eq!(ask(&mut engine, "get-property intensity"), "3");
    assert_eq!(engine.intensity(), 3.0);
}

#[test]
fn test_property_errors() {
    let mut engine = engine();

    assert_eq!(ask(&mut engine, "set-property thrust 1"), READ_ONLY_PROPERTY);
    assert_eq!(ask(&mut engine, "get-property warp"), UNKNOWN_PROPERTY);
    assert_eq!(ask(&mut engine, "set-property warp 1"), UNKNOWN_PROPERTY);
    assert_eq!(ask(&mut engine, "set-property intensity fast"), COMMAND_ERROR);
    assert_eq!(ask(&mut engine, "set-property intensity"), COMMAND_ERROR);
}

#[test]
fn test_devices_without_properties_reject_property_verbs() {
    let mut device = DefaultDevice::default();

    assert_eq!(ask(&mut device, "list-properties"), INVALID_COMMAND);
    assert_eq!(ask(&mut device, "get-property intensity"), INVALID_COMMAND);
}

/// Shadows base and property verbs so table precedence is observable.
struct Transponder {
    base: DeviceBase,
    code: f64,
}

const TRANSPONDER_COMMANDS: CommandTable<Transponder> = &[
    ("device-type", Transponder::cmd_device_type),
    ("list-properties", Transponder::cmd_list_properties),
    ("squawk", Transponder::cmd_squawk),
];

const TRANSPONDER_FALLBACK: CommandTable<Transponder> = &[
    ("squawk", Transponder::cmd_squawk_fallback),
    ("ident", Transponder::cmd_ident),
];

const TRANSPONDER_PROPERTIES: &[Property<Transponder>] = &[Property {
    name: "code",
    get: Transponder::code_text,
    set: Some(Transponder::set_code_text as PropertySetter<Transponder>),
}];

impl Transponder {
    fn new() -> Self {
        Self {
            base: DeviceBase::new("transponder"),
            code: 7000.0,
        }
    }

    fn code_text(&self) -> String {
        format_number(self.code)
    }

    fn set_code_text(&mut self, value: &str) -> Result<(), CommandError> {
        self.code = parse_number(value)?;
        Ok(())
    }

    fn cmd_device_type(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok("mode-s-transponder".to_string())
    }

    fn cmd_list_properties(&mut self, _ctx: &mut SimContext<'_>, args: &[String]) -> Result<String, CommandError> {
        expect_args::<0>(args)?;
        Ok("hidden".to_string())
    }

    fn cmd_squawk(&mut self, _ctx: &mut SimContext<'_>, _args: &[String]) -> Result<String, CommandError> {
        Ok(format_number(self.code))
    }

    fn cmd_squawk_fallback(&mut self, _ctx: &mut SimContext<'_>, _args: &[String]) -> Result<String, CommandError> {
        Ok("fallback".to_string())
    }

    fn cmd_ident(&mut self, _ctx: &mut SimContext<'_>, _args: &[String]) -> Result<String, CommandError> {
        Ok("ident".to_string())
    }
}

impl CommandDevice for Transponder {
    fn base(&self) -> &DeviceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DeviceBase {
        &mut self.base
    }

    fn command_tables(&self) -> &'static [CommandTable<Self>] {
        &[TRANSPONDER_COMMANDS, TRANSPONDER_FALLBACK]
    }

    fn properties(&self) -> Option<&'static [Property<Self>]> {
        Some(TRANSPONDER_PROPERTIES)
    }
}

impl Device for Transponder {
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

#[test]
fn test_most_specific_table_wins() {
    let mut transponder = Transponder::new();

    // Device table shadows the base verb and the property verb
    assert_eq!(ask(&mut transponder, "device-type"), "mode-s-transponder");
    assert_eq!(ask(&mut transponder, "list-properties"), "hidden");

    // Earlier device tables shadow later ones
    assert_eq!(ask(&mut transponder, "squawk"), "7000");
    assert_eq!(ask(&mut transponder, "ident"), "ident");

    // Unshadowed verbs still reach the property and base tables
    assert_eq!(ask(&mut transponder, "set-property code 1200"), OK);
    assert_eq!(ask(&mut transponder, "show-properties"), "code=1200");
    assert_eq!(ask(&mut transponder, "device-desc"), "not specified");
}

#[test]
fn test_children_table_tracks_membership() {
    let mut children: Children = Children::new();
    assert!(children.is_empty());

    assert_eq!(children.add(named("alpha"), Some("a")), 0);
    assert_eq!(children.add(named("beta"), None), 1);
    assert!(!children.is_empty());
    assert_eq!(children.len(), 2);
}
