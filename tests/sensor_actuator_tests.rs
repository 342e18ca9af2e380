use std::f64::consts::FRAC_PI_2;

use glam::DVec2;
use shipbus::actuators::Engine;
use shipbus::comms::CommunicationEngine;
use shipbus::device::{Device, DeviceFault, DeviceGroup, SimContext};
use shipbus::physics::{BodyConfig, BodyId, PhysicsWorld, RigidBodyWorld};
use shipbus::protocol::*;
use shipbus::sensors::{MultiSensor, Sensor, SensorKind};
use shipbus::structure::PartAnchor;
use shipbus::ErrorGenerator;

const EPS: f64 = 1e-9;

fn world_with_body(config: BodyConfig) -> (RigidBodyWorld, BodyId) {
    let mut world = RigidBodyWorld::new();
    let body = world.add_body(config);
    (world, body)
}

fn attached(body: BodyId, offset: DVec2) -> PartAnchor {
    let anchor = PartAnchor::new(offset);
    assert!(anchor.attach(body));
    anchor
}

fn ask(device: &mut dyn Device, world: &mut RigidBodyWorld, now: f64, line: &str) -> String {
    let mut comms = CommunicationEngine::default();
    let mut ctx = SimContext::new(world, &mut comms, now);
    device.communicate(line, &mut ctx)
}

#[test]
fn test_cached_read_and_clamped_write_scenario() {
    let (mut world, body) = world_with_body(BodyConfig::default());
    let anchor = attached(body, DVec2::ZERO);

    let mut group = DeviceGroup::new("ship");
    group.add_device(
        Box::new(Engine::limited_linear(anchor.clone(), (-4.0, 4.0), (-1.0, 1.0), 1.0)),
        Some("engine"),
    );
    group.add_device(
        Box::new(Sensor::new(SensorKind::XPosition, anchor, 1.0, ErrorGenerator::new(0.5, 0.0))),
        Some("sensor"),
    );

    let first = ask(&mut group, &mut world, 0.0, "sensor: read");
    let second = ask(&mut group, &mut world, 0.5, "sensor: read");
    assert_eq!(first, second);

    assert_eq!(ask(&mut group, &mut world, 0.5, "engine: get-property intensity"), "0");
    assert_eq!(ask(&mut group, &mut world, 0.5, "engine: set-property intensity 10"), OK);
    assert_eq!(ask(&mut group, &mut world, 0.5, "engine: get-property intensity"), "0");
}

#[test]
fn test_sensor_resamples_after_reading_time() {
    let (mut world, body) = world_with_body(BodyConfig::default());
    world.set_velocity(body, DVec2::new(10.0, 0.0));
    let mut sensor = Sensor::new(SensorKind::XPosition, attached(body, DVec2::ZERO), 1.0, ErrorGenerator::exact());

    assert_eq!(ask(&mut sensor, &mut world, 0.0, "read"), "0");

    world.step(0.5);
    assert_eq!(ask(&mut sensor, &mut world, 0.5, "read"), "0");

    world.step(1.0);
    assert_eq!(ask(&mut sensor, &mut world, 1.5, "read"), "15");
}

#[test]
fn test_sensor_metadata() {
    let (mut world, body) = world_with_body(BodyConfig::default());
    let error = ErrorGenerator::with_rng(0.25, 0.5, 1.0, &mut rand::thread_rng());
    let mut sensor = Sensor::new(SensorKind::Angle, attached(body, DVec2::ZERO), 2.0, error);

    assert_eq!(ask(&mut sensor, &mut world, 0.0, "device-type"), "angle-sensor");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "reading-time"), "2");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "max-error"), "0.75");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "max-offset"), "0.5");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "read now"), COMMAND_ERROR);
}

#[test]
fn test_angle_sensor_reports_degrees() {
    let (mut world, body) = world_with_body(BodyConfig {
        angle: FRAC_PI_2,
        ..BodyConfig::default()
    });
    let mut sensor = Sensor::new(SensorKind::Angle, attached(body, DVec2::ZERO), 1.0, ErrorGenerator::exact());

    let mut comms = CommunicationEngine::default();
    let ctx = SimContext::new(&mut world, &mut comms, 0.0);
    assert!((sensor.reading(&ctx) - 90.0).abs() < EPS);
}

#[test]
fn test_speed_sensor_projects_velocity() {
    let (mut world, body) = world_with_body(BodyConfig::default());
    world.set_velocity(body, DVec2::new(3.0, 4.0));
    let anchor = attached(body, DVec2::ZERO);

    let mut forward = Sensor::new(SensorKind::Speed { angle: 0.0 }, anchor.clone(), 1.0, ErrorGenerator::exact());
    let mut lateral = Sensor::new(SensorKind::Speed { angle: FRAC_PI_2 }, anchor, 1.0, ErrorGenerator::exact());

    let mut comms = CommunicationEngine::default();
    let ctx = SimContext::new(&mut world, &mut comms, 0.0);
    assert!((forward.reading(&ctx) - 3.0).abs() < EPS);
    assert!((lateral.reading(&ctx) - 4.0).abs() < EPS);
}

#[test]
fn test_part_position_follows_body_rotation() {
    let (world, body) = world_with_body(BodyConfig {
        x: 10.0,
        angle: FRAC_PI_2,
        ..BodyConfig::default()
    });
    let anchor = attached(body, DVec2::new(1.0, 0.0));

    let position = anchor.position(&world);
    assert!((position.x - 10.0).abs() < EPS);
    assert!((position.y - 1.0).abs() < EPS);

    let detached = PartAnchor::new(DVec2::new(2.0, 3.0));
    assert_eq!(detached.position(&world), DVec2::new(2.0, 3.0));
    assert_eq!(detached.angle(&world), 0.0);
    assert_eq!(detached.velocity(&world), DVec2::ZERO);
}

#[test]
fn test_position_sensor_group() {
    let (mut world, body) = world_with_body(BodyConfig {
        x: 4.0,
        y: -2.0,
        ..BodyConfig::default()
    });
    let mut sensor = MultiSensor::position(&attached(body, DVec2::ZERO), 1.0, 0.0, 0.0);

    assert_eq!(sensor.sensor_count(), 2);
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "device-type"), "position-sensor");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "device-count"), "2");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "x: read"), "4");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "y: read"), "-2");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "1: device-type"), "y-position-sensor");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "reading-time"), "1");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "max-error"), "0");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "read"), INVALID_COMMAND);
}

#[test]
fn test_empty_multi_sensor_has_no_metadata() {
    let mut world = RigidBodyWorld::new();
    let mut sensor = MultiSensor::new("sensor-bank");

    assert_eq!(ask(&mut sensor, &mut world, 0.0, "device-count"), "0");
    assert_eq!(ask(&mut sensor, &mut world, 0.0, "reading-time"), INVALID_COMMAND);
}

#[test]
fn test_engine_pushes_body() {
    let (mut world, body) = world_with_body(BodyConfig::default());
    let mut engine = Engine::linear(attached(body, DVec2::ZERO), 1.0, 0.0);
    assert!(engine.set_intensity(5.0));
    assert_eq!(engine.thrust(), 5.0);

    let mut comms = CommunicationEngine::default();
    let mut ctx = SimContext::new(&mut world, &mut comms, 0.0);
    engine.act(&mut ctx).unwrap();

    let velocity = world.velocity(body).unwrap();
    assert!((velocity.x - 0.5).abs() < EPS);
    assert!(velocity.y.abs() < EPS);
}

#[test]
fn test_off_center_thrust_spins_body() {
    let (mut world, body) = world_with_body(BodyConfig::default());
    let mut engine = Engine::linear(attached(body, DVec2::new(0.0, 1.0)), 1.0, 0.0);
    assert!(engine.set_intensity(5.0));

    let mut comms = CommunicationEngine::default();
    let mut ctx = SimContext::new(&mut world, &mut comms, 0.0);
    engine.act(&mut ctx).unwrap();

    let spin = world.angular_velocity(body).unwrap();
    assert!((spin + 5.0 / BodyConfig::default().moment).abs() < EPS);
}

#[test]
fn test_engine_angle_steers_thrust() {
    let (mut world, body) = world_with_body(BodyConfig::default());
    let mut engine = Engine::limited_linear(attached(body, DVec2::ZERO), (0.0, 10.0), (-FRAC_PI_2, FRAC_PI_2), 1.0);
    assert!(engine.set_intensity(10.0));
    assert!(engine.set_angle(FRAC_PI_2));
    assert!(!engine.set_angle(3.0));
    assert_eq!(engine.angle(), FRAC_PI_2);

    let mut comms = CommunicationEngine::default();
    let mut ctx = SimContext::new(&mut world, &mut comms, 0.0);
    engine.act(&mut ctx).unwrap();

    let velocity = world.velocity(body).unwrap();
    assert!(velocity.x.abs() < EPS);
    assert!((velocity.y - 1.0).abs() < EPS);
}

#[test]
fn test_engine_thrust_offset() {
    let engine = Engine::linear(PartAnchor::new(DVec2::ZERO), 2.0, 1.5);

    assert_eq!(engine.thrust(), 1.5);
    assert_eq!(engine.map_intensity_to_thrust(3.0), 7.5);
}

#[test]
fn test_engine_rejects_out_of_range_intensity() {
    let mut engine = Engine::limited_linear(PartAnchor::new(DVec2::ZERO), (-4.0, 4.0), (0.0, 0.0), 1.0);

    assert!(engine.set_intensity(-4.0));
    assert!(!engine.set_intensity(4.5));
    assert!(!engine.set_intensity(f64::NAN));
    assert_eq!(engine.intensity(), -4.0);
}

#[test]
fn test_non_finite_thrust_is_a_fault() {
    let (mut world, body) = world_with_body(BodyConfig::default());
    let mut engine = Engine::linear(attached(body, DVec2::ZERO), f64::INFINITY, 0.0);
    assert!(engine.set_intensity(1.0));

    let mut comms = CommunicationEngine::default();
    let mut ctx = SimContext::new(&mut world, &mut comms, 0.0);
    let fault = engine.act(&mut ctx).unwrap_err();

    assert!(matches!(fault, DeviceFault::NonFinite { quantity: "thrust", .. }));
    assert_eq!(world.velocity(body), Some(DVec2::ZERO));
}

#[test]
fn test_detached_engine_is_inert() {
    let mut world = RigidBodyWorld::new();
    let body = world.add_body(BodyConfig::default());
    let mut engine = Engine::linear(PartAnchor::new(DVec2::ZERO), 1.0, 0.0);
    engine.set_intensity(3.0);

    let mut comms = CommunicationEngine::default();
    let mut ctx = SimContext::new(&mut world, &mut comms, 0.0);
    engine.act(&mut ctx).unwrap();

    assert_eq!(world.velocity(body), Some(DVec2::ZERO));
}
