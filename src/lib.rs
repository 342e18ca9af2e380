//! # Spacecraft Device Bus Simulator
//!
//! A spacecraft is modelled as a tree of composable devices (structural
//! parts, sensors, engines, radios) bolted onto a rigid body. External
//! controller processes drive a ship by exchanging one text line per
//! command with its root device.
//!
//! ## Features
//!
//! - **Hierarchical addressing**: `part:engine: set-property intensity 2`
//!   routes through device groups by name or position
//! - **Command tables**: shell-style tokenized verbs resolved most-specific first
//! - **Sensor error model**: fixed per-instance offset plus bounded jitter
//! - **Signal propagation**: traveling, attenuating radio signals delivered to
//!   receivers in lockstep with the physics step
//! - **Controller workers**: one async worker per controller process, sharing a
//!   single simulation lock with the tick driver
//!
//! ## Quick Start
//!
//! ```rust
//! use shipbus::{Simulation, Structure, StructuralPart};
//! use shipbus::comms::CommunicationEngine;
//! use shipbus::physics::{BodyConfig, PhysicsWorld, RigidBodyWorld};
//!
//! let mut world = RigidBodyWorld::new();
//! let body = world.add_body(BodyConfig::default());
//! let mut ship = Structure::ship(body);
//! ship.add_part(StructuralPart::new((0.0, 0.0)), Some("hull"));
//!
//! let mut sim = Simulation::new(Box::new(world), CommunicationEngine::default(), 0.02);
//! let id = sim.add_ship("scout", ship);
//! assert_eq!(sim.communicate(id, "device-count").unwrap(), "1");
//! assert_eq!(sim.communicate(id, "hull: device-type").unwrap(), "structural-part");
//! ```
//!
//! ## Architecture
//!
//! - [`device`] - Device trait, command tables and group addressing
//! - [`structure`] - Ships and structural parts bound to a rigid body
//! - [`sensors`] / [`actuators`] - Leaf devices reading and driving the body
//! - [`comms`] - Communication engine and radio devices
//! - [`simulation`] - Tick coordinator shared by the driver and controllers
//! - [`controller`] - Controller process workers
//! - [`config`] - JSON configuration and topology builder

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

pub mod actuators;
pub mod comms;
pub mod config;
pub mod controller;
pub mod device;
pub mod error_gen;
pub mod interval;
pub mod physics;
pub mod protocol;
pub mod sensors;
pub mod simulation;
pub mod structure;

// Re-export main public types for convenience
pub use device::{Device, DeviceGroup, SimContext};
pub use error_gen::ErrorGenerator;
pub use simulation::{ShipId, Simulation, SimulationError};
pub use structure::{Structure, StructuralPart};
