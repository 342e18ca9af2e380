//! Simulation coordinator shared by the tick driver and controller workers.
//!
//! Callers wrap a [`Simulation`] in one `tokio::sync::Mutex`; whoever holds
//! the lock has exclusive access to the physics world, the communication
//! engine and every ship's device tree.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::comms::CommunicationEngine;
use crate::config::{ConfigError, SimulationConfig};
use crate::device::{Device, DeviceFault, SimContext};
use crate::physics::{PhysicsWorld, RigidBodyWorld};
use crate::structure::Structure;

/// Handle of a ship registered with a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShipId(usize);

impl std::fmt::Display for ShipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("unknown ship {0}")]
    UnknownShip(ShipId),
    #[error("ship '{ship}' faulted: {source}")]
    ShipFault {
        id: ShipId,
        ship: String,
        source: DeviceFault,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

struct Ship {
    name: String,
    root: Structure,
    faulted: bool,
}

pub struct Simulation {
    world: Box<dyn PhysicsWorld>,
    comms: CommunicationEngine,
    ships: Vec<Option<Ship>>,
    names: HashMap<String, ShipId>,
    timestep: f64,
    elapsed: f64,
    tick_count: u64,
}

impl Simulation {
    pub fn new(world: Box<dyn PhysicsWorld>, comms: CommunicationEngine, timestep: f64) -> Self {
        Self {
            world,
            comms,
            ships: Vec::new(),
            names: HashMap::new(),
            timestep,
            elapsed: 0.0,
            tick_count: 0,
        }
    }

    /// Builds the world, the engine and every configured ship.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut world = RigidBodyWorld::new();
        let mut comms = CommunicationEngine::new(config.comms);
        let mut ships = Vec::with_capacity(config.ships.len());
        for ship in &config.ships {
            let body = world.add_body(ship.body);
            ships.push((ship.name.as_str(), ship.build(body, &mut comms)?));
        }

        let mut simulation = Self::new(Box::new(world), comms, config.timestep);
        for (name, root) in ships {
            simulation.add_ship(name, root);
        }
        Ok(simulation)
    }

    pub fn add_ship(&mut self, name: &str, root: Structure) -> ShipId {
        let id = ShipId(self.ships.len());
        if self.names.insert(name.to_string(), id).is_some() {
            warn!("Ship name '{}' reused; lookups now resolve to {}", name, id);
        }
        info!("🚀 Ship '{}' registered as {} ({} devices)", name, id, root.device_count());
        self.ships.push(Some(Ship {
            name: name.to_string(),
            root,
            faulted: false,
        }));
        id
    }

    /// Drops a ship's device tree and its body. Watchers then see it as
    /// destroyed.
    pub fn remove_ship(&mut self, id: ShipId) -> Result<(), SimulationError> {
        let ship = self
            .ships
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(SimulationError::UnknownShip(id))?;
        self.world.remove_body(ship.root.body());
        if self.names.get(&ship.name) == Some(&id) {
            self.names.remove(&ship.name);
        }
        info!("Ship '{}' removed", ship.name);
        Ok(())
    }

    /// One simulation step: physics, then every healthy ship acts, then
    /// signals propagate.
    ///
    /// A ship whose device tree faults is skipped from then on. All ships
    /// still act this tick; the first fault is returned.
    pub fn tick(&mut self) -> Result<(), SimulationError> {
        self.world.step(self.timestep);
        self.elapsed += self.timestep;
        self.tick_count += 1;

        let mut first_fault = None;
        for (index, slot) in self.ships.iter_mut().enumerate() {
            let Some(ship) = slot else {
                continue;
            };
            if ship.faulted {
                continue;
            }

            let mut ctx = SimContext::new(&mut *self.world, &mut self.comms, self.elapsed);
            if let Err(fault) = ship.root.act(&mut ctx) {
                error!("❌ Ship '{}' faulted: {}", ship.name, fault);
                ship.faulted = true;
                first_fault.get_or_insert(SimulationError::ShipFault {
                    id: ShipId(index),
                    ship: ship.name.clone(),
                    source: fault,
                });
            }
        }

        self.comms.step(&*self.world);

        match first_fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Sends one protocol line to a ship's root device.
    pub fn communicate(&mut self, id: ShipId, line: &str) -> Result<String, SimulationError> {
        let ship = self
            .ships
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SimulationError::UnknownShip(id))?;

        let mut ctx = SimContext::new(&mut *self.world, &mut self.comms, self.elapsed);
        let reply = ship.root.communicate(line, &mut ctx);
        debug!("{} <- {:?} -> {:?}", ship.name, line, reply);
        Ok(reply)
    }

    /// True once the ship was removed or its body left the world.
    pub fn is_destroyed(&self, id: ShipId) -> bool {
        match self.ship(id) {
            Some(ship) => ship.root.is_destroyed(&*self.world),
            None => true,
        }
    }

    pub fn is_faulted(&self, id: ShipId) -> bool {
        self.ship(id).is_some_and(|ship| ship.faulted)
    }

    pub fn faulted_ships(&self) -> Vec<ShipId> {
        self.ship_ids().filter(|&id| self.is_faulted(id)).collect()
    }

    pub fn ship_id(&self, name: &str) -> Option<ShipId> {
        self.names.get(name).copied()
    }

    pub fn ship_name(&self, id: ShipId) -> Option<&str> {
        self.ship(id).map(|ship| ship.name.as_str())
    }

    /// Ids of ships not yet removed.
    pub fn ship_ids(&self) -> impl Iterator<Item = ShipId> + '_ {
        self.ships
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| ShipId(index))
    }

    pub fn ship_count(&self) -> usize {
        self.ships.iter().flatten().count()
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    /// Simulated seconds since start.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn world(&self) -> &dyn PhysicsWorld {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut dyn PhysicsWorld {
        &mut *self.world
    }

    pub fn comms(&self) -> &CommunicationEngine {
        &self.comms
    }

    pub fn comms_mut(&mut self) -> &mut CommunicationEngine {
        &mut self.comms
    }

    fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.get(id.0).and_then(Option::as_ref)
    }
}
