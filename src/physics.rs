//! Rigid-body collaborator interface.
//!
//! Devices only need to read a body's pose and push impulses into it. The
//! [`PhysicsWorld`] trait is that seam; [`RigidBodyWorld`] is a small
//! point-mass integrator good enough to drive ships without an external
//! engine.

use glam::DVec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyId(pub usize);

pub trait PhysicsWorld: Send {
    /// Advances every body by `dt` seconds.
    fn step(&mut self, dt: f64);

    /// False once the body has been removed from the world.
    fn contains(&self, body: BodyId) -> bool;

    fn position(&self, body: BodyId) -> Option<DVec2>;
    fn angle(&self, body: BodyId) -> Option<f64>;
    fn velocity(&self, body: BodyId) -> Option<DVec2>;

    /// Applies a world-frame `impulse` at `point`, given in body-local
    /// coordinates. Unknown bodies are ignored.
    fn apply_impulse_at_local_point(&mut self, body: BodyId, impulse: DVec2, point: DVec2);

    fn remove_body(&mut self, body: BodyId);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    pub mass: f64,
    pub moment: f64,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            mass: 10.0,
            moment: 12_500.0,
            x: 0.0,
            y: 0.0,
            angle: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct RigidBody {
    mass: f64,
    moment: f64,
    position: DVec2,
    velocity: DVec2,
    angle: f64,
    angular_velocity: f64,
}

#[derive(Debug, Default)]
pub struct RigidBodyWorld {
    bodies: Vec<Option<RigidBody>>,
}

impl RigidBodyWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, config: BodyConfig) -> BodyId {
        debug_assert!(config.mass > 0.0, "Body mass {} must be positive", config.mass);
        debug_assert!(config.moment > 0.0, "Body moment {} must be positive", config.moment);

        self.bodies.push(Some(RigidBody {
            mass: config.mass,
            moment: config.moment,
            position: DVec2::new(config.x, config.y),
            velocity: DVec2::ZERO,
            angle: config.angle,
            angular_velocity: 0.0,
        }));
        BodyId(self.bodies.len() - 1)
    }

    pub fn set_velocity(&mut self, body: BodyId, velocity: DVec2) {
        if let Some(b) = self.body_mut(body) {
            b.velocity = velocity;
        }
    }

    pub fn angular_velocity(&self, body: BodyId) -> Option<f64> {
        self.body(body).map(|b| b.angular_velocity)
    }

    fn body(&self, body: BodyId) -> Option<&RigidBody> {
        self.bodies.get(body.0).and_then(Option::as_ref)
    }

    fn body_mut(&mut self, body: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(body.0).and_then(Option::as_mut)
    }
}

impl PhysicsWorld for RigidBodyWorld {
    fn step(&mut self, dt: f64) {
        for body in self.bodies.iter_mut().flatten() {
            body.position += body.velocity * dt;
            body.angle += body.angular_velocity * dt;
        }
    }

    fn contains(&self, body: BodyId) -> bool {
        self.body(body).is_some()
    }

    fn position(&self, body: BodyId) -> Option<DVec2> {
        self.body(body).map(|b| b.position)
    }

    fn angle(&self, body: BodyId) -> Option<f64> {
        self.body(body).map(|b| b.angle)
    }

    fn velocity(&self, body: BodyId) -> Option<DVec2> {
        self.body(body).map(|b| b.velocity)
    }

    fn apply_impulse_at_local_point(&mut self, body: BodyId, impulse: DVec2, point: DVec2) {
        let Some(b) = self.body_mut(body) else {
            return;
        };
        let arm = DVec2::from_angle(b.angle).rotate(point);
        b.velocity += impulse / b.mass;
        b.angular_velocity += arm.perp_dot(impulse) / b.moment;
    }

    fn remove_body(&mut self, body: BodyId) {
        if let Some(slot) = self.bodies.get_mut(body.0) {
            *slot = None;
        }
    }
}
