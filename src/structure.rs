//! Ships and the structural parts bolted onto their rigid body.
//!
//! A [`Structure`] owns its device tree and a handle to its body in the
//! physics world. Parts, and the sensors and actuators mounted on them,
//! share a [`PartAnchor`]: the part's fixed local offset plus the body
//! handle, filled in once when the part is added to a structure.

use std::sync::{Arc, OnceLock};

use glam::DVec2;
use tracing::warn;

use crate::device::{Device, DeviceBase, DeviceFault, DeviceGroup, SimContext};
use crate::physics::{BodyId, PhysicsWorld};

#[derive(Debug)]
struct AnchorInner {
    offset: DVec2,
    body: OnceLock<BodyId>,
}

/// Non-owning link from a part to its structure's body.
#[derive(Debug, Clone)]
pub struct PartAnchor(Arc<AnchorInner>);

impl PartAnchor {
    pub fn new(offset: DVec2) -> Self {
        Self(Arc::new(AnchorInner {
            offset,
            body: OnceLock::new(),
        }))
    }

    pub fn offset(&self) -> DVec2 {
        self.0.offset
    }

    pub fn body(&self) -> Option<BodyId> {
        self.0.body.get().copied()
    }

    /// Binds the anchor to `body`. Only the first call has any effect.
    pub fn attach(&self, body: BodyId) -> bool {
        self.0.body.set(body).is_ok()
    }

    pub fn is_attached(&self) -> bool {
        self.0.body.get().is_some()
    }

    /// World position of the part; the raw offset when detached.
    pub fn position(&self, world: &dyn PhysicsWorld) -> DVec2 {
        let pose = self
            .body()
            .and_then(|body| Some((world.position(body)?, world.angle(body)?)));
        match pose {
            Some((position, angle)) => position + DVec2::from_angle(angle).rotate(self.offset()),
            None => self.offset(),
        }
    }

    pub fn angle(&self, world: &dyn PhysicsWorld) -> f64 {
        self.body().and_then(|body| world.angle(body)).unwrap_or(0.0)
    }

    pub fn velocity(&self, world: &dyn PhysicsWorld) -> DVec2 {
        self.body()
            .and_then(|body| world.velocity(body))
            .unwrap_or(DVec2::ZERO)
    }

    /// Pushes the body with `magnitude` along `angle` (relative to the body
    /// orientation), applied at the part offset shifted by `(x, y)`.
    pub fn apply_force(&self, world: &mut dyn PhysicsWorld, magnitude: f64, x: f64, y: f64, angle: f64) {
        let Some(body) = self.body() else {
            return;
        };
        let Some(body_angle) = world.angle(body) else {
            return;
        };
        let impulse = DVec2::from_angle(angle + body_angle) * magnitude;
        world.apply_impulse_at_local_point(body, impulse, self.offset() + DVec2::new(x, y));
    }
}

/// Device group mounted at a fixed offset on a structure's body.
pub struct StructuralPart {
    group: DeviceGroup,
    anchor: PartAnchor,
}

impl StructuralPart {
    pub fn new(offset: (f64, f64)) -> Self {
        Self {
            group: DeviceGroup::new("structural-part"),
            anchor: PartAnchor::new(DVec2::new(offset.0, offset.1)),
        }
    }

    /// Handle for devices mounted on this part.
    pub fn anchor(&self) -> PartAnchor {
        self.anchor.clone()
    }

    pub fn offset(&self) -> DVec2 {
        self.anchor.offset()
    }

    pub fn add_device(&mut self, device: Box<dyn Device>, name: Option<&str>) -> usize {
        self.group.add_device(device, name)
    }

    pub fn device_count(&self) -> usize {
        self.group.device_count()
    }

    pub fn position(&self, world: &dyn PhysicsWorld) -> DVec2 {
        self.anchor.position(world)
    }

    pub fn angle(&self, world: &dyn PhysicsWorld) -> f64 {
        self.anchor.angle(world)
    }

    pub fn velocity(&self, world: &dyn PhysicsWorld) -> DVec2 {
        self.anchor.velocity(world)
    }

    pub fn apply_force(&self, world: &mut dyn PhysicsWorld, magnitude: f64, x: f64, y: f64, angle: f64) {
        self.anchor.apply_force(world, magnitude, x, y, angle);
    }
}

impl Device for StructuralPart {
    fn act(&mut self, ctx: &mut SimContext<'_>) -> Result<(), DeviceFault> {
        self.group.act(ctx)
    }

    fn communicate(&mut self, input: &str, ctx: &mut SimContext<'_>) -> String {
        self.group.communicate(input, ctx)
    }

    fn info_mut(&mut self) -> Option<&mut DeviceBase> {
        self.group.info_mut()
    }
}

/// Root of a ship's device tree, bound to one rigid body.
pub struct Structure {
    group: DeviceGroup,
    body: BodyId,
}

impl Structure {
    pub fn new(body: BodyId, device_type: &str) -> Self {
        Self {
            group: DeviceGroup::new(device_type),
            body,
        }
    }

    pub fn ship(body: BodyId) -> Self {
        Self::new(body, "ship")
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Adds a part and binds it to this structure's body.
    pub fn add_part(&mut self, part: StructuralPart, name: Option<&str>) -> usize {
        if !part.anchor.attach(self.body) {
            warn!(
                "Structural part {:?} is already bound to another body; keeping the first binding",
                name
            );
        }
        self.group.add_device(Box::new(part), name)
    }

    pub fn add_device(&mut self, device: Box<dyn Device>, name: Option<&str>) -> usize {
        self.group.add_device(device, name)
    }

    pub fn device_count(&self) -> usize {
        self.group.device_count()
    }

    pub fn is_destroyed(&self, world: &dyn PhysicsWorld) -> bool {
        !world.contains(self.body)
    }
}

impl Device for Structure {
    fn act(&mut self, ctx: &mut SimContext<'_>) -> Result<(), DeviceFault> {
        self.group.act(ctx)
    }

    fn communicate(&mut self, input: &str, ctx: &mut SimContext<'_>) -> String {
        self.group.communicate(input, ctx)
    }

    fn info_mut(&mut self) -> Option<&mut DeviceBase> {
        self.group.info_mut()
    }
}
