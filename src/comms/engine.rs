use std::sync::{Arc, Weak};

use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::physics::PhysicsWorld;

/// Anything the engine can deliver signals to.
pub trait SignalReceiver: Send + Sync {
    fn position(&self, world: &dyn PhysicsWorld) -> DVec2;
    fn signal_received(&self, intensity: f64, frequency: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommsConfig {
    /// Peak-to-peak width of the uniform noise added on delivery.
    pub max_noise: f64,
    /// Distance a signal travels per tick.
    pub speed: f64,
    /// Signals weaker than this at their front are dropped.
    pub negligible_intensity: f64,
}

impl Default for CommsConfig {
    fn default() -> Self {
        Self {
            max_noise: 0.0,
            speed: 50.0,
            negligible_intensity: 1.0,
        }
    }
}

/// A traveling signal. Its delivery window is the annulus of width `speed`
/// centred on the distance covered so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    origin: DVec2,
    initial_intensity: f64,
    frequency: f64,
    distance: f64,
    min_sqrd: f64,
    max_sqrd: f64,
}

impl Signal {
    fn new(origin: DVec2, initial_intensity: f64, frequency: f64, speed: f64) -> Self {
        let mut signal = Self {
            origin,
            initial_intensity,
            frequency,
            distance: 0.0,
            min_sqrd: 0.0,
            max_sqrd: 0.0,
        };
        signal.update_window(speed);
        signal
    }

    pub fn origin(&self) -> DVec2 {
        self.origin
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn initial_intensity(&self) -> f64 {
        self.initial_intensity
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// `(min, max)` squared distances reachable this tick.
    pub fn window(&self) -> (f64, f64) {
        (self.min_sqrd, self.max_sqrd)
    }

    /// Attenuated intensity at `distance`; sub-unit distances count as 1.
    pub fn intensity_at(&self, distance: f64) -> f64 {
        self.initial_intensity / distance.max(1.0)
    }

    pub fn front_intensity(&self) -> f64 {
        self.intensity_at(self.distance)
    }

    fn reaches(&self, sqrd_distance: f64) -> bool {
        self.min_sqrd <= sqrd_distance && sqrd_distance < self.max_sqrd
    }

    fn advance(&mut self, speed: f64) {
        self.distance += speed;
        self.update_window(speed);
    }

    fn update_window(&mut self, speed: f64) {
        let half = speed / 2.0;
        let inner = (self.distance - half).max(0.0);
        let outer = self.distance + half;
        self.min_sqrd = inner * inner;
        self.max_sqrd = outer * outer;
    }
}

/// Owns the live signals and weak links to the registered receivers.
pub struct CommunicationEngine {
    config: CommsConfig,
    signals: Vec<Signal>,
    receivers: Vec<Weak<dyn SignalReceiver>>,
    rng: StdRng,
}

impl CommunicationEngine {
    pub fn new(config: CommsConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: CommsConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: CommsConfig, rng: StdRng) -> Self {
        debug_assert!(config.speed > 0.0, "Signal speed {} must be positive", config.speed);
        debug_assert!(config.max_noise >= 0.0, "Noise width {} must not be negative", config.max_noise);

        Self {
            config,
            signals: Vec::new(),
            receivers: Vec::new(),
            rng,
        }
    }

    pub fn config(&self) -> &CommsConfig {
        &self.config
    }

    /// Emits a new signal from `origin`.
    pub fn send(&mut self, origin: DVec2, intensity: f64, frequency: f64) {
        trace!(
            "Signal emitted at ({:.1}, {:.1}) intensity={} frequency={}",
            origin.x,
            origin.y,
            intensity,
            frequency
        );
        self.signals
            .push(Signal::new(origin, intensity, frequency, self.config.speed));
    }

    pub fn add_receiver<R: SignalReceiver + 'static>(&mut self, receiver: &Arc<R>) {
        let weak: Weak<R> = Arc::downgrade(receiver);
        self.receivers.push(weak);
    }

    pub fn clear_receivers(&mut self) {
        self.receivers.clear();
    }

    /// Drops every signal and receiver link.
    pub fn clear(&mut self) {
        self.signals.clear();
        self.receivers.clear();
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Live receivers; links to dropped devices are not counted.
    pub fn receiver_count(&self) -> usize {
        self.receivers.iter().filter(|r| r.strong_count() > 0).count()
    }

    /// One tick: every signal delivers to every receiver inside its window,
    /// then moves on. Signals whose front fell below the negligible
    /// intensity are removed afterwards.
    pub fn step(&mut self, world: &dyn PhysicsWorld) {
        self.receivers.retain(|r| r.strong_count() > 0);
        let receivers: Vec<(Arc<dyn SignalReceiver>, DVec2)> = self
            .receivers
            .iter()
            .filter_map(Weak::upgrade)
            .map(|receiver| {
                let position = receiver.position(world);
                (receiver, position)
            })
            .collect();

        let CommsConfig {
            max_noise,
            speed,
            negligible_intensity,
        } = self.config;

        for signal in &mut self.signals {
            for (receiver, position) in &receivers {
                let sqrd_distance = position.distance_squared(signal.origin);
                if !signal.reaches(sqrd_distance) {
                    continue;
                }

                let intensity = signal.intensity_at(sqrd_distance.sqrt());
                let noise = (self.rng.gen::<f64>() - 0.5) * max_noise;
                if intensity > 2.0 * noise.abs() {
                    receiver.signal_received((intensity + noise).abs(), signal.frequency);
                }
            }
            signal.advance(speed);
        }

        let before = self.signals.len();
        self.signals
            .retain(|signal| signal.front_intensity() >= negligible_intensity);
        let expired = before - self.signals.len();
        if expired > 0 {
            trace!("{} signal(s) expired, {} live", expired, self.signals.len());
        }
    }
}

impl Default for CommunicationEngine {
    fn default() -> Self {
        Self::new(CommsConfig::default())
    }
}
