use rand::Rng;
use serde::{Deserialize, Serialize};

/// Measurement error model: a constant per-instance offset plus fresh
/// uniform jitter on every application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorGenerator {
    error_max: f64,
    offset_max: f64,
    offset: f64,
}

impl ErrorGenerator {
    pub fn new(error_max: f64, offset_max: f64) -> Self {
        Self::with_rng(error_max, offset_max, 1.0, &mut rand::thread_rng())
    }

    /// Scales `error_max` once by a factor drawn from `[min_factor, 1]`.
    pub fn with_min_factor(error_max: f64, offset_max: f64, min_factor: f64) -> Self {
        Self::with_rng(error_max, offset_max, min_factor, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        error_max: f64,
        offset_max: f64,
        min_factor: f64,
        rng: &mut R,
    ) -> Self {
        let error_max = if (min_factor - 1.0).abs() > f64::EPSILON {
            error_max * (min_factor + rng.gen::<f64>() * (1.0 - min_factor))
        } else {
            error_max
        };

        Self {
            error_max,
            offset_max,
            offset: (2.0 * rng.gen::<f64>() - 1.0) * offset_max,
        }
    }

    /// Generator that returns its input untouched.
    pub const fn exact() -> Self {
        Self {
            error_max: 0.0,
            offset_max: 0.0,
            offset: 0.0,
        }
    }

    pub fn max_error(&self) -> f64 {
        self.error_max
    }

    pub fn max_offset(&self) -> f64 {
        self.offset_max
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn apply(&self, value: f64) -> f64 {
        self.apply_with(value, &mut rand::thread_rng())
    }

    pub fn apply_with<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        let value = value + self.offset;
        if self.error_max == 0.0 {
            return value;
        }
        value + (2.0 * rng.gen::<f64>() - 1.0) * self.error_max
    }
}

impl Default for ErrorGenerator {
    fn default() -> Self {
        Self::exact()
    }
}
