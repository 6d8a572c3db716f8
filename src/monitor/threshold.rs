use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::MonitorError;

/// Warn threshold in calls per second, read on every measured call.
///
/// Stored as `f64` bits so updates need no lock and take effect on the very
/// next call.
#[derive(Debug)]
pub struct LiveThreshold {
    bits: AtomicU64,
}

impl LiveThreshold {
    pub const DEFAULT: f64 = 5.0;

    pub fn new(value: f64) -> Result<Self, MonitorError> {
        validate(value)?;
        Ok(Self {
            bits: AtomicU64::new(value.to_bits()),
        })
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Replace the threshold, returning the previous value.
    pub fn set(&self, value: f64) -> Result<f64, MonitorError> {
        validate(value)?;
        Ok(f64::from_bits(self.bits.swap(value.to_bits(), Ordering::Relaxed)))
    }
}

impl Default for LiveThreshold {
    fn default() -> Self {
        Self {
            bits: AtomicU64::new(Self::DEFAULT.to_bits()),
        }
    }
}

fn validate(value: f64) -> Result<(), MonitorError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MonitorError::InvalidThreshold(value))
    }
}
