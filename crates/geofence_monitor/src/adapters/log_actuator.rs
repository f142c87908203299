// Rust guideline compliant 2026-08-27

//! Demo adapter for the `Actuator` port.
//!
//! Logs ring/vibrate at `tracing::warn!` instead of playing audio. Holds a
//! ringing flag so a second `trigger` while already ringing is a no-op, per
//! the port's idempotency contract. `ActuatorError` is unreachable in this
//! demo adapter.

use std::cell::Cell;

use domain::{Actuator, ActuatorError, Alarm};

/// `Actuator` adapter that emits a warning log for each fired alarm.
///
/// Always returns `Ok(())`; use a platform implementation for real playback.
#[derive(Debug)]
pub struct RingActuator {
    ringing: Cell<bool>,
}

impl RingActuator {
    /// Create a silent (not ringing) actuator.
    #[must_use]
    pub fn new() -> Self {
        Self { ringing: Cell::new(false) }
    }

    /// `true` while the actuator considers itself ringing.
    ///
    /// Used in tests to assert the idempotency contract.
    #[cfg(test)]
    #[must_use]
    pub fn is_ringing(&self) -> bool {
        self.ringing.get()
    }
}

impl Default for RingActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl Actuator for RingActuator {
    /// Start "ringing" (log only). A second call while ringing is a no-op.
    async fn trigger(&self, alarm: &Alarm) -> Result<(), ActuatorError> {
        if self.ringing.get() {
            tracing::debug!("ring_actuator.noop: already ringing");
            return Ok(());
        }
        self.ringing.set(true);
        tracing::warn!(
            alarm_id = %alarm.id,
            ringtone = %alarm.ringtone_id,
            volume = alarm.volume,
            "ring_actuator.alarm: {}",
            alarm.name
        );
        Ok(())
    }

    /// Stop "ringing". Idempotent.
    async fn stop(&self) -> Result<(), ActuatorError> {
        if self.ringing.replace(false) {
            tracing::info!("ring_actuator.stopped");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
