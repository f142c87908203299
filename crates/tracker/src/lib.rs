// Rust guideline compliant 2026-08-21

//! TriggerStateTracker: per-alarm radius-membership state machine.
//!
//! Entry points: [`TriggerTracker::evaluate`], [`TriggerTracker::reset`],
//! [`TriggerTracker::reset_all`]. Edge-triggered by design: an alarm fires
//! once when the boundary is crossed inward, stays silent while the device
//! lingers inside, and re-arms automatically once the device leaves.

use std::collections::HashMap;
use uuid::Uuid;

/// Radius-membership state for one alarm.
///
/// Created lazily on first evaluation; the initial state is `Outside`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Membership {
    /// Device is outside the trigger radius (or never evaluated).
    #[default]
    Outside,
    /// Device is inside the trigger radius.
    Inside,
}

/// Outcome of one evaluation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No boundary crossing; state is unchanged.
    None,
    /// Crossed from `Outside` to `Inside` -- the alarm should fire.
    EnteredRadius,
    /// Crossed from `Inside` to `Outside` -- the alarm re-arms silently.
    ExitedRadius,
}

/// Owns the map from alarm id to [`Membership`] for one monitoring session.
///
/// Purely synchronous; the engine serializes all calls, so no interior
/// locking is needed.
#[derive(Debug, Default)]
pub struct TriggerTracker {
    states: HashMap<Uuid, Membership>,
}

impl TriggerTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one alarm against the latest fix.
    ///
    /// `distance_m <= radius_m` counts as inside (inclusive boundary).
    /// Returns [`Transition::EnteredRadius`] only on an outside-to-inside
    /// crossing and [`Transition::ExitedRadius`] only on the reverse;
    /// everything else is [`Transition::None`].
    pub fn evaluate(&mut self, alarm_id: Uuid, distance_m: f64, radius_m: f64) -> Transition {
        let state = self.states.entry(alarm_id).or_default();
        let inside = distance_m <= radius_m;
        match (*state, inside) {
            (Membership::Outside, true) => {
                *state = Membership::Inside;
                Transition::EnteredRadius
            }
            (Membership::Inside, false) => {
                *state = Membership::Outside;
                Transition::ExitedRadius
            }
            // Lingering inside or wandering outside: no edge, no re-fire.
            (Membership::Inside, true) | (Membership::Outside, false) => Transition::None,
        }
    }

    /// Current membership for `alarm_id`, defaulting to `Outside` when the
    /// alarm has never been evaluated.
    #[must_use]
    pub fn membership(&self, alarm_id: Uuid) -> Membership {
        self.states.get(&alarm_id).copied().unwrap_or_default()
    }

    /// Force `alarm_id` back to `Outside` (dismiss/snooze re-arm).
    ///
    /// The next evaluation at a distance within the radius fires again.
    pub fn reset(&mut self, alarm_id: Uuid) {
        self.states.insert(alarm_id, Membership::Outside);
    }

    /// Drop all state for `alarm_id` (alarm deleted).
    pub fn remove(&mut self, alarm_id: Uuid) {
        self.states.remove(&alarm_id);
    }

    /// Clear all tracked state (monitoring stopped).
    pub fn reset_all(&mut self) {
        self.states.clear();
    }

    /// Number of alarms with lazily-created state.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
