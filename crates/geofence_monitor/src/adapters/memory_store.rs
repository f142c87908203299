// Rust guideline compliant 2026-08-27

//! In-memory adapter for the `AlarmStore` port.
//!
//! Intended for proof-of-concept runs and unit tests only. Alarms and the
//! trigger history live in plain vectors behind `RefCell`.

use std::cell::RefCell;

use chrono::Utc;
use domain::{Alarm, AlarmStore, StoreError, TriggerEvent};
use uuid::Uuid;

/// `AlarmStore` adapter backed by in-memory vectors.
///
/// `increment_trigger_count` mutates the stored alarm record in place and
/// stamps `updated_at`, so repeated `active_alarms` reads observe the
/// counter.
#[derive(Debug)]
pub struct MemoryStore {
    alarms: RefCell<Vec<Alarm>>,
    history: RefCell<Vec<TriggerEvent>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { alarms: RefCell::new(vec![]), history: RefCell::new(vec![]) }
    }

    /// Insert or replace one alarm record (matched by id).
    pub fn upsert(&self, alarm: Alarm) {
        let mut alarms = self.alarms.borrow_mut();
        match alarms.iter_mut().find(|a| a.id == alarm.id) {
            Some(existing) => *existing = alarm,
            None => alarms.push(alarm),
        }
    }

    /// Number of recorded trigger events.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.borrow().len()
    }

    /// Current trigger counter for `alarm_id`, if the alarm exists.
    #[must_use]
    pub fn trigger_count(&self, alarm_id: Uuid) -> Option<u32> {
        self.alarms.borrow().iter().find(|a| a.id == alarm_id).map(|a| a.trigger_count)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmStore for MemoryStore {
    /// Return clones of all alarms whose `active` flag is set.
    async fn active_alarms(&self) -> Result<Vec<Alarm>, StoreError> {
        Ok(self.alarms.borrow().iter().filter(|a| a.active).cloned().collect())
    }

    /// Append `event` to the in-memory history.
    async fn record_trigger(&self, event: &TriggerEvent) -> Result<(), StoreError> {
        self.history.borrow_mut().push(event.clone());
        Ok(())
    }

    /// Bump the alarm's counter and stamp `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when no alarm with `alarm_id`
    /// exists.
    async fn increment_trigger_count(&self, alarm_id: Uuid) -> Result<(), StoreError> {
        let mut alarms = self.alarms.borrow_mut();
        let alarm = alarms.iter_mut().find(|a| a.id == alarm_id).ok_or_else(|| {
            StoreError::Unavailable { reason: format!("unknown alarm {alarm_id}") }
        })?;
        alarm.trigger_count += 1;
        alarm.updated_at = Some(Utc::now());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
