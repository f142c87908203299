// Rust guideline compliant 2026-08-21

//! Shared domain types for the geofence monitoring engine.
//!
//! Defines `Alarm`, `Position`, `TriggerEvent`, `PermissionStatus`, and the
//! hexagonal port traits: `PositionSink`, `PositionSource`, `AlarmStore`,
//! `Actuator`, and `PermissionGate`. All workspace crates depend on this
//! crate; no other workspace crate is imported here.

use chrono::{DateTime, Utc};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Alarm
// ---------------------------------------------------------------------------

/// Longest alarm name accepted, in characters.
const NAME_MAX_CHARS: usize = 50;
/// Trigger radius bounds in meters.
const RADIUS_MIN_M: f64 = 50.0;
const RADIUS_MAX_M: f64 = 10_000.0;

/// A named geofence: a coordinate plus a trigger radius.
///
/// Construct via [`Alarm::builder`], which validates every field. Equality
/// and hashing are by `id` alone -- two records with the same id compare
/// equal even when their coordinates differ.
#[derive(Debug, Clone)]
pub struct Alarm {
    /// Unique identifier; the sole basis for equality.
    pub id: Uuid,
    /// Display name, non-empty after trimming, at most 50 characters.
    pub name: String,
    /// WGS84 latitude in `[-90, 90]`.
    pub latitude: f64,
    /// WGS84 longitude in `[-180, 180]`.
    pub longitude: f64,
    /// Trigger radius in meters, `[50, 10_000]`.
    pub radius_m: f64,
    /// Identifier of the ringtone the actuator should play.
    pub ringtone_id: String,
    /// Playback volume, clamped to `[0.0, 1.0]` at construction.
    pub volume: f64,
    /// Whether the engine evaluates this alarm on position updates.
    pub active: bool,
    /// Creation timestamp, set by the builder.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp, `None` until first modified.
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of times this alarm has fired, non-negative.
    pub trigger_count: u32,
}

impl PartialEq for Alarm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Alarm {}

impl std::hash::Hash for Alarm {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Builder for [`Alarm`].
///
/// Obtain via [`Alarm::builder`]; finalize with [`build`](Self::build).
/// Coordinates and radius are validated in `build` -- out-of-range values
/// fail construction, they are never silently clamped. Volume is the single
/// documented exception: it is clamped to `[0.0, 1.0]`.
#[derive(Debug)]
pub struct AlarmBuilder {
    name: String,
    latitude: f64,
    longitude: f64,
    radius_m: f64,
    ringtone_id: String,
    volume: f64,
    active: bool,
}

impl Alarm {
    /// Create a builder. Name and coordinates are the required parameters.
    ///
    /// Default values: `radius_m = 100`, `ringtone_id = "default"`,
    /// `volume = 1.0`, `active = true`.
    #[must_use]
    pub fn builder(name: impl Into<String>, latitude: f64, longitude: f64) -> AlarmBuilder {
        AlarmBuilder {
            name: name.into(),
            latitude,
            longitude,
            // 100 m is a comfortable default for a walking-scale geofence.
            radius_m: 100.0,
            ringtone_id: "default".to_owned(),
            volume: 1.0,
            active: true,
        }
    }
}

impl AlarmBuilder {
    /// Override the trigger radius in meters.
    #[must_use]
    pub fn radius_m(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// Override the ringtone identifier.
    #[must_use]
    pub fn ringtone_id(mut self, ringtone_id: impl Into<String>) -> Self {
        self.ringtone_id = ringtone_id.into();
        self
    }

    /// Set the playback volume. Clamped to `[0.0, 1.0]` in `build`.
    #[must_use]
    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    /// Mark the alarm inactive (excluded from evaluation).
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Validate and build the alarm.
    ///
    /// Assigns a fresh v4 UUID and stamps `created_at` with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AlarmError`] when the name is empty or longer than 50
    /// characters, a coordinate is outside its WGS84 range, or the radius is
    /// outside `[50, 10_000]` meters.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<Alarm, AlarmError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(AlarmError::EmptyName);
        }
        if name.chars().count() > NAME_MAX_CHARS {
            return Err(AlarmError::NameTooLong { max: NAME_MAX_CHARS });
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AlarmError::InvalidLatitude { value: self.latitude });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AlarmError::InvalidLongitude { value: self.longitude });
        }
        if !(RADIUS_MIN_M..=RADIUS_MAX_M).contains(&self.radius_m) {
            return Err(AlarmError::InvalidRadius { value: self.radius_m });
        }
        Ok(Alarm {
            id: Uuid::new_v4(),
            name,
            latitude: self.latitude,
            longitude: self.longitude,
            radius_m: self.radius_m,
            ringtone_id: self.ringtone_id,
            // Volume is clamped by contract, never rejected.
            volume: self.volume.clamp(0.0, 1.0),
            active: self.active,
            created_at: Utc::now(),
            updated_at: None,
            trigger_count: 0,
        })
    }
}

/// Validation errors from [`AlarmBuilder::build`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlarmError {
    /// Name is empty after trimming whitespace.
    #[error("alarm name must not be empty")]
    EmptyName,
    /// Name exceeds the maximum length.
    #[error("alarm name exceeds {max} characters")]
    NameTooLong { max: usize },
    /// Latitude outside `[-90, 90]`.
    #[error("latitude {value} outside [-90, 90]")]
    InvalidLatitude { value: f64 },
    /// Longitude outside `[-180, 180]`.
    #[error("longitude {value} outside [-180, 180]")]
    InvalidLongitude { value: f64 },
    /// Radius outside `[50, 10_000]` meters.
    #[error("radius {value} m outside [50, 10000]")]
    InvalidRadius { value: f64 },
}

// ---------------------------------------------------------------------------
// Position + TriggerEvent
// ---------------------------------------------------------------------------

/// A single GPS fix delivered by a position source.
///
/// Produced externally; the engine never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Estimated horizontal accuracy in meters.
    pub accuracy_m: f64,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

/// History record written when an alarm fires.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    /// The alarm that fired.
    pub alarm_id: Uuid,
    /// Alarm name at trigger time (denormalized for history display).
    pub alarm_name: String,
    /// Latitude of the fix that caused the trigger.
    pub latitude: f64,
    /// Longitude of the fix that caused the trigger.
    pub longitude: f64,
    /// When the trigger fired.
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PermissionStatus
// ---------------------------------------------------------------------------

/// Live location-permission state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// The user has not been asked yet; a request round-trip is allowed.
    NotDetermined,
    /// Denied, but the platform may allow asking again.
    Denied,
    /// Denied permanently; only the system settings screen can change it.
    DeniedForever,
    /// Granted while the app is in use.
    GrantedWhileInUse,
    /// Granted including background use.
    GrantedAlways,
}

impl PermissionStatus {
    /// `true` for either granted variant.
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::GrantedWhileInUse | Self::GrantedAlways)
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Errors from the position-stream ports.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    /// The stream has ended; no further fixes will be delivered.
    #[error("position stream closed")]
    Closed,
    /// A transient transport failure. Monitoring logs and continues.
    #[error("position transport error: {reason}")]
    Transport {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from the `AlarmStore` port.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The store could not serve the request.
    #[error("alarm store unavailable: {reason}")]
    Unavailable {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from the `Actuator` port.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActuatorError {
    /// Ringtone or vibration playback failed. Partial success (vibration
    /// without audio) is reported by adapters as `Ok`.
    #[error("actuation failed: {reason}")]
    ActuationFailed {
        /// Human-readable description.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Hexagonal ports
// ---------------------------------------------------------------------------

/// Hexagonal port: the write side of a position stream.
///
/// Implemented by stream adapters in the binary crate; the simulator depends
/// exclusively on this trait -- never on a concrete adapter.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait PositionSink {
    /// Publish one fix into the stream.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Closed`] when the stream has been shut down.
    async fn publish(&self, position: Position) -> Result<(), PositionError>;
}

/// Hexagonal port: the read side of a position stream.
///
/// The engine depends exclusively on this trait. Implementations signal
/// end-of-stream via [`PositionError::Closed`].
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait PositionSource {
    /// Wait for and return the next fix.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Closed`] when the stream has ended, or
    /// [`PositionError::Transport`] on a transient failure.
    async fn next_position(&self) -> Result<Position, PositionError>;

    /// Return the current position without waiting for the stream.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::Transport`] when no fix is available.
    async fn current_position(&self) -> Result<Position, PositionError>;
}

/// Hexagonal port: alarm persistence and trigger history.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait AlarmStore {
    /// Return all alarms whose `active` flag is set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store cannot be read.
    async fn active_alarms(&self) -> Result<Vec<Alarm>, StoreError>;

    /// Append one trigger event to the history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the write fails.
    async fn record_trigger(&self, event: &TriggerEvent) -> Result<(), StoreError>;

    /// Increment the alarm's trigger counter and stamp `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the write fails.
    async fn increment_trigger_count(&self, alarm_id: Uuid) -> Result<(), StoreError>;
}

/// Hexagonal port: sound and vibration playback.
///
/// `trigger` must be idempotent against an already-ringing actuator: a
/// second call while ringing is a no-op, not an error.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait Actuator {
    /// Start ringing and vibrating for `alarm`.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::ActuationFailed`] when neither sound nor
    /// vibration could be started.
    async fn trigger(&self, alarm: &Alarm) -> Result<(), ActuatorError>;

    /// Stop any active ringing. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::ActuationFailed`] when teardown fails.
    async fn stop(&self) -> Result<(), ActuatorError>;
}

/// Hexagonal port: the platform's location-permission state.
///
/// Both methods re-query live platform state on every call -- no caching of
/// prior decisions, so the answer stays in sync with system settings.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait PermissionGate {
    /// Read the current permission status.
    async fn status(&self) -> PermissionStatus;

    /// Show the platform permission prompt and return the resulting status.
    ///
    /// Single round-trip; callers must not retry automatically.
    async fn request(&self) -> PermissionStatus;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
