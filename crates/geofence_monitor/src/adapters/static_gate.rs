// Rust guideline compliant 2026-08-27

//! Demo adapter for the `PermissionGate` port.
//!
//! Plays back a scripted permission state instead of querying a platform.
//! The request counter makes the single-round-trip contract observable in
//! tests and demos.

use std::cell::Cell;

use domain::{PermissionGate, PermissionStatus};

/// `PermissionGate` adapter with a scripted status.
///
/// `status` returns the current scripted value; `request` transitions to the
/// configured post-request status and counts the round-trip.
#[derive(Debug)]
pub struct StaticGate {
    current: Cell<PermissionStatus>,
    after_request: PermissionStatus,
    requests: Cell<u32>,
}

impl StaticGate {
    /// Gate that reports `status` both before and after any request.
    #[must_use]
    pub fn with(status: PermissionStatus) -> Self {
        Self { current: Cell::new(status), after_request: status, requests: Cell::new(0) }
    }

    /// Undetermined gate whose prompt resolves to `after_request`.
    #[must_use]
    pub fn undetermined_then(after_request: PermissionStatus) -> Self {
        let gate = Self::with(after_request);
        gate.current.set(PermissionStatus::NotDetermined);
        gate
    }

    /// Number of prompt round-trips performed so far.
    ///
    /// Used in tests to assert the single-round-trip contract.
    #[cfg(test)]
    #[must_use]
    pub fn requests(&self) -> u32 {
        self.requests.get()
    }
}

impl PermissionGate for StaticGate {
    async fn status(&self) -> PermissionStatus {
        self.current.get()
    }

    async fn request(&self) -> PermissionStatus {
        self.requests.set(self.requests.get() + 1);
        self.current.set(self.after_request);
        self.after_request
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
