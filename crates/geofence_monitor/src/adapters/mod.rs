// Rust guideline compliant 2026-08-27

//! Adapters (secondary ports) for the geofence-monitor binaries.
//!
//! Each sub-module implements one or more hexagonal port traits defined in
//! the `domain` crate. Adapters are intentionally isolated from engine and
//! tracker logic.

pub mod log_actuator;
pub mod memory_store;
pub mod position_channel;
pub mod static_gate;
