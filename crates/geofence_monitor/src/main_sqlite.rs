// Rust guideline compliant 2026-08-27

//! Geofence-monitor entry point -- `SQLite` storage demo.
//!
//! Identical to the main `geofence_monitor` binary except that the alarm
//! store is backed by a `SQLite` file (`geofence_monitor.db` in the current
//! working directory) instead of in-memory vectors. This demonstrates that
//! the hexagonal `AlarmStore` port is truly swappable: only this entry
//! point and the adapter change; domain, tracker, and engine crates are
//! untouched.
//!
//! # Usage
//!
//! ```text
//! RUST_LOG=info cargo run --bin geofence_monitor_sqlite
//! ```
//!
//! The file `geofence_monitor.db` is created on first run. Each run inserts
//! a fresh demo alarm (new UUID), so trigger history accumulates across
//! runs. Inspect rows with any `SQLite` browser.

// Load each adapter directly so only the modules this binary uses enter its
// module tree, avoiding dead_code warnings in the sibling binary.
#[path = "adapters/log_actuator.rs"]
mod log_actuator;
#[path = "adapters/position_channel.rs"]
mod position_channel;
#[path = "adapters/sqlite_store.rs"]
mod sqlite_store;
#[path = "adapters/static_gate.rs"]
mod static_gate;

use anyhow::Context as _;
use domain::{Actuator as _, Alarm, PermissionStatus};
use engine::{EngineConfig, MonitorEngine};
use log_actuator::RingActuator;
use position_channel::PositionChannel;
use simulator::{Simulator, SimulatorConfig};
use sqlite_store::SqliteStore;
use static_gate::StaticGate;
use std::time::Duration;
use tracing::Instrument as _;

/// Galle Face Green, Colombo -- the demo geofence center.
const GEOFENCE: (f64, f64) = (6.9271, 79.8612);

/// Database file created in the current working directory on first run.
///
/// Using the current working directory is acceptable for a demo adapter.
/// A production adapter would read this from configuration or environment.
const DB_URL: &str = "sqlite:geofence_monitor.db";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize the tracing subscriber before any async work.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // -- Store: opens or creates geofence_monitor.db in the working directory --
    let store = SqliteStore::new(DB_URL)
        .await
        .context("failed to open SQLite store")?;
    let alarm = Alarm::builder("Galle Face Green", GEOFENCE.0, GEOFENCE.1)
        .radius_m(100.0)
        .ringtone_id("chimes")
        .volume(0.8)
        .build()
        .context("failed to build demo alarm")?;
    store.upsert(&alarm).await.context("failed to persist demo alarm")?;

    // -- Simulator: walk in from 500 m north, touch the center, walk out --
    let start = geo::offset_by_meters(GEOFENCE.0, GEOFENCE.1, 500.0, 0.0);
    let simulator_config = SimulatorConfig::builder(start, GEOFENCE)
        .steps(12)
        // 250 ms between fixes keeps logs readable in real time.
        .poll_interval(Duration::from_millis(250))
        .build()
        .context("failed to build simulator config")?;
    let channel = PositionChannel::new();
    let simulator = Simulator::new(simulator_config);

    // -- Engine: the gate prompts once and grants, as on a first app run --
    let engine = MonitorEngine::new(EngineConfig::builder().build());
    let actuator = RingActuator::new();
    let gate = StaticGate::undetermined_then(PermissionStatus::GrantedWhileInUse);

    // Finite mode: simulator.run completes -> close() -> engine drains -> join resolves.
    let pipeline = async {
        let (s, e) = tokio::join!(
            async {
                let r = simulator.run(&channel).await;
                // Close the channel so the engine exits cleanly after draining.
                channel.close();
                r
            }
            .instrument(tracing::info_span!("simulator")),
            engine
                .run(&channel, &store, &actuator, &gate)
                .instrument(tracing::info_span!("engine"))
        );
        s.context("simulator failed").and(e.context("engine failed"))
    };

    // Race the pipeline against CTRL+C.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("main.shutdown: ctrl_c received, closing channel");
            channel.close();
            engine.stop();
        }
        result = pipeline => {
            result?;
        }
    }

    let history_rows = store.history_len().await.context("failed to read history")?;
    tracing::info!("main.summary: history_rows={history_rows} (accumulates across runs)");
    actuator.stop().await.context("failed to silence actuator")?;

    Ok(())
}
