// Rust guideline compliant 2026-08-27

//! Geofence-monitor entry point -- in-memory demo.
//!
//! Wires the monitoring engine to its adapters (position channel, in-memory
//! store, log actuator, static permission gate) and replays a simulated
//! walk that approaches a geofenced landmark, dwells inside, and leaves.
//! The alarm fires once on entry and re-arms on exit.
//!
//! # Usage
//!
//! ```text
//! RUST_LOG=info cargo run --bin geofence_monitor
//!
//! # Also show per-fix evaluation output
//! RUST_LOG=debug cargo run --bin geofence_monitor
//! ```

mod adapters;

use adapters::log_actuator::RingActuator;
use adapters::memory_store::MemoryStore;
use adapters::position_channel::PositionChannel;
use adapters::static_gate::StaticGate;
use anyhow::Context as _;
use domain::{Actuator as _, Alarm, PermissionStatus};
use engine::{EngineConfig, MonitorEngine};
use simulator::{Simulator, SimulatorConfig};
use std::time::Duration;
use tracing::Instrument as _;

/// Galle Face Green, Colombo -- the demo geofence center.
const GEOFENCE: (f64, f64) = (6.9271, 79.8612);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize the tracing subscriber before any async work.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // -- Store: one active demo alarm around the landmark --
    let store = MemoryStore::new();
    let alarm = Alarm::builder("Galle Face Green", GEOFENCE.0, GEOFENCE.1)
        .radius_m(100.0)
        .ringtone_id("chimes")
        .volume(0.8)
        .build()
        .context("failed to build demo alarm")?;
    let alarm_id = alarm.id;
    store.upsert(alarm);

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

    // -- Engine: first run, so the gate prompts once and grants --
    let engine = MonitorEngine::new(EngineConfig::builder().build());
    let actuator = RingActuator::new();
    let gate = StaticGate::undetermined_then(PermissionStatus::GrantedWhileInUse);

    // Finite mode: simulator.run completes -> close() -> engine drains -> join resolves.
    let pipeline = async {
        // tokio::join! polls both futures concurrently and returns the tuple directly.
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

    // The walk crosses the boundary twice: once inbound, once on the return.
    tracing::info!(
        "main.summary: triggers={:?} history_rows={}",
        store.trigger_count(alarm_id),
        store.history_len()
    );
    actuator.stop().await.context("failed to silence actuator")?;

    Ok(())
}
