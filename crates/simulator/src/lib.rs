// Rust guideline compliant 2026-08-24

//! Simulator component -- generates a synthetic GPS track and publishes it
//! to a `PositionSink` hexagonal port.
//!
//! Entry points: [`Simulator::generate_track`], [`Simulator::run`].
//! Configuration via [`SimulatorConfig::builder`]. Stands in for a real
//! device's location plugin in demos and integration tests.

use chrono::Utc;
use domain::{Position, PositionError, PositionSink};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::cell::RefCell;
use std::time::Duration;

// ---------------------------------------------------------------------------
// SimulatorError
// ---------------------------------------------------------------------------

/// Errors that can occur while simulating a position stream.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// The supplied configuration is invalid.
    #[error("invalid simulator configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A sink publish failed.
    #[error("position sink error: {source}")]
    Sink {
        /// The underlying stream error.
        #[from]
        source: PositionError,
    },
}

// ---------------------------------------------------------------------------
// SimulatorConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`Simulator`].
///
/// Construct via [`SimulatorConfig::builder`].
#[derive(Debug)]
pub struct SimulatorConfig {
    /// Track origin as `(latitude, longitude)`.
    pub start: (f64, f64),
    /// Track turnaround point as `(latitude, longitude)`.
    pub target: (f64, f64),
    /// Interpolation steps per leg; the full track has `2 * steps + 1` fixes.
    pub steps: usize,
    /// Delay between successive published fixes.
    pub poll_interval: Duration,
    /// Uniform GPS jitter bound in meters, applied per axis.
    pub jitter_m: f64,
    /// Optional RNG seed for reproducible tracks. `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Builder for [`SimulatorConfig`].
///
/// Obtain via [`SimulatorConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct SimulatorConfigBuilder {
    start: (f64, f64),
    target: (f64, f64),
    steps: usize,
    poll_interval: Duration,
    jitter_m: f64,
    seed: Option<u64>,
}

impl SimulatorConfig {
    /// Create a builder. Start and target coordinates are required.
    ///
    /// Default values: `steps = 20`, `poll_interval = 100 ms`,
    /// `jitter_m = 5.0`, `seed = None`.
    #[must_use]
    pub fn builder(start: (f64, f64), target: (f64, f64)) -> SimulatorConfigBuilder {
        SimulatorConfigBuilder {
            start,
            target,
            steps: 20,
            // 100 ms chosen as a reasonable demo cadence; lower for tests.
            poll_interval: Duration::from_millis(100),
            jitter_m: 5.0,
            seed: None,
        }
    }
}

impl SimulatorConfigBuilder {
    /// Override the number of interpolation steps per leg.
    #[must_use]
    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Override the inter-fix delay.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Override the per-axis jitter bound in meters. Zero disables jitter.
    #[must_use]
    pub fn jitter_m(mut self, jitter_m: f64) -> Self {
        self.jitter_m = jitter_m;
        self
    }

    /// Fix the RNG seed for deterministic tracks (useful in tests).
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::InvalidConfig`] when `steps` is zero or
    /// `jitter_m` is negative.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<SimulatorConfig, SimulatorError> {
        if self.steps == 0 {
            return Err(SimulatorError::InvalidConfig {
                reason: "steps must be >= 1".to_owned(),
            });
        }
        if self.jitter_m < 0.0 {
            return Err(SimulatorError::InvalidConfig {
                reason: "jitter_m must be >= 0".to_owned(),
            });
        }
        Ok(SimulatorConfig {
            start: self.start,
            target: self.target,
            steps: self.steps,
            poll_interval: self.poll_interval,
            jitter_m: self.jitter_m,
            seed: self.seed,
        })
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Generates an out-and-back GPS track and forwards it to a
/// [`PositionSink`] port.
///
/// Generic over `S: PositionSink` for zero-cost static dispatch. Holds no
/// concrete sink reference -- the dependency is injected per call.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    /// Interior mutability required because all public methods take `&self`.
    rng: RefCell<StdRng>,
}

impl Simulator {
    /// Create a new simulator from `config`.
    ///
    /// Seeds the RNG from `config.seed` if set, otherwise from the OS.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng: RefCell::new(rng) }
    }

    /// Generate the full track: `steps` fixes from start to target, then
    /// `steps` fixes back, `2 * steps + 1` fixes in total.
    ///
    /// Each fix is displaced by uniform jitter within `±jitter_m` on both
    /// axes and carries an accuracy figure in `[5, 25]` meters.
    #[must_use]
    pub fn generate_track(&self) -> Vec<Position> {
        let mut rng = self.rng.borrow_mut();
        let steps = self.config.steps;
        let (start, target) = (self.config.start, self.config.target);

        let mut track = Vec::with_capacity(2 * steps + 1);
        let mut push_fix = |lat: f64, lon: f64, rng: &mut StdRng| {
            let (lat, lon) = if self.config.jitter_m > 0.0 {
                let north = rng.random_range(-self.config.jitter_m..=self.config.jitter_m);
                let east = rng.random_range(-self.config.jitter_m..=self.config.jitter_m);
                geo::offset_by_meters(lat, lon, north, east)
            } else {
                (lat, lon)
            };
            track.push(Position {
                latitude: lat,
                longitude: lon,
                accuracy_m: rng.random_range(5.0..=25.0),
                timestamp: Utc::now(),
            });
        };

        // Outbound leg: i/steps interpolation, start inclusive.
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let lat = start.0 + (target.0 - start.0) * t;
            let lon = start.1 + (target.1 - start.1) * t;
            push_fix(lat, lon, &mut rng);
        }
        // Return leg: target exclusive (already emitted), start inclusive.
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            let lat = target.0 + (start.0 - target.0) * t;
            let lon = target.1 + (start.1 - target.1) * t;
            push_fix(lat, lon, &mut rng);
        }
        track
    }

    /// Publish the generated track to `sink` on the configured cadence.
    ///
    /// Stops cleanly when the sink signals [`PositionError::Closed`]
    /// (returns `Ok(())`) or when the track is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Sink`] for any sink error other than `Closed`.
    pub async fn run<S: PositionSink>(&self, sink: &S) -> Result<(), SimulatorError> {
        let track = self.generate_track();
        let total = track.len();
        for (i, fix) in track.into_iter().enumerate() {
            match sink.publish(fix).await {
                Ok(()) => {}
                Err(PositionError::Closed) => {
                    tracing::info!("simulator.run.stopped: sink closed after {i} fix(es)");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
            tracing::debug!("simulator.fix.published: {}/{total}", i + 1);
            tokio::time::sleep(self.config.poll_interval).await;
        }
        tracing::info!("simulator.run.stopped: track exhausted ({total} fixes)");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
