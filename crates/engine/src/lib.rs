// Rust guideline compliant 2026-08-24

//! MonitoringEngine -- consumes a position stream, evaluates every active
//! alarm's proximity, and drives the trigger pipeline.
//!
//! Entry points: [`MonitorEngine::start`], [`MonitorEngine::run`],
//! [`MonitorEngine::process_update`], [`check_and_request`]. Configuration
//! via [`EngineConfig::builder`].
//!
//! The engine is single-threaded cooperative: one update is fully processed
//! (alarm fetch -> per-alarm evaluation -> side effects) before the next is
//! accepted, so tracker mutations are never interleaved across two updates.

use domain::{
    Actuator, ActuatorError, Alarm, AlarmStore, PermissionGate, PermissionStatus, Position,
    PositionError, PositionSource, StoreError, TriggerEvent,
};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tracker::{Transition, TriggerTracker};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// EngineError + TriggerFailure
// ---------------------------------------------------------------------------

/// Hard errors from the engine lifecycle.
///
/// Everything inside the monitoring loop is soft (logged and skipped); the
/// only hard failure is failing to acquire permission at start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Location permission was not granted. Reported once; the caller must
    /// retry `start` explicitly after the user changes settings.
    #[error("location permission denied: {status:?}")]
    PermissionDenied {
        /// The final status observed after the optional request round-trip.
        status: PermissionStatus,
    },
}

/// A non-fatal side-effect failure collected during one trigger pipeline.
///
/// Failures are isolated per alarm: a failed history write or actuation
/// never stops evaluation of the remaining alarms in the same update.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TriggerFailure {
    /// Writing the history record or the trigger counter failed.
    #[error("history write failed for alarm {alarm_id}: {source}")]
    History {
        /// The alarm whose pipeline failed.
        alarm_id: Uuid,
        /// The underlying store error.
        source: StoreError,
    },
    /// The actuator could not start ringing.
    #[error("actuation failed for alarm {alarm_id}: {source}")]
    Actuation {
        /// The alarm whose pipeline failed.
        alarm_id: Uuid,
        /// The underlying actuator error.
        source: ActuatorError,
    },
}

// ---------------------------------------------------------------------------
// EngineConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`MonitorEngine`].
///
/// Construct via [`EngineConfig::builder`].
#[derive(Debug)]
pub struct EngineConfig {
    /// Delay before re-reading the stream after a transport error.
    pub retry_backoff: Duration,
    /// Optional upper bound on processed updates. `None` means run until the
    /// stream closes or `stop` is called.
    pub iterations: Option<u64>,
}

/// Builder for [`EngineConfig`].
///
/// Obtain via [`EngineConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct EngineConfigBuilder {
    retry_backoff: Duration,
    iterations: Option<u64>,
}

impl EngineConfig {
    /// Create a builder.
    ///
    /// Default values: `retry_backoff = 1 s`, `iterations = None`.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            // 1 s keeps a flapping transport from busy-looping the runtime.
            retry_backoff: Duration::from_secs(1),
            iterations: None,
        }
    }
}

impl EngineConfigBuilder {
    /// Override the transport-error backoff.
    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Set a finite update count. Without this the engine runs until the
    /// stream closes or `stop` is called.
    #[must_use]
    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = Some(n);
        self
    }

    /// Build the configuration. All fields have valid defaults.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        EngineConfig { retry_backoff: self.retry_backoff, iterations: self.iterations }
    }
}

// ---------------------------------------------------------------------------
// Permission flow
// ---------------------------------------------------------------------------

/// Resolve the live permission state, prompting the user at most once.
///
/// If the status is `NotDetermined`, performs exactly one `request`
/// round-trip and returns its result; any already-determined status
/// (including a plain `Denied`) is returned as-is without re-prompting.
/// Never caches: every call re-queries the gate so the answer stays in sync
/// with system settings.
pub async fn check_and_request<G: PermissionGate>(gate: &G) -> PermissionStatus {
    match gate.status().await {
        PermissionStatus::NotDetermined => {
            tracing::info!("permission.request: prompting user");
            gate.request().await
        }
        determined => determined,
    }
}

// ---------------------------------------------------------------------------
// UpdateSummary
// ---------------------------------------------------------------------------

/// Outcome of processing one position update.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    /// Number of active alarms evaluated against the fix.
    pub evaluated: usize,
    /// Alarms whose radius was entered by this fix (triggers fired).
    pub entered: Vec<Uuid>,
    /// Alarms whose radius was exited by this fix (re-armed silently).
    pub exited: Vec<Uuid>,
    /// Collected non-fatal side-effect failures.
    pub failures: Vec<TriggerFailure>,
}

// ---------------------------------------------------------------------------
// MonitorEngine
// ---------------------------------------------------------------------------

/// Owns the per-session trigger state and the monitoring lifecycle.
///
/// Generic over all port traits per call for zero-cost static dispatch.
/// Holds no concrete adapter references -- dependencies are injected at the
/// composition root. Interior mutability (`Cell`/`RefCell`) because all
/// public methods take `&self` on a `current_thread` runtime.
#[derive(Debug)]
pub struct MonitorEngine {
    config: EngineConfig,
    tracker: RefCell<TriggerTracker>,
    running: Cell<bool>,
    last_fix: RefCell<Option<Position>>,
}

impl MonitorEngine {
    /// Create a new engine from `config`. Not yet monitoring.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tracker: RefCell::new(TriggerTracker::new()),
            running: Cell::new(false),
            last_fix: RefCell::new(None),
        }
    }

    /// `true` while a monitoring session is active.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.running.get()
    }

    /// The most recent fix processed by this session, if any.
    #[must_use]
    pub fn last_known_position(&self) -> Option<Position> {
        self.last_fix.borrow().clone()
    }

    /// Begin a monitoring session after a live permission check.
    ///
    /// Calling `start` while already running is a logged no-op returning
    /// `Ok(())` -- repeat-start is a policy no-op, not an error, and
    /// `is_monitoring` stays true.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PermissionDenied`] when the final permission
    /// status after [`check_and_request`] is not granted; the engine stays
    /// stopped and no stream is consumed.
    pub async fn start<G: PermissionGate>(&self, gate: &G) -> Result<(), EngineError> {
        if self.running.get() {
            tracing::info!("engine.start.noop: already monitoring");
            return Ok(());
        }
        let status = check_and_request(gate).await;
        if !status.is_granted() {
            tracing::warn!("engine.start.denied: status={status:?}");
            return Err(EngineError::PermissionDenied { status });
        }
        self.running.set(true);
        tracing::info!("engine.start: monitoring session opened ({status:?})");
        Ok(())
    }

    /// End the monitoring session and clear all trigger state.
    ///
    /// Idempotent -- calling while not running is a no-op. After `stop`
    /// returns, the run loop processes no further updates (it re-checks the
    /// running flag before every evaluation).
    pub fn stop(&self) {
        if !self.running.get() {
            tracing::debug!("engine.stop.noop: not monitoring");
            return;
        }
        self.running.set(false);
        self.tracker.borrow_mut().reset_all();
        tracing::info!("engine.stop: monitoring session closed");
    }

    /// Re-arm one alarm after the user dismisses or snoozes it.
    ///
    /// The next fix inside the radius fires the alarm again.
    pub fn reset_triggered(&self, alarm_id: Uuid) {
        self.tracker.borrow_mut().reset(alarm_id);
        tracing::debug!("engine.reset_triggered: alarm_id={alarm_id}");
    }

    /// Re-arm every alarm.
    pub fn reset_all_triggered(&self) {
        self.tracker.borrow_mut().reset_all();
        tracing::debug!("engine.reset_all_triggered");
    }

    /// Drop tracker state for a deleted alarm.
    pub fn forget_alarm(&self, alarm_id: Uuid) {
        self.tracker.borrow_mut().remove(alarm_id);
    }

    /// One-shot position query, delegated to the source.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`PositionError`].
    pub async fn current_position<S: PositionSource>(
        &self,
        source: &S,
    ) -> Result<Position, PositionError> {
        source.current_position().await
    }

    /// Evaluate every active alarm against one fix and fire entered triggers.
    ///
    /// For each alarm read from `store`: compute the great-circle distance,
    /// feed it to the tracker, and on `EnteredRadius` run the trigger
    /// pipeline (history record, counter increment, actuation). Side-effect
    /// failures are collected in the returned [`UpdateSummary`], never
    /// propagated -- one alarm's failure must not starve the rest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the active-alarm read itself fails;
    /// in that case no transition is emitted for this update and the tracker
    /// is left untouched.
    pub async fn process_update<St, A>(
        &self,
        position: &Position,
        store: &St,
        actuator: &A,
    ) -> Result<UpdateSummary, StoreError>
    where
        St: AlarmStore,
        A: Actuator,
    {
        let alarms = store.active_alarms().await?;
        let mut summary = UpdateSummary { evaluated: alarms.len(), ..UpdateSummary::default() };

        for alarm in &alarms {
            let distance_m = geo::distance_meters(
                position.latitude,
                position.longitude,
                alarm.latitude,
                alarm.longitude,
            );
            let transition =
                self.tracker.borrow_mut().evaluate(alarm.id, distance_m, alarm.radius_m);
            match transition {
                Transition::EnteredRadius => {
                    tracing::info!(
                        "engine.trigger: alarm={} distance_m={distance_m:.1}",
                        alarm.name
                    );
                    summary.entered.push(alarm.id);
                    self.fire_trigger(alarm, position, store, actuator, &mut summary.failures)
                        .await;
                }
                Transition::ExitedRadius => {
                    tracing::debug!(
                        "engine.rearm: alarm={} distance_m={distance_m:.1}",
                        alarm.name
                    );
                    summary.exited.push(alarm.id);
                }
                Transition::None => {
                    tracing::trace!(
                        "engine.evaluate: alarm={} distance_m={distance_m:.1}",
                        alarm.name
                    );
                }
            }
        }

        *self.last_fix.borrow_mut() = Some(position.clone());
        Ok(summary)
    }

    /// Trigger pipeline for one entered alarm: record history, bump the
    /// counter, then actuate. Each step is best-effort; failures are pushed
    /// into `failures` and the remaining steps still run.
    async fn fire_trigger<St, A>(
        &self,
        alarm: &Alarm,
        position: &Position,
        store: &St,
        actuator: &A,
        failures: &mut Vec<TriggerFailure>,
    ) where
        St: AlarmStore,
        A: Actuator,
    {
        let event = TriggerEvent {
            alarm_id: alarm.id,
            alarm_name: alarm.name.clone(),
            latitude: position.latitude,
            longitude: position.longitude,
            at: position.timestamp,
        };
        if let Err(source) = store.record_trigger(&event).await {
            failures.push(TriggerFailure::History { alarm_id: alarm.id, source });
        }
        if let Err(source) = store.increment_trigger_count(alarm.id).await {
            failures.push(TriggerFailure::History { alarm_id: alarm.id, source });
        }
        if let Err(source) = actuator.trigger(alarm).await {
            failures.push(TriggerFailure::Actuation { alarm_id: alarm.id, source });
        }
    }

    /// Run the monitoring loop until the stream closes or `stop` is called.
    ///
    /// Calls [`start`](Self::start), then serially: next fix ->
    /// [`process_update`](Self::process_update). Per the error taxonomy:
    /// - stream `Closed` stops the session cleanly (returns `Ok(())`);
    /// - a transport error is logged and retried after `retry_backoff`;
    /// - a store read failure skips that update and waits for the next fix;
    /// - side-effect failures are logged per alarm and never abort the loop;
    /// - a fix that arrives after `stop` was requested is discarded unseen;
    /// - the optional `iterations` bound counts processed updates only
    ///   (skipped updates are excluded) and stops the session cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PermissionDenied`] from the start check; no
    /// stream read happens in that case.
    pub async fn run<S, St, A, G>(
        &self,
        source: &S,
        store: &St,
        actuator: &A,
        gate: &G,
    ) -> Result<(), EngineError>
    where
        S: PositionSource,
        St: AlarmStore,
        A: Actuator,
        G: PermissionGate,
    {
        self.start(gate).await?;

        let mut count = 0u64;
        loop {
            // stop() may have been called from a concurrently-polled future.
            if !self.running.get() {
                tracing::info!("engine.run.stopped: stop requested after {count} update(s)");
                return Ok(());
            }

            match source.next_position().await {
                Ok(position) => {
                    // stop() may have landed while this read was suspended;
                    // a fix delivered after stop() must not be evaluated.
                    if !self.running.get() {
                        tracing::info!(
                            "engine.run.stopped: stop requested mid-read, fix discarded"
                        );
                        return Ok(());
                    }
                    match self.process_update(&position, store, actuator).await {
                        Ok(summary) => {
                            for failure in &summary.failures {
                                tracing::warn!("engine.trigger.failed: {failure}");
                            }
                            count += 1;
                        }
                        Err(e) => {
                            // Skip this update entirely; recover on the next fix.
                            // Skipped updates do not count toward the bound.
                            tracing::warn!("engine.update.skipped: {e}");
                        }
                    }
                }
                Err(PositionError::Closed) => {
                    tracing::info!("engine.run.stopped: stream closed after {count} update(s)");
                    self.stop();
                    return Ok(());
                }
                Err(PositionError::Transport { reason }) => {
                    tracing::warn!("engine.stream.error: {reason}");
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
            }

            if let Some(max) = self.config.iterations
                && count >= max
            {
                tracing::info!("engine.run.stopped: update limit reached");
                self.stop();
                return Ok(());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{EngineConfig, EngineError, MonitorEngine, TriggerFailure, check_and_request};
    use chrono::Utc;
    use domain::{
        Actuator, ActuatorError, Alarm, AlarmStore, PermissionGate, PermissionStatus, Position,
        PositionError, PositionSource, StoreError, TriggerEvent,
    };
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use uuid::Uuid;

    const COLOMBO: (f64, f64) = (6.9271, 79.8612);

    // ------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------

    fn make_engine() -> MonitorEngine {
        MonitorEngine::new(
            EngineConfig::builder().retry_backoff(std::time::Duration::ZERO).build(),
        )
    }

    fn make_alarm(radius_m: f64) -> Alarm {
        Alarm::builder("Fort Station", COLOMBO.0, COLOMBO.1)
            .radius_m(radius_m)
            .build()
            .unwrap()
    }

    /// Fix at `north_m` meters due north of the reference alarm coordinate.
    fn fix_at(north_m: f64) -> Position {
        let (latitude, longitude) = geo::offset_by_meters(COLOMBO.0, COLOMBO.1, north_m, 0.0);
        Position { latitude, longitude, accuracy_m: 10.0, timestamp: Utc::now() }
    }

    // ------------------------------------------------------------------
    // Mock adapters
    // ------------------------------------------------------------------

    struct MockSource {
        fixes: RefCell<VecDeque<Position>>,
        reads: Cell<u32>,
    }

    impl MockSource {
        fn new(fixes: Vec<Position>) -> Self {
            Self { fixes: RefCell::new(VecDeque::from(fixes)), reads: Cell::new(0) }
        }
    }

    impl PositionSource for MockSource {
        async fn next_position(&self) -> Result<Position, PositionError> {
            self.reads.set(self.reads.get() + 1);
            self.fixes.borrow_mut().pop_front().ok_or(PositionError::Closed)
        }

        async fn current_position(&self) -> Result<Position, PositionError> {
            self.fixes.borrow().front().cloned().ok_or(PositionError::Transport {
                reason: "no fix available".to_owned(),
            })
        }
    }

    /// Source that blocks (cooperatively) until armed, then delivers one fix.
    struct GatedSource {
        fix: RefCell<Option<Position>>,
        armed: Cell<bool>,
    }

    impl GatedSource {
        fn holding(fix: Position) -> Self {
            Self { fix: RefCell::new(Some(fix)), armed: Cell::new(false) }
        }
    }

    impl PositionSource for GatedSource {
        async fn next_position(&self) -> Result<Position, PositionError> {
            loop {
                if self.armed.get() {
                    return self.fix.borrow_mut().take().ok_or(PositionError::Closed);
                }
                tokio::task::yield_now().await;
            }
        }

        async fn current_position(&self) -> Result<Position, PositionError> {
            self.fix.borrow().clone().ok_or(PositionError::Transport {
                reason: "no fix available".to_owned(),
            })
        }
    }

    struct MockStore {
        alarms: RefCell<Vec<Alarm>>,
        history: RefCell<Vec<TriggerEvent>>,
        counts: RefCell<Vec<Uuid>>,
        fail_reads: Cell<u32>,
        fail_history: bool,
    }

    impl MockStore {
        fn new(alarms: Vec<Alarm>) -> Self {
            Self {
                alarms: RefCell::new(alarms),
                history: RefCell::new(vec![]),
                counts: RefCell::new(vec![]),
                fail_reads: Cell::new(0),
                fail_history: false,
            }
        }

        /// Fail the next `n` `active_alarms` reads, then recover.
        fn failing_reads(alarms: Vec<Alarm>, n: u32) -> Self {
            let store = Self::new(alarms);
            store.fail_reads.set(n);
            store
        }

        fn failing_history(alarms: Vec<Alarm>) -> Self {
            Self { fail_history: true, ..Self::new(alarms) }
        }
    }

    impl AlarmStore for MockStore {
        async fn active_alarms(&self) -> Result<Vec<Alarm>, StoreError> {
            let remaining = self.fail_reads.get();
            if remaining > 0 {
                self.fail_reads.set(remaining - 1);
                return Err(StoreError::Unavailable { reason: "mock read failure".to_owned() });
            }
            Ok(self.alarms.borrow().iter().filter(|a| a.active).cloned().collect())
        }

        async fn record_trigger(&self, event: &TriggerEvent) -> Result<(), StoreError> {
            if self.fail_history {
                return Err(StoreError::Unavailable { reason: "mock write failure".to_owned() });
            }
            self.history.borrow_mut().push(event.clone());
            Ok(())
        }

        async fn increment_trigger_count(&self, alarm_id: Uuid) -> Result<(), StoreError> {
            if self.fail_history {
                return Err(StoreError::Unavailable { reason: "mock write failure".to_owned() });
            }
            self.counts.borrow_mut().push(alarm_id);
            Ok(())
        }
    }

    struct MockActuator {
        triggers: Cell<u32>,
        always_fail: bool,
    }

    impl MockActuator {
        fn new() -> Self {
            Self { triggers: Cell::new(0), always_fail: false }
        }

        fn always_failing() -> Self {
            Self { triggers: Cell::new(0), always_fail: true }
        }
    }

    impl Actuator for MockActuator {
        async fn trigger(&self, alarm: &Alarm) -> Result<(), ActuatorError> {
            self.triggers.set(self.triggers.get() + 1);
            if self.always_fail {
                return Err(ActuatorError::ActuationFailed {
                    reason: format!("mock fail for alarm {}", alarm.id),
                });
            }
            Ok(())
        }

        async fn stop(&self) -> Result<(), ActuatorError> {
            Ok(())
        }
    }

    struct MockGate {
        status: Cell<PermissionStatus>,
        after_request: PermissionStatus,
        requests: Cell<u32>,
    }

    impl MockGate {
        fn with(status: PermissionStatus) -> Self {
            Self { status: Cell::new(status), after_request: status, requests: Cell::new(0) }
        }

        fn granted() -> Self {
            Self::with(PermissionStatus::GrantedWhileInUse)
        }

        fn undetermined_then(after_request: PermissionStatus) -> Self {
            Self {
                status: Cell::new(PermissionStatus::NotDetermined),
                after_request,
                requests: Cell::new(0),
            }
        }
    }

    impl PermissionGate for MockGate {
        async fn status(&self) -> PermissionStatus {
            self.status.get()
        }

        async fn request(&self) -> PermissionStatus {
            self.requests.set(self.requests.get() + 1);
            self.status.set(self.after_request);
            self.after_request
        }
    }

    // ------------------------------------------------------------------
    // Permission flow
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn granted_status_skips_request() {
        let gate = MockGate::granted();
        let status = check_and_request(&gate).await;
        assert!(status.is_granted());
        assert_eq!(gate.requests.get(), 0, "no prompt when already granted");
    }

    #[tokio::test]
    async fn undetermined_requests_exactly_once() {
        let gate = MockGate::undetermined_then(PermissionStatus::GrantedAlways);
        let status = check_and_request(&gate).await;
        assert_eq!(status, PermissionStatus::GrantedAlways);
        assert_eq!(gate.requests.get(), 1, "exactly one request round-trip");
    }

    #[tokio::test]
    async fn plain_denied_is_not_re_requested() {
        let gate = MockGate::with(PermissionStatus::Denied);
        let status = check_and_request(&gate).await;
        assert_eq!(status, PermissionStatus::Denied);
        assert_eq!(gate.requests.get(), 0, "determined denial must not re-prompt");
    }

    #[tokio::test]
    async fn no_caching_across_calls() {
        // The gate is re-queried live: a settings change between calls is seen.
        let gate = MockGate::with(PermissionStatus::Denied);
        assert!(!check_and_request(&gate).await.is_granted());
        gate.status.set(PermissionStatus::GrantedAlways);
        assert!(check_and_request(&gate).await.is_granted());
    }

    // ------------------------------------------------------------------
    // Lifecycle: start / stop
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn start_with_granted_permission() {
        let engine = make_engine();
        engine.start(&MockGate::granted()).await.unwrap();
        assert!(engine.is_monitoring());
    }

    #[tokio::test]
    async fn start_denied_forever_fails_and_stays_stopped() {
        let engine = make_engine();
        let result = engine.start(&MockGate::with(PermissionStatus::DeniedForever)).await;
        assert_eq!(
            result,
            Err(EngineError::PermissionDenied { status: PermissionStatus::DeniedForever })
        );
        assert!(!engine.is_monitoring());
    }

    #[tokio::test]
    async fn undetermined_then_denied_fails() {
        let engine = make_engine();
        let gate = MockGate::undetermined_then(PermissionStatus::Denied);
        let result = engine.start(&gate).await;
        assert!(matches!(result, Err(EngineError::PermissionDenied { .. })));
        assert_eq!(gate.requests.get(), 1);
    }

    #[tokio::test]
    async fn double_start_is_a_noop() {
        let engine = make_engine();
        let gate = MockGate::granted();
        engine.start(&gate).await.unwrap();
        // Second start: no error, no second permission check, still monitoring.
        engine.start(&gate).await.unwrap();
        assert!(engine.is_monitoring());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let engine = make_engine();
        engine.stop(); // not running: no-op, no panic
        engine.start(&MockGate::granted()).await.unwrap();
        engine.stop();
        engine.stop();
        assert!(!engine.is_monitoring());
    }

    #[tokio::test]
    async fn stop_clears_trigger_state() {
        let engine = make_engine();
        let alarm = make_alarm(100.0);
        let store = MockStore::new(vec![alarm]);
        let actuator = MockActuator::new();

        engine.start(&MockGate::granted()).await.unwrap();
        let summary = engine.process_update(&fix_at(30.0), &store, &actuator).await.unwrap();
        assert_eq!(summary.entered.len(), 1);

        engine.stop();
        engine.start(&MockGate::granted()).await.unwrap();

        // Same inside fix after a fresh session: state was cleared, fires again.
        let summary = engine.process_update(&fix_at(30.0), &store, &actuator).await.unwrap();
        assert_eq!(summary.entered.len(), 1, "fresh session must re-fire");
    }

    // ------------------------------------------------------------------
    // Evaluation semantics
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn approach_fires_exactly_once() {
        let engine = make_engine();
        let store = MockStore::new(vec![make_alarm(100.0)]);
        let actuator = MockActuator::new();

        for north_m in [500.0, 150.0, 80.0, 30.0] {
            engine.process_update(&fix_at(north_m), &store, &actuator).await.unwrap();
        }
        assert_eq!(actuator.triggers.get(), 1, "dwell inside must not re-fire");
        assert_eq!(store.history.borrow().len(), 1);
        assert_eq!(store.counts.borrow().len(), 1);
    }

    #[tokio::test]
    async fn colombo_scenario_transitions() {
        let engine = make_engine();
        let alarm = make_alarm(100.0);
        let id = alarm.id;
        let store = MockStore::new(vec![alarm]);
        let actuator = MockActuator::new();

        let mut entered = vec![];
        let mut exited = vec![];
        for north_m in [500.0, 150.0, 80.0, 30.0, 120.0, 40.0] {
            let summary = engine.process_update(&fix_at(north_m), &store, &actuator).await.unwrap();
            entered.push(summary.entered.contains(&id));
            exited.push(summary.exited.contains(&id));
        }
        assert_eq!(entered, [false, false, true, false, false, true]);
        assert_eq!(exited, [false, false, false, false, true, false]);
        assert_eq!(actuator.triggers.get(), 2, "one fire per entry edge");
    }

    #[tokio::test]
    async fn exit_is_silent_side_effect_free() {
        let engine = make_engine();
        let store = MockStore::new(vec![make_alarm(100.0)]);
        let actuator = MockActuator::new();

        engine.process_update(&fix_at(30.0), &store, &actuator).await.unwrap();
        let summary = engine.process_update(&fix_at(300.0), &store, &actuator).await.unwrap();

        assert_eq!(summary.exited.len(), 1);
        assert_eq!(actuator.triggers.get(), 1, "exit must not actuate");
        assert_eq!(store.history.borrow().len(), 1, "exit must not record history");
    }

    #[tokio::test]
    async fn reset_triggered_rearms_inside_alarm() {
        let engine = make_engine();
        let alarm = make_alarm(100.0);
        let id = alarm.id;
        let store = MockStore::new(vec![alarm]);
        let actuator = MockActuator::new();

        engine.process_update(&fix_at(30.0), &store, &actuator).await.unwrap();
        engine.reset_triggered(id);

        let summary = engine.process_update(&fix_at(30.0), &store, &actuator).await.unwrap();
        assert_eq!(summary.entered, vec![id], "re-armed alarm must fire at the same fix");
        assert_eq!(actuator.triggers.get(), 2);
    }

    #[tokio::test]
    async fn inactive_alarms_are_not_evaluated() {
        let engine = make_engine();
        let inactive = Alarm::builder("Off", COLOMBO.0, COLOMBO.1)
            .radius_m(100.0)
            .inactive()
            .build()
            .unwrap();
        let store = MockStore::new(vec![inactive]);
        let actuator = MockActuator::new();

        let summary = engine.process_update(&fix_at(10.0), &store, &actuator).await.unwrap();
        assert_eq!(summary.evaluated, 0);
        assert_eq!(actuator.triggers.get(), 0);
    }

    #[tokio::test]
    async fn last_known_position_tracks_updates() {
        let engine = make_engine();
        let store = MockStore::new(vec![]);
        let actuator = MockActuator::new();

        assert!(engine.last_known_position().is_none());
        let fix = fix_at(250.0);
        engine.process_update(&fix, &store, &actuator).await.unwrap();
        assert_eq!(engine.last_known_position(), Some(fix));
    }

    // ------------------------------------------------------------------
    // Failure isolation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn store_read_failure_aborts_update_without_transitions() {
        let engine = make_engine();
        let store = MockStore::failing_reads(vec![make_alarm(100.0)], 1);
        let actuator = MockActuator::new();

        let result = engine.process_update(&fix_at(30.0), &store, &actuator).await;
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
        assert_eq!(actuator.triggers.get(), 0, "no side effect on aborted update");

        // Next update recovers and fires normally.
        let summary = engine.process_update(&fix_at(30.0), &store, &actuator).await.unwrap();
        assert_eq!(summary.entered.len(), 1);
        assert_eq!(actuator.triggers.get(), 1);
    }

    #[tokio::test]
    async fn actuator_failure_does_not_starve_other_alarms() {
        let engine = make_engine();
        let a = make_alarm(100.0);
        let b = make_alarm(200.0);
        let store = MockStore::new(vec![a, b]);
        let actuator = MockActuator::always_failing();

        let summary = engine.process_update(&fix_at(30.0), &store, &actuator).await.unwrap();
        assert_eq!(summary.entered.len(), 2, "both alarms inside must fire");
        assert_eq!(actuator.triggers.get(), 2, "both actuations attempted");
        assert_eq!(summary.failures.len(), 2);
        assert!(summary
            .failures
            .iter()
            .all(|f| matches!(f, TriggerFailure::Actuation { .. })));
        // History was still written for both despite actuator failures.
        assert_eq!(store.history.borrow().len(), 2);
    }

    #[tokio::test]
    async fn history_failure_still_actuates() {
        let engine = make_engine();
        let store = MockStore::failing_history(vec![make_alarm(100.0)]);
        let actuator = MockActuator::new();

        let summary = engine.process_update(&fix_at(30.0), &store, &actuator).await.unwrap();
        assert_eq!(actuator.triggers.get(), 1, "ringing must not depend on history");
        // record_trigger and increment_trigger_count both failed.
        assert_eq!(summary.failures.len(), 2);
        assert!(summary
            .failures
            .iter()
            .all(|f| matches!(f, TriggerFailure::History { .. })));
    }

    // ------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn run_processes_stream_until_closed() {
        let engine = make_engine();
        let source = MockSource::new(vec![
            fix_at(500.0),
            fix_at(150.0),
            fix_at(80.0),
            fix_at(30.0),
            fix_at(120.0),
            fix_at(40.0),
        ]);
        let store = MockStore::new(vec![make_alarm(100.0)]);
        let actuator = MockActuator::new();

        engine.run(&source, &store, &actuator, &MockGate::granted()).await.unwrap();

        assert_eq!(actuator.triggers.get(), 2, "entered at 80 and again at 40");
        assert!(!engine.is_monitoring(), "closed stream ends the session");
    }

    #[tokio::test]
    async fn run_denied_reads_nothing() {
        let engine = make_engine();
        let source = MockSource::new(vec![fix_at(30.0)]);
        let store = MockStore::new(vec![make_alarm(100.0)]);
        let actuator = MockActuator::new();
        let gate = MockGate::with(PermissionStatus::DeniedForever);

        let result = engine.run(&source, &store, &actuator, &gate).await;
        assert!(matches!(result, Err(EngineError::PermissionDenied { .. })));
        assert_eq!(source.reads.get(), 0, "no subscription on denied permission");
        assert!(!engine.is_monitoring());
    }

    #[tokio::test]
    async fn run_recovers_from_store_failure_mid_stream() {
        let engine = make_engine();
        let source = MockSource::new(vec![fix_at(30.0), fix_at(30.0)]);
        // First read fails; the second update evaluates normally.
        let store = MockStore::failing_reads(vec![make_alarm(100.0)], 1);
        let actuator = MockActuator::new();

        engine.run(&source, &store, &actuator, &MockGate::granted()).await.unwrap();
        assert_eq!(actuator.triggers.get(), 1, "second update must fire");
    }

    #[tokio::test]
    async fn stop_discards_fix_delivered_mid_read() {
        let engine = make_engine();
        // The source holds an inside fix but releases it only after stop().
        let source = GatedSource::holding(fix_at(30.0));
        let store = MockStore::new(vec![make_alarm(100.0)]);
        let actuator = MockActuator::new();

        let gate = MockGate::granted();
        let (run_result, ()) = tokio::join!(
            engine.run(&source, &store, &actuator, &gate),
            async {
                // Let the run loop suspend in next_position first.
                tokio::task::yield_now().await;
                engine.stop();
                source.armed.set(true);
            }
        );
        run_result.unwrap();

        assert_eq!(actuator.triggers.get(), 0, "fix after stop() must not actuate");
        assert!(store.history.borrow().is_empty(), "fix after stop() must not record");
        assert!(!engine.is_monitoring());
    }

    #[tokio::test]
    async fn skipped_update_does_not_consume_iteration() {
        let engine = MonitorEngine::new(
            EngineConfig::builder()
                .retry_backoff(std::time::Duration::ZERO)
                .iterations(1)
                .build(),
        );
        let source = MockSource::new(vec![fix_at(30.0), fix_at(30.0)]);
        // First read fails and is skipped; only the second counts.
        let store = MockStore::failing_reads(vec![make_alarm(100.0)], 1);
        let actuator = MockActuator::new();

        engine.run(&source, &store, &actuator, &MockGate::granted()).await.unwrap();

        assert_eq!(source.reads.get(), 2, "the skipped update must not consume the bound");
        assert_eq!(actuator.triggers.get(), 1, "the second fix is still evaluated");
    }

    #[tokio::test]
    async fn run_honors_iteration_limit() {
        let engine = MonitorEngine::new(EngineConfig::builder().iterations(2).build());
        let source = MockSource::new(vec![fix_at(500.0); 10]);
        let store = MockStore::new(vec![]);
        let actuator = MockActuator::new();

        engine.run(&source, &store, &actuator, &MockGate::granted()).await.unwrap();
        assert_eq!(source.reads.get(), 2);
        assert!(!engine.is_monitoring());
    }

    #[tokio::test]
    async fn current_position_delegates_to_source() {
        let engine = make_engine();
        let fix = fix_at(42.0);
        let source = MockSource::new(vec![fix.clone()]);
        let got = engine.current_position(&source).await.unwrap();
        assert_eq!(got, fix);
    }
}
