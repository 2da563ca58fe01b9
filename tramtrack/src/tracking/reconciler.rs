//! Position Reconciler - turns validated fixes into one smooth transform.
//!
//! The reconciler owns the tracked state (the last two accepted points), the
//! rendered transform and the single in-flight transition handle. It is the
//! only writer of the transform and the only party allowed to cancel a
//! transition.
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ──first valid fix──▶ Tracking ◀──completion── Transitioning
//!                                       │  ▲                        ▲
//!                                       │  └──────fresh fix─────┐   │
//!                                       ├──stale fix──▶ Stale ──┘   │
//!                                       ├──changed fix──────────────┘
//!                                       └──connection lost──▶ Disconnected
//! ```
//!
//! Staleness is evaluated per update; there is no background clock. A long
//! outage leaves the tram frozen at its last known place.
//!
//! # Example
//!
//! ```ignore
//! let mut reconciler = PositionReconciler::new(ReconcilerConfig::default());
//! let outcome = reconciler.handle_update(&update, Instant::now());
//! reconciler.tick(Instant::now());
//! let transform = reconciler.transform_at(Instant::now());
//! ```

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use super::error::InvalidDataError;
use super::fallback::FallbackRoute;
use super::landmarks::{Landmark, LandmarkIndex};
use super::projection::{heading_between, shortest_rotation, Projection, ScenePosition, Transform};
use super::state::{
    duration_millis, GeoPoint, LatLng, LocationUpdate, ReconcilerPhase, ReconcilerStatus, RunState,
    TrackerSnapshot, TrackingMode, TramStatus,
};
use super::transition::{Animator, LinearAnimator, TransitionHandle, TransitionPlan};
use super::validator::{age_of, UpdateValidator};

/// Minimum interval between staleness log lines.
pub const STALE_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Default minimum displacement (scene units) worth animating.
pub const DEFAULT_MIN_MOTION: f64 = 0.5;

/// Default linear speed in scene units per second.
pub const DEFAULT_LINEAR_SPEED: f64 = 10.0;

/// Default rotation speed in radians per second.
pub const DEFAULT_ROTATION_SPEED: f64 = 1.0;

/// Default time without movement before the tram reports `Stopped`.
pub const DEFAULT_STOPPED_AFTER: Duration = Duration::from_secs(60);

/// Configuration for the position reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Identifier reported in [`TramStatus`].
    pub tram_id: String,

    /// Change detection and staleness thresholds.
    pub validator: UpdateValidator,

    /// Translation speed in scene units per second.
    pub linear_speed: f64,

    /// Rotation speed in radians per second.
    pub rotation_speed: f64,

    /// Scene units per degree.
    pub scale: f64,

    /// Explicit projection origin. When `None`, the fallback route midpoint
    /// is used, else [`super::projection::DEFAULT_CENTER`].
    pub center: Option<(f64, f64)>,

    /// Added to every computed heading to match the model's forward axis.
    pub model_heading_offset: f64,

    /// Displacements shorter than this (scene units) are treated as noise.
    pub min_motion: f64,

    /// Time without movement before the status reads `Stopped`.
    pub stopped_after: Duration,

    /// Static route for fallback mode. Empty disables fallback.
    pub fallback_route: Vec<(f64, f64)>,

    /// Landmarks for the "last building passed" field.
    pub landmarks: Vec<Landmark>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tram_id: "tram-1".to_string(),
            validator: UpdateValidator::default(),
            linear_speed: DEFAULT_LINEAR_SPEED,
            rotation_speed: DEFAULT_ROTATION_SPEED,
            scale: super::projection::DEFAULT_SCALE,
            center: None,
            model_heading_offset: 0.0,
            min_motion: DEFAULT_MIN_MOTION,
            stopped_after: DEFAULT_STOPPED_AFTER,
            fallback_route: Vec::new(),
            landmarks: Vec::new(),
        }
    }
}

/// What the reconciler did with one fix.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// First fix: transform placed without animation.
    Snapped,
    /// A new transition was started.
    Transitioning(TransitionPlan),
    /// Within the change tolerance; nothing to do.
    Unchanged,
    /// Changed, but the projected displacement is below the noise floor.
    Noise { distance: f64 },
    /// Older than the staleness bound; transform frozen.
    Stale { age: Option<Duration> },
    /// Older than the currently accepted fix.
    OutOfOrder,
    /// Coordinates unusable.
    Invalid(InvalidDataError),
    /// Reconciler disposed or input not applicable in the current mode.
    Ignored,
}

/// Follow-up work the session must perform on the reconciler's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerAction {
    /// Ask the channel for the latest location.
    RequestUpdate,
}

/// Accepted-point bookkeeping. Private to the reconciler.
#[derive(Debug, Default)]
struct TrackedState {
    current_accepted: Option<GeoPoint>,
    previous_accepted: Option<GeoPoint>,
    last_accepted_at: Option<DateTime<Utc>>,
    /// Source tag of `current_accepted`.
    current_source: Option<String>,
    is_transitioning: bool,
    last_known_transform: Option<Transform>,
}

/// The reconciliation state machine for one tracked tram.
pub struct PositionReconciler {
    config: ReconcilerConfig,
    projection: Projection,
    animator: Box<dyn Animator>,
    state: TrackedState,
    active: Option<Box<dyn TransitionHandle>>,
    phase: ReconcilerPhase,
    mode: TrackingMode,
    fallback: FallbackRoute,
    landmarks: LandmarkIndex,
    last_landmark: Option<String>,
    connection_healthy: bool,
    last_connection_loss_at: Option<DateTime<Utc>>,
    last_stale_log: Option<Instant>,
    last_movement_at: Option<Instant>,
    created_at: Instant,
    actions: Vec<ReconcilerAction>,
    disposed: bool,
}

impl std::fmt::Debug for PositionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionReconciler")
            .field("phase", &self.phase)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("connection_healthy", &self.connection_healthy)
            .finish_non_exhaustive()
    }
}

impl PositionReconciler {
    /// Create a reconciler using the in-process [`LinearAnimator`].
    pub fn new(config: ReconcilerConfig) -> Self {
        Self::with_animator(config, Box::new(LinearAnimator))
    }

    /// Create a reconciler driving transitions through `animator`.
    pub fn with_animator(config: ReconcilerConfig, animator: Box<dyn Animator>) -> Self {
        let fallback = FallbackRoute::new(config.fallback_route.clone());
        let origin = config
            .center
            .or_else(|| fallback.midpoint())
            .unwrap_or(super::projection::DEFAULT_CENTER);
        let mode = if fallback.is_empty() {
            TrackingMode::Realtime
        } else {
            TrackingMode::Fallback
        };

        Self {
            projection: Projection::new(origin, config.scale),
            landmarks: LandmarkIndex::new(config.landmarks.clone()),
            config,
            animator,
            state: TrackedState::default(),
            active: None,
            phase: ReconcilerPhase::Uninitialized,
            mode,
            fallback,
            last_landmark: None,
            connection_healthy: false,
            last_connection_loss_at: None,
            last_stale_log: None,
            last_movement_at: None,
            created_at: Instant::now(),
            actions: Vec::new(),
            disposed: false,
        }
    }

    /// Configuration the reconciler was built with.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// The projection in use.
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Current state machine phase.
    pub fn phase(&self) -> ReconcilerPhase {
        self.phase
    }

    /// Realtime or fallback.
    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    /// True while a transition is in flight.
    pub fn is_moving(&self) -> bool {
        self.state.is_transitioning
    }

    /// Latest accepted point.
    pub fn current_point(&self) -> Option<GeoPoint> {
        self.state.current_accepted
    }

    /// Accepted point before the latest.
    pub fn previous_point(&self) -> Option<GeoPoint> {
        self.state.previous_accepted
    }

    /// Source tag of the current point, e.g. [`LocationUpdate::SOURCE_FALLBACK`].
    pub fn current_source(&self) -> Option<&str> {
        self.state.current_source.as_deref()
    }

    /// Wall-clock time the current point was accepted.
    pub fn last_accepted_at(&self) -> Option<DateTime<Utc>> {
        self.state.last_accepted_at
    }

    /// Fold one live update from the push channel.
    pub fn handle_update(&mut self, update: &LocationUpdate, now: Instant) -> UpdateOutcome {
        if self.disposed {
            return UpdateOutcome::Ignored;
        }

        let point = update.current;
        if let Some(err) = range_error(&point) {
            warn!(
                lat = point.latitude,
                lon = point.longitude,
                source = %update.source,
                error = %err,
                "Discarding invalid location update"
            );
            return UpdateOutcome::Invalid(err);
        }

        if self.mode == TrackingMode::Fallback {
            info!(
                route_points = self.fallback.len(),
                "Live location received, leaving fallback route"
            );
            self.mode = TrackingMode::Realtime;
        }

        self.apply_update(update, now)
    }

    /// Inject a position directly, stamped now, with range validation.
    ///
    /// Goes through the same change detection and transition logic as live
    /// updates but does not switch the tracking mode.
    pub fn inject_position(&mut self, latitude: f64, longitude: f64, now: Instant) -> UpdateOutcome {
        self.inject(latitude, longitude, LocationUpdate::SOURCE_MANUAL, now)
    }

    /// Inject a position the caller guarantees is well formed.
    pub fn inject_trusted_position(&mut self, latitude: f64, longitude: f64, now: Instant) -> UpdateOutcome {
        if self.disposed {
            return UpdateOutcome::Ignored;
        }
        let update = LocationUpdate::from_point(
            GeoPoint::now(latitude, longitude),
            LocationUpdate::SOURCE_MANUAL,
        );
        self.apply_update(&update, now)
    }

    /// Step to the next fallback waypoint.
    ///
    /// Returns `None` once realtime mode has been entered or when no route
    /// is configured.
    pub fn advance_fallback(&mut self, now: Instant) -> Option<UpdateOutcome> {
        if self.disposed || self.mode != TrackingMode::Fallback {
            return None;
        }
        let index = self.fallback.next_index();
        let (latitude, longitude) = self.fallback.advance()?;
        trace!(index, latitude, longitude, "Advancing fallback route");
        Some(self.inject(latitude, longitude, LocationUpdate::SOURCE_FALLBACK, now))
    }

    /// Record a connection state change reported by the channel.
    ///
    /// Losing the connection freezes the transform in place. Regaining it
    /// queues a [`ReconcilerAction::RequestUpdate`] when the channel is
    /// healthy.
    pub fn handle_connection_change(&mut self, connected: bool, healthy: bool, now: Instant) {
        if self.disposed {
            return;
        }

        if !connected {
            self.freeze(now);
            self.connection_healthy = false;
            self.last_connection_loss_at = Some(Utc::now());
            self.phase = ReconcilerPhase::Disconnected;
            info!(
                has_position = self.state.current_accepted.is_some(),
                "Connection lost, holding last known position"
            );
            return;
        }

        self.connection_healthy = healthy;
        self.last_connection_loss_at = None;
        if matches!(
            self.phase,
            ReconcilerPhase::Disconnected | ReconcilerPhase::Uninitialized
        ) {
            self.phase = if self.state.current_accepted.is_some() {
                ReconcilerPhase::Tracking
            } else {
                ReconcilerPhase::Uninitialized
            };
        }
        if healthy {
            self.actions.push(ReconcilerAction::RequestUpdate);
        }
        info!(healthy, phase = %self.phase, "Connection restored");
    }

    /// Drain follow-up actions queued since the last call.
    pub fn take_actions(&mut self) -> Vec<ReconcilerAction> {
        std::mem::take(&mut self.actions)
    }

    /// Advance the in-flight transition. Returns true when it completed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(handle) = self.active.as_ref() else {
            return false;
        };

        let sample = handle.sample(now);
        self.state.last_known_transform = Some(sample.transform);
        if !sample.finished {
            return false;
        }

        self.active = None;
        self.state.is_transitioning = false;
        self.last_movement_at = Some(now);
        if self.phase == ReconcilerPhase::Transitioning {
            self.phase = ReconcilerPhase::Tracking;
        }
        debug!(
            x = sample.transform.position.x,
            z = sample.transform.position.z,
            heading = sample.transform.heading,
            "Transition complete"
        );
        true
    }

    /// Interpolated transform at `now`, `None` before the first fix.
    pub fn transform_at(&self, now: Instant) -> Option<Transform> {
        match &self.active {
            Some(handle) => Some(handle.sample(now).transform),
            None => self.state.last_known_transform,
        }
    }

    /// Side-effect-free status snapshot.
    pub fn status(&self) -> ReconcilerStatus {
        ReconcilerStatus {
            current_point: self.state.current_accepted,
            previous_point: self.state.previous_accepted,
            is_moving: self.state.is_transitioning,
            connection_healthy: self.connection_healthy,
            last_connection_loss_at: self.last_connection_loss_at,
            mode: self.mode,
            phase: self.phase,
        }
    }

    /// Rider-facing status at `now`.
    pub fn tram_status(&self, now: Instant) -> TramStatus {
        let is_moving = self.state.is_transitioning;
        let since_movement = if is_moving {
            Duration::ZERO
        } else {
            now.saturating_duration_since(self.last_movement_at.unwrap_or(self.created_at))
        };
        let running = is_moving
            || (self.last_movement_at.is_some() && since_movement < self.config.stopped_after);

        TramStatus {
            tram_id: self.config.tram_id.clone(),
            status: if running {
                RunState::Running
            } else {
                RunState::Stopped
            },
            location: self.state.current_accepted.map(|p| LatLng {
                lat: p.latitude,
                lng: p.longitude,
            }),
            last_building_passed: self.last_landmark.clone(),
            is_moving,
            ms_since_last_movement: duration_millis(since_movement),
            connection_healthy: self.connection_healthy,
        }
    }

    /// Everything a consumer needs for one frame.
    pub fn snapshot(&self, now: Instant) -> TrackerSnapshot {
        TrackerSnapshot {
            status: self.status(),
            tram: self.tram_status(now),
            transform: self.transform_at(now),
        }
    }

    /// Cancel any transition and stop accepting input.
    pub fn dispose(&mut self, now: Instant) {
        self.freeze(now);
        self.actions.clear();
        self.disposed = true;
        debug!("Position reconciler disposed");
    }

    /// True once [`Self::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn inject(&mut self, latitude: f64, longitude: f64, source: &str, now: Instant) -> UpdateOutcome {
        if self.disposed {
            return UpdateOutcome::Ignored;
        }
        let update = LocationUpdate::from_point(GeoPoint::now(latitude, longitude), source);
        if let Some(err) = range_error(&update.current) {
            warn!(latitude, longitude, source, error = %err, "Rejecting injected position");
            return UpdateOutcome::Invalid(err);
        }
        self.apply_update(&update, now)
    }

    fn apply_update(&mut self, update: &LocationUpdate, now: Instant) -> UpdateOutcome {
        let point = update.current;
        let Some(current) = self.state.current_accepted else {
            return self.place_first(update);
        };

        let validator = self.config.validator;
        if validator.is_stale(&point) {
            return self.enter_stale(&point, now);
        }

        // Injected points are stamped on arrival, so only channel fixes are
        // comparable by measurement time.
        let both_from_channel = update.source == LocationUpdate::SOURCE_CHANNEL
            && self.state.current_source.as_deref() == Some(LocationUpdate::SOURCE_CHANNEL);
        if both_from_channel {
            if let (Some(new_ts), Some(current_ts)) = (point.timestamp, current.timestamp) {
                if new_ts < current_ts {
                    trace!(%new_ts, %current_ts, "Discarding out-of-order location");
                    self.leave_stale();
                    return UpdateOutcome::OutOfOrder;
                }
            }
        }

        if !validator.has_changed(&point, Some(&current)) {
            trace!(lat = point.latitude, lon = point.longitude, "Location unchanged");
            self.leave_stale();
            return UpdateOutcome::Unchanged;
        }

        let from_position = self.project(&current);
        let to_position = self.project(&point);
        let distance = from_position.distance_to(&to_position);
        if distance < self.config.min_motion {
            trace!(distance, "Displacement below noise floor");
            self.leave_stale();
            return UpdateOutcome::Noise { distance };
        }

        // Cancel before touching target state so two transitions never overlap.
        let from = self.freeze(now).unwrap_or(Transform::new(from_position, 0.0));

        self.state.previous_accepted = Some(current);
        self.state.current_accepted = Some(point);
        self.state.current_source = Some(update.source.clone());
        self.state.last_accepted_at = Some(Utc::now());
        self.note_landmark(&point);

        let facing = heading_between(&from_position, &to_position, self.config.model_heading_offset);
        let heading = from.heading + shortest_rotation(from.heading, facing);
        let target = Transform::new(to_position, heading);
        let plan = TransitionPlan::between(
            &from,
            target,
            self.config.linear_speed,
            self.config.rotation_speed,
        );

        self.active = Some(self.animator.begin(from, plan, now));
        self.state.is_transitioning = true;
        self.last_movement_at = Some(now);
        self.phase = ReconcilerPhase::Transitioning;

        debug!(
            lat = point.latitude,
            lon = point.longitude,
            source = %update.source,
            distance = format!("{:.2}", distance),
            rotate_ms = plan.rotate_duration.as_millis() as u64,
            translate_ms = plan.translate_duration.as_millis() as u64,
            "Location accepted, transition started"
        );
        UpdateOutcome::Transitioning(plan)
    }

    fn place_first(&mut self, update: &LocationUpdate) -> UpdateOutcome {
        let point = update.current;
        let transform = Transform::new(self.project(&point), self.config.model_heading_offset);

        self.state.current_accepted = Some(point);
        self.state.previous_accepted = Some(point);
        self.state.current_source = Some(update.source.clone());
        self.state.last_accepted_at = Some(Utc::now());
        self.state.last_known_transform = Some(transform);
        self.note_landmark(&point);
        if self.phase != ReconcilerPhase::Disconnected {
            self.phase = ReconcilerPhase::Tracking;
        }

        info!(
            lat = point.latitude,
            lon = point.longitude,
            source = %update.source,
            x = format!("{:.1}", transform.position.x),
            z = format!("{:.1}", transform.position.z),
            "First location placed"
        );
        UpdateOutcome::Snapped
    }

    fn enter_stale(&mut self, point: &GeoPoint, now: Instant) -> UpdateOutcome {
        self.freeze(now);
        // Disconnected wins until the connection is restored.
        if self.phase != ReconcilerPhase::Disconnected {
            self.phase = ReconcilerPhase::Stale;
        }

        let age = point.timestamp.map(|ts| age_of(ts, Utc::now()));
        if self.stale_log_due(now) {
            warn!(
                age_ms = age.map(duration_millis),
                max_age_ms = duration_millis(self.config.validator.stale_threshold),
                "Location data is stale, holding position"
            );
        }
        UpdateOutcome::Stale { age }
    }

    /// At most one staleness warning per [`STALE_LOG_INTERVAL`].
    fn stale_log_due(&mut self, now: Instant) -> bool {
        let due = self
            .last_stale_log
            .map_or(true, |last| now.saturating_duration_since(last) >= STALE_LOG_INTERVAL);
        if due {
            self.last_stale_log = Some(now);
        }
        due
    }

    fn leave_stale(&mut self) {
        if self.phase == ReconcilerPhase::Stale {
            self.phase = ReconcilerPhase::Tracking;
        }
    }

    /// Cancel the in-flight transition, keeping its interpolated transform.
    ///
    /// Returns the transform the entity now rests at.
    fn freeze(&mut self, now: Instant) -> Option<Transform> {
        if let Some(mut handle) = self.active.take() {
            let frozen = handle.cancel(now);
            self.state.last_known_transform = Some(frozen);
            self.state.is_transitioning = false;
            trace!(x = frozen.position.x, z = frozen.position.z, "Transition cancelled");
        }
        if self.phase == ReconcilerPhase::Transitioning {
            self.phase = ReconcilerPhase::Tracking;
        }
        self.state.last_known_transform
    }

    fn project(&self, point: &GeoPoint) -> ScenePosition {
        self.projection.project(point.latitude, point.longitude)
    }

    fn note_landmark(&mut self, point: &GeoPoint) {
        if let Some(landmark) = self.landmarks.containing(point.latitude, point.longitude) {
            if self.last_landmark.as_deref() != Some(landmark.name.as_str()) {
                debug!(landmark = %landmark.name, "Passed landmark");
                self.last_landmark = Some(landmark.name.clone());
            }
        }
    }
}

/// Range check returning the specific failure.
fn range_error(point: &GeoPoint) -> Option<InvalidDataError> {
    if super::validator::is_valid(point) {
        return None;
    }
    if !point.latitude.is_finite() {
        return Some(InvalidDataError::NotANumber {
            field: "lat",
            value: point.latitude.to_string(),
        });
    }
    if !point.longitude.is_finite() {
        return Some(InvalidDataError::NotANumber {
            field: "lon",
            value: point.longitude.to_string(),
        });
    }
    if !(-90.0..=90.0).contains(&point.latitude) {
        return Some(InvalidDataError::OutOfRange {
            field: "lat",
            value: point.latitude,
        });
    }
    Some(InvalidDataError::OutOfRange {
        field: "lon",
        value: point.longitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::tracking::state::UpdateStatus;
    use crate::tracking::transition::{LinearTransition, TransitionSample};

    const LAT: f64 = 13.6;
    const LON: f64 = 100.8;

    fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            center: Some((LAT, LON)),
            ..Default::default()
        }
    }

    fn update_at(lat: f64, lon: f64, age_secs: i64) -> LocationUpdate {
        LocationUpdate {
            current: GeoPoint::new(lat, lon, Utc::now() - chrono::Duration::seconds(age_secs)),
            previous: None,
            status: UpdateStatus::Active,
            source: LocationUpdate::SOURCE_CHANNEL.to_string(),
            received_at: Utc::now(),
        }
    }

    fn update(lat: f64, lon: f64) -> LocationUpdate {
        update_at(lat, lon, 0)
    }

    /// Animator that counts transitions currently alive.
    #[derive(Clone, Default)]
    struct CountingAnimator {
        begun: Arc<AtomicUsize>,
        live: Arc<AtomicUsize>,
        max_live: Arc<AtomicUsize>,
    }

    struct CountingHandle {
        inner: Box<dyn TransitionHandle>,
        live: Arc<AtomicUsize>,
        ended: AtomicBool,
    }

    impl CountingHandle {
        fn end(&self) {
            if !self.ended.swap(true, Ordering::SeqCst) {
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    impl TransitionHandle for CountingHandle {
        fn sample(&self, now: Instant) -> TransitionSample {
            let sample = self.inner.sample(now);
            if sample.finished {
                self.end();
            }
            sample
        }

        fn cancel(&mut self, now: Instant) -> Transform {
            self.end();
            self.inner.cancel(now)
        }

        fn is_cancelled(&self) -> bool {
            self.inner.is_cancelled()
        }
    }

    impl Animator for CountingAnimator {
        fn begin(&mut self, from: Transform, plan: TransitionPlan, now: Instant) -> Box<dyn TransitionHandle> {
            self.begun.fetch_add(1, Ordering::SeqCst);
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(live, Ordering::SeqCst);
            Box::new(CountingHandle {
                inner: LinearAnimator.begin(from, plan, now),
                live: self.live.clone(),
                ended: AtomicBool::new(false),
            })
        }
    }

    fn counting_reconciler() -> (PositionReconciler, CountingAnimator) {
        let animator = CountingAnimator::default();
        let reconciler = PositionReconciler::with_animator(config(), Box::new(animator.clone()));
        (reconciler, animator)
    }

    #[test]
    fn test_first_update_snaps_without_transition() {
        let (mut reconciler, animator) = counting_reconciler();
        let now = Instant::now();

        let outcome = reconciler.handle_update(&update(LAT, LON), now);

        assert_eq!(outcome, UpdateOutcome::Snapped);
        assert_eq!(animator.begun.load(Ordering::SeqCst), 0);
        assert_eq!(reconciler.phase(), ReconcilerPhase::Tracking);
        assert_eq!(reconciler.current_point(), reconciler.previous_point());
        assert!(reconciler.last_accepted_at().is_some());
        assert!(!reconciler.is_moving());

        let transform = reconciler.transform_at(now).unwrap();
        assert!(transform.position.x.abs() < 1e-6 && transform.position.z.abs() < 1e-6);
    }

    #[test]
    fn test_invalid_first_update_stays_uninitialized() {
        let mut reconciler = PositionReconciler::new(config());
        let outcome = reconciler.handle_update(&update(95.0, LON), Instant::now());

        assert!(matches!(
            outcome,
            UpdateOutcome::Invalid(InvalidDataError::OutOfRange { field: "lat", .. })
        ));
        assert_eq!(reconciler.phase(), ReconcilerPhase::Uninitialized);
        assert!(reconciler.current_point().is_none());
        assert!(reconciler.transform_at(Instant::now()).is_none());
    }

    #[test]
    fn test_sub_tolerance_update_does_not_move() {
        let (mut reconciler, animator) = counting_reconciler();
        let now = Instant::now();
        reconciler.handle_update(&update(LAT, LON), now);

        let outcome = reconciler.handle_update(&update(LAT + 2e-6, LON - 3e-6), now);

        assert_eq!(outcome, UpdateOutcome::Unchanged);
        assert_eq!(animator.begun.load(Ordering::SeqCst), 0);
        assert!(!reconciler.is_moving());
        assert_eq!(reconciler.current_point().unwrap().lat_lon(), (LAT, LON));
    }

    #[test]
    fn test_changed_update_transitions_then_completes() {
        let mut reconciler = PositionReconciler::new(config());
        let start = Instant::now();
        reconciler.handle_update(&update(LAT, LON), start);

        let moved = update(LAT + 0.0003, LON);
        let outcome = reconciler.handle_update(&moved, start);
        let UpdateOutcome::Transitioning(plan) = outcome else {
            panic!("expected a transition, got {:?}", outcome);
        };

        assert!(reconciler.is_moving());
        assert_eq!(reconciler.phase(), ReconcilerPhase::Transitioning);
        assert_eq!(reconciler.previous_point().unwrap().lat_lon(), (LAT, LON));

        // Moving north (negative z): heading π, rotation capped at 1s.
        assert_eq!(plan.rotate_duration, Duration::from_secs(1));
        assert!((plan.translate_duration.as_secs_f64() - 3.0).abs() < 1e-6);

        assert!(!reconciler.tick(start + Duration::from_secs(2)));
        assert!(reconciler.is_moving());

        assert!(reconciler.tick(start + plan.total_duration()));
        assert!(!reconciler.is_moving());
        assert_eq!(reconciler.phase(), ReconcilerPhase::Tracking);
        assert_eq!(reconciler.current_point(), Some(moved.current));
        assert_eq!(reconciler.transform_at(start + Duration::from_secs(10)), Some(plan.target));
    }

    #[test]
    fn test_stale_update_never_transitions() {
        let (mut reconciler, animator) = counting_reconciler();
        let now = Instant::now();
        reconciler.handle_update(&update(LAT, LON), now);

        for _ in 0..3 {
            let outcome = reconciler.handle_update(&update_at(LAT + 0.01, LON + 0.01, 120), now);
            assert!(matches!(outcome, UpdateOutcome::Stale { age: Some(_) }));
        }

        assert_eq!(animator.begun.load(Ordering::SeqCst), 0);
        assert_eq!(reconciler.phase(), ReconcilerPhase::Stale);
        assert_eq!(reconciler.current_point().unwrap().lat_lon(), (LAT, LON));
        assert_eq!(reconciler.previous_point().unwrap().lat_lon(), (LAT, LON));
    }

    #[test]
    fn test_stale_update_freezes_in_flight_transition() {
        let mut reconciler = PositionReconciler::new(config());
        let start = Instant::now();
        reconciler.handle_update(&update(LAT, LON), start);
        let UpdateOutcome::Transitioning(plan) =
            reconciler.handle_update(&update(LAT, LON + 0.0005), start)
        else {
            panic!("expected transition");
        };

        let midway = start + plan.rotate_duration + Duration::from_secs(2);
        let before = reconciler.transform_at(midway).unwrap();
        reconciler.handle_update(&update_at(LAT, LON + 0.001, 600), midway);

        assert!(!reconciler.is_moving());
        let after = reconciler.transform_at(midway + Duration::from_secs(30)).unwrap();
        assert_eq!(after, before);
        assert!(after.position.x > 0.0 && after.position.x < plan.target.position.x);
    }

    #[test]
    fn test_stale_warning_rate_limited() {
        let mut reconciler = PositionReconciler::new(config());
        let now = Instant::now();

        assert!(reconciler.stale_log_due(now));
        assert!(!reconciler.stale_log_due(now + Duration::from_secs(10)));
        assert!(!reconciler.stale_log_due(now + Duration::from_secs(29)));
        assert!(reconciler.stale_log_due(now + Duration::from_secs(31)));
        assert!(!reconciler.stale_log_due(now + Duration::from_secs(40)));
    }

    #[test]
    fn test_stale_update_while_disconnected_stays_disconnected() {
        let mut reconciler = PositionReconciler::new(config());
        let now = Instant::now();
        reconciler.handle_update(&update(LAT, LON), now);
        reconciler.handle_connection_change(false, false, now);

        let outcome = reconciler.handle_update(&update_at(LAT + 0.01, LON, 120), now);
        assert!(matches!(outcome, UpdateOutcome::Stale { .. }));
        assert_eq!(reconciler.phase(), ReconcilerPhase::Disconnected);

        reconciler.handle_connection_change(true, true, now);
        assert_eq!(reconciler.phase(), ReconcilerPhase::Tracking);
    }

    #[test]
    fn test_fresh_update_after_stale_resumes() {
        let mut reconciler = PositionReconciler::new(config());
        let now = Instant::now();
        reconciler.handle_update(&update(LAT, LON), now);
        reconciler.handle_update(&update_at(LAT + 0.01, LON, 120), now);
        assert_eq!(reconciler.phase(), ReconcilerPhase::Stale);

        let outcome = reconciler.handle_update(&update(LAT + 0.001, LON), now);
        assert!(matches!(outcome, UpdateOutcome::Transitioning(_)));
        assert_eq!(reconciler.phase(), ReconcilerPhase::Transitioning);
    }

    #[test]
    fn test_cancel_and_replace_keeps_one_transition() {
        let (mut reconciler, animator) = counting_reconciler();
        let start = Instant::now();
        reconciler.handle_update(&update(LAT, LON), start);

        reconciler.handle_update(&update(LAT, LON + 0.001), start);
        let second_at = start + Duration::from_millis(1500);
        let outcome = reconciler.handle_update(&update(LAT + 0.001, LON + 0.001), second_at);
        let UpdateOutcome::Transitioning(plan) = outcome else {
            panic!("expected transition");
        };

        assert_eq!(animator.begun.load(Ordering::SeqCst), 2);
        assert_eq!(animator.max_live.load(Ordering::SeqCst), 1);
        assert_eq!(animator.live.load(Ordering::SeqCst), 1);

        let expected = reconciler
            .projection()
            .project(LAT + 0.001, LON + 0.001);
        assert_eq!(plan.target.position, expected);

        reconciler.tick(second_at + plan.total_duration());
        assert_eq!(animator.live.load(Ordering::SeqCst), 0);
        assert_eq!(
            reconciler.transform_at(second_at + plan.total_duration()).unwrap().position,
            expected
        );
    }

    #[test]
    fn test_replacement_starts_from_interpolated_position() {
        let mut reconciler = PositionReconciler::new(config());
        let start = Instant::now();
        reconciler.handle_update(&update(LAT, LON), start);
        let UpdateOutcome::Transitioning(first) =
            reconciler.handle_update(&update(LAT, LON + 0.001), start)
        else {
            panic!("expected transition");
        };

        let midway = start + first.rotate_duration + Duration::from_secs(5);
        let frozen = reconciler.transform_at(midway).unwrap();
        reconciler.handle_update(&update(LAT, LON + 0.002), midway);

        // Immediately after replacement the transform has not jumped.
        let right_after = reconciler.transform_at(midway).unwrap();
        assert!((right_after.position.x - frozen.position.x).abs() < 1e-9);
    }

    #[test]
    fn test_disconnect_halts_transition_midway() {
        let mut reconciler = PositionReconciler::new(config());
        let start = Instant::now();
        reconciler.handle_connection_change(true, true, start);
        reconciler.take_actions();
        reconciler.handle_update(&update(LAT, LON), start);
        let UpdateOutcome::Transitioning(plan) =
            reconciler.handle_update(&update(LAT, LON + 0.001), start)
        else {
            panic!("expected transition");
        };

        let midway = start + plan.rotate_duration + Duration::from_secs(4);
        let expected = reconciler.transform_at(midway).unwrap();
        reconciler.handle_connection_change(false, false, midway);

        let status = reconciler.status();
        assert!(!status.connection_healthy);
        assert!(!status.is_moving);
        assert!(status.last_connection_loss_at.is_some());
        assert_eq!(status.phase, ReconcilerPhase::Disconnected);
        assert!(status.current_point.is_some());

        let held = reconciler.transform_at(midway + Duration::from_secs(60)).unwrap();
        assert_eq!(held, expected);
        assert!(held.position.x > 0.0);
        assert!(held.position.x < plan.target.position.x);
    }

    #[test]
    fn test_reconnect_requests_fresh_update() {
        let mut reconciler = PositionReconciler::new(config());
        let now = Instant::now();
        reconciler.handle_update(&update(LAT, LON), now);
        reconciler.handle_connection_change(false, false, now);

        reconciler.handle_connection_change(true, true, now);

        assert_eq!(reconciler.take_actions(), vec![ReconcilerAction::RequestUpdate]);
        assert!(reconciler.take_actions().is_empty());
        let status = reconciler.status();
        assert!(status.connection_healthy);
        assert!(status.last_connection_loss_at.is_none());
        assert_eq!(status.phase, ReconcilerPhase::Tracking);
    }

    #[test]
    fn test_unhealthy_reconnect_does_not_request() {
        let mut reconciler = PositionReconciler::new(config());
        reconciler.handle_connection_change(true, false, Instant::now());
        assert!(reconciler.take_actions().is_empty());
        assert_eq!(reconciler.phase(), ReconcilerPhase::Uninitialized);
    }

    #[test]
    fn test_noise_below_min_motion_is_discarded() {
        let config = ReconcilerConfig {
            min_motion: 5.0,
            ..config()
        };
        let mut reconciler = PositionReconciler::new(config);
        let now = Instant::now();
        reconciler.handle_update(&update(LAT, LON), now);

        // 2e-5 degrees * 100000 = 2 units < 5
        let outcome = reconciler.handle_update(&update(LAT + 2e-5, LON), now);
        assert!(matches!(outcome, UpdateOutcome::Noise { .. }));
        assert_eq!(reconciler.current_point().unwrap().lat_lon(), (LAT, LON));
        assert!(!reconciler.is_moving());
    }

    #[test]
    fn test_out_of_order_update_dropped() {
        let mut reconciler = PositionReconciler::new(config());
        let now = Instant::now();
        reconciler.handle_update(&update_at(LAT, LON, 5), now);

        let outcome = reconciler.handle_update(&update_at(LAT + 0.001, LON, 20), now);
        assert_eq!(outcome, UpdateOutcome::OutOfOrder);
        assert_eq!(reconciler.current_point().unwrap().lat_lon(), (LAT, LON));
    }

    #[test]
    fn test_heading_takes_shortest_path() {
        let mut reconciler = PositionReconciler::new(config());
        let start = Instant::now();
        reconciler.handle_update(&update(LAT, LON), start);

        // West: atan2(-dx, 0) = -π/2
        let UpdateOutcome::Transitioning(west) =
            reconciler.handle_update(&update(LAT, LON - 0.001), start)
        else {
            panic!("expected transition");
        };
        assert!((west.target.heading + std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        let done = start + west.total_duration();
        reconciler.tick(done);

        // Then north-west-ish to (-π + small): rotate -π/2 - small, never +3π/2.
        let UpdateOutcome::Transitioning(next) =
            reconciler.handle_update(&update(LAT + 0.001, LON - 0.0011), done)
        else {
            panic!("expected transition");
        };
        let delta = next.target.heading - west.target.heading;
        assert!(delta.abs() <= std::f64::consts::PI);
    }

    #[test]
    fn test_manual_injection_goes_through_change_detection() {
        let mut reconciler = PositionReconciler::new(config());
        let now = Instant::now();

        assert_eq!(reconciler.inject_position(LAT, LON, now), UpdateOutcome::Snapped);
        assert_eq!(reconciler.inject_position(LAT, LON, now), UpdateOutcome::Unchanged);
        assert!(matches!(
            reconciler.inject_position(LAT + 0.001, LON, now),
            UpdateOutcome::Transitioning(_)
        ));
        assert!(matches!(
            reconciler.inject_position(LAT, 200.0, now),
            UpdateOutcome::Invalid(_)
        ));
        assert_eq!(reconciler.mode(), TrackingMode::Realtime);
    }

    #[test]
    fn test_fallback_route_until_first_live_update() {
        let config = ReconcilerConfig {
            center: None,
            fallback_route: vec![(LAT, LON), (LAT + 0.001, LON), (LAT + 0.002, LON)],
            ..Default::default()
        };
        let mut reconciler = PositionReconciler::new(config);
        let now = Instant::now();

        assert_eq!(reconciler.mode(), TrackingMode::Fallback);
        let origin = reconciler.projection().origin;
        assert!((origin.0 - (LAT + 0.001)).abs() < 1e-9);
        assert!((origin.1 - LON).abs() < 1e-9);

        assert_eq!(reconciler.advance_fallback(now), Some(UpdateOutcome::Snapped));
        assert!(matches!(
            reconciler.advance_fallback(now),
            Some(UpdateOutcome::Transitioning(_))
        ));

        reconciler.handle_update(&update(LAT + 0.005, LON), now);
        assert_eq!(reconciler.mode(), TrackingMode::Realtime);
        assert_eq!(reconciler.advance_fallback(now), None);
        assert_eq!(reconciler.status().mode, TrackingMode::Realtime);
    }

    #[test]
    fn test_first_live_fix_after_fallback_takes_over() {
        let config = ReconcilerConfig {
            fallback_route: vec![(LAT, LON), (LAT + 0.001, LON)],
            ..config()
        };
        let mut reconciler = PositionReconciler::new(config);
        let now = Instant::now();
        assert_eq!(reconciler.advance_fallback(now), Some(UpdateOutcome::Snapped));
        assert_eq!(reconciler.current_source(), Some(LocationUpdate::SOURCE_FALLBACK));

        // Measured two seconds before the waypoint was stamped.
        let outcome = reconciler.handle_update(&update_at(LAT + 0.002, LON + 0.001, 2), now);

        assert!(matches!(outcome, UpdateOutcome::Transitioning(_)));
        assert_eq!(reconciler.mode(), TrackingMode::Realtime);
        assert_eq!(reconciler.current_point().unwrap().lat_lon(), (LAT + 0.002, LON + 0.001));
        assert_eq!(reconciler.current_source(), Some(LocationUpdate::SOURCE_CHANNEL));
        assert_eq!(reconciler.advance_fallback(now), None);
    }

    #[test]
    fn test_live_fix_after_manual_injection_is_accepted() {
        let mut reconciler = PositionReconciler::new(config());
        let now = Instant::now();
        reconciler.inject_trusted_position(LAT, LON, now);
        assert_eq!(reconciler.current_source(), Some(LocationUpdate::SOURCE_MANUAL));

        let outcome = reconciler.handle_update(&update_at(LAT + 0.001, LON, 2), now);
        assert!(matches!(outcome, UpdateOutcome::Transitioning(_)));

        // Channel fixes are still ordered among themselves.
        let outcome = reconciler.handle_update(&update_at(LAT + 0.002, LON, 10), now);
        assert_eq!(outcome, UpdateOutcome::OutOfOrder);
    }

    #[test]
    fn test_invalid_live_update_keeps_fallback() {
        let config = ReconcilerConfig {
            fallback_route: vec![(LAT, LON)],
            ..config()
        };
        let mut reconciler = PositionReconciler::new(config);
        reconciler.handle_update(&update(f64::NAN, LON), Instant::now());
        assert_eq!(reconciler.mode(), TrackingMode::Fallback);
    }

    #[test]
    fn test_tram_status_and_landmarks() {
        let config = ReconcilerConfig {
            tram_id: "tram-7".to_string(),
            landmarks: vec![Landmark::new("Library", LAT + 0.001, LON, 30.0)],
            stopped_after: Duration::from_secs(60),
            ..config()
        };
        let mut reconciler = PositionReconciler::new(config);
        let start = Instant::now();

        let idle = reconciler.tram_status(start);
        assert_eq!(idle.tram_id, "tram-7");
        assert_eq!(idle.status, RunState::Stopped);
        assert!(idle.location.is_none());

        reconciler.handle_update(&update(LAT, LON), start);
        let UpdateOutcome::Transitioning(plan) =
            reconciler.handle_update(&update(LAT + 0.001, LON), start)
        else {
            panic!("expected transition");
        };

        let moving = reconciler.tram_status(start + Duration::from_secs(1));
        assert!(moving.is_moving);
        assert_eq!(moving.status, RunState::Running);
        assert_eq!(moving.ms_since_last_movement, 0);
        assert_eq!(moving.last_building_passed.as_deref(), Some("Library"));

        let done = start + plan.total_duration();
        reconciler.tick(done);
        let after = reconciler.tram_status(done + Duration::from_secs(10));
        assert!(!after.is_moving);
        assert_eq!(after.status, RunState::Running);
        assert_eq!(after.ms_since_last_movement, 10_000);

        let later = reconciler.tram_status(done + Duration::from_secs(120));
        assert_eq!(later.status, RunState::Stopped);
        assert_eq!(later.location, Some(LatLng { lat: LAT + 0.001, lng: LON }));
    }

    #[test]
    fn test_dispose_cancels_and_ignores_input() {
        let (mut reconciler, animator) = counting_reconciler();
        let now = Instant::now();
        reconciler.handle_update(&update(LAT, LON), now);
        reconciler.handle_update(&update(LAT + 0.001, LON), now);
        assert_eq!(animator.live.load(Ordering::SeqCst), 1);

        reconciler.dispose(now + Duration::from_millis(100));

        assert!(reconciler.is_disposed());
        assert_eq!(animator.live.load(Ordering::SeqCst), 0);
        assert_eq!(
            reconciler.handle_update(&update(LAT + 0.002, LON), now),
            UpdateOutcome::Ignored
        );
        reconciler.handle_connection_change(true, true, now);
        assert!(reconciler.take_actions().is_empty());
    }

    #[test]
    fn test_linear_transition_handle_is_used_by_default() {
        // The default animator hands out LinearTransition handles; make sure
        // the type stays constructible for custom animators that wrap it.
        fn assert_handle<T: TransitionHandle>() {}
        assert_handle::<LinearTransition>();
    }
}
