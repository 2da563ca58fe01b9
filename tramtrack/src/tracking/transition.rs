//! Transition capability - smooth, cancellable movement toward a target.
//!
//! The reconciler never interpolates itself. It asks an [`Animator`] to begin
//! a transition and holds the returned [`TransitionHandle`], which it alone
//! may cancel. Completion is observed by sampling the handle on the frame
//! tick, so nothing ever blocks.
//!
//! [`LinearAnimator`] is the in-process implementation: rotate in place at
//! constant angular velocity, then translate at constant linear velocity.

use std::time::{Duration, Instant};

use super::projection::Transform;

/// Upper bound on the rotate phase.
pub const MAX_ROTATION_DURATION: Duration = Duration::from_secs(1);

/// Lower bound on the translate phase.
pub const MIN_TRANSLATION_DURATION: Duration = Duration::from_secs(1);

/// What a transition should do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPlan {
    /// Where the entity ends up.
    pub target: Transform,
    /// Duration of the rotate-in-place phase.
    pub rotate_duration: Duration,
    /// Duration of the translate phase.
    pub translate_duration: Duration,
}

impl TransitionPlan {
    /// Plan a move from `from` to `target` at the given speeds.
    ///
    /// Rotation takes `|Δheading| / rotation_speed`, capped at one second.
    /// Translation takes `distance / linear_speed`, at least one second.
    pub fn between(from: &Transform, target: Transform, linear_speed: f64, rotation_speed: f64) -> Self {
        let rotation = (target.heading - from.heading).abs();
        let rotate_secs = if rotation_speed > 0.0 {
            rotation / rotation_speed
        } else {
            0.0
        };
        let rotate_duration = duration_from_secs(rotate_secs).min(MAX_ROTATION_DURATION);

        let distance = from.position.distance_to(&target.position);
        let translate_secs = if linear_speed > 0.0 {
            distance / linear_speed
        } else {
            0.0
        };
        let translate_duration = duration_from_secs(translate_secs).max(MIN_TRANSLATION_DURATION);

        Self {
            target,
            rotate_duration,
            translate_duration,
        }
    }

    /// Total duration of both phases.
    pub fn total_duration(&self) -> Duration {
        self.rotate_duration.saturating_add(self.translate_duration)
    }
}

/// Seconds to a duration, saturating at [`Duration::MAX`] and flooring at zero.
fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// One sample of a running transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionSample {
    /// Interpolated transform at the sample time.
    pub transform: Transform,
    /// True once the target has been reached.
    pub finished: bool,
}

/// Handle to an in-flight transition.
pub trait TransitionHandle: Send {
    /// Interpolated state at `now`. A cancelled handle keeps returning the
    /// transform it was frozen at, with `finished == false`.
    fn sample(&self, now: Instant) -> TransitionSample;

    /// Stop the transition where it is and return the frozen transform.
    ///
    /// Synchronous and idempotent: later calls return the same transform.
    fn cancel(&mut self, now: Instant) -> Transform;

    /// True once `cancel` has been called.
    fn is_cancelled(&self) -> bool;
}

/// Something that can run transitions.
pub trait Animator: Send {
    /// Begin a transition from `from` according to `plan`, starting at `now`.
    fn begin(&mut self, from: Transform, plan: TransitionPlan, now: Instant) -> Box<dyn TransitionHandle>;
}

/// Rotate-then-translate animator evaluated on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearAnimator;

impl Animator for LinearAnimator {
    fn begin(&mut self, from: Transform, plan: TransitionPlan, now: Instant) -> Box<dyn TransitionHandle> {
        Box::new(LinearTransition {
            from,
            plan,
            started_at: now,
            frozen: None,
        })
    }
}

/// A single linear rotate-then-translate timeline.
#[derive(Debug, Clone)]
pub struct LinearTransition {
    from: Transform,
    plan: TransitionPlan,
    started_at: Instant,
    frozen: Option<Transform>,
}

impl LinearTransition {
    fn evaluate(&self, now: Instant) -> TransitionSample {
        let elapsed = now.saturating_duration_since(self.started_at);
        let rotate = self.plan.rotate_duration;
        let target = self.plan.target;

        if elapsed < rotate {
            let t = elapsed.as_secs_f64() / rotate.as_secs_f64();
            let heading = self.from.heading + (target.heading - self.from.heading) * t;
            return TransitionSample {
                transform: Transform::new(self.from.position, heading),
                finished: false,
            };
        }

        let translate_elapsed = elapsed - rotate;
        let translate = self.plan.translate_duration;
        if translate.is_zero() || translate_elapsed >= translate {
            return TransitionSample {
                transform: target,
                finished: true,
            };
        }

        let t = translate_elapsed.as_secs_f64() / translate.as_secs_f64();
        TransitionSample {
            transform: Transform::new(self.from.position.lerp(&target.position, t), target.heading),
            finished: false,
        }
    }
}

impl TransitionHandle for LinearTransition {
    fn sample(&self, now: Instant) -> TransitionSample {
        match self.frozen {
            Some(transform) => TransitionSample {
                transform,
                finished: false,
            },
            None => self.evaluate(now),
        }
    }

    fn cancel(&mut self, now: Instant) -> Transform {
        if let Some(frozen) = self.frozen {
            return frozen;
        }
        let frozen = self.evaluate(now).transform;
        self.frozen = Some(frozen);
        frozen
    }

    fn is_cancelled(&self) -> bool {
        self.frozen.is_some()
    }
}
