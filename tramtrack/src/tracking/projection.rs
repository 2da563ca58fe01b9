//! Geographic → scene projection and heading math.
//!
//! The campus is small enough for a flat linear projection around a fixed
//! origin: `x` grows east, `z` grows south (right-handed, y-up scene).

use std::f64::consts::{PI, TAU};

/// Default projection scale in scene units per degree (~1.1m per unit).
pub const DEFAULT_SCALE: f64 = 100_000.0;

/// Default projection origin (campus centre) as (latitude, longitude).
pub const DEFAULT_CENTER: (f64, f64) = (13.7299, 100.7782);

/// A position in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScenePosition {
    pub x: f64,
    pub z: f64,
}

impl ScenePosition {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Straight-line distance to another position.
    pub fn distance_to(&self, other: &ScenePosition) -> f64 {
        (other.x - self.x).hypot(other.z - self.z)
    }

    /// Linear interpolation toward `other`, `t` clamped to [0, 1].
    pub fn lerp(&self, other: &ScenePosition, t: f64) -> ScenePosition {
        let t = t.clamp(0.0, 1.0);
        ScenePosition {
            x: self.x + (other.x - self.x) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

/// Position and heading of the tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: ScenePosition,
    /// Rotation about the vertical axis in radians. Not normalised: the
    /// reconciler accumulates shortest-path deltas onto it.
    pub heading: f64,
}

impl Transform {
    pub fn new(position: ScenePosition, heading: f64) -> Self {
        Self { position, heading }
    }
}

/// Fixed linear projection around an origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Origin as (latitude, longitude).
    pub origin: (f64, f64),
    /// Scene units per degree.
    pub scale: f64,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            origin: DEFAULT_CENTER,
            scale: DEFAULT_SCALE,
        }
    }
}

impl Projection {
    pub fn new(origin: (f64, f64), scale: f64) -> Self {
        Self { origin, scale }
    }

    /// Project a latitude/longitude into scene coordinates.
    pub fn project(&self, latitude: f64, longitude: f64) -> ScenePosition {
        ScenePosition {
            x: (longitude - self.origin.1) * self.scale,
            z: (self.origin.0 - latitude) * self.scale,
        }
    }
}

/// Heading that faces along the displacement `from → to`.
///
/// `atan2(dx, dz)` puts heading 0 along +z; `forward_offset` compensates for
/// the model's own forward axis.
pub fn heading_between(from: &ScenePosition, to: &ScenePosition, forward_offset: f64) -> f64 {
    (to.x - from.x).atan2(to.z - from.z) + forward_offset
}

/// Wrap an angle into (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Signed rotation from `current` to `target` with the smaller magnitude.
pub fn shortest_rotation(current: f64, target: f64) -> f64 {
    wrap_angle(target - current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_origin_projects_to_zero() {
        let projection = Projection::new((13.6, 100.8), DEFAULT_SCALE);
        let p = projection.project(13.6, 100.8);
        assert!(p.x.abs() < EPS && p.z.abs() < EPS);
    }

    #[test]
    fn test_east_is_positive_x_north_is_negative_z() {
        let projection = Projection::new((13.6, 100.8), 1000.0);
        let east = projection.project(13.6, 100.801);
        let north = projection.project(13.601, 100.8);
        assert!((east.x - 1.0).abs() < 1e-6);
        assert!((north.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_heading_between_axes() {
        let origin = ScenePosition::default();
        let south = heading_between(&origin, &ScenePosition::new(0.0, 5.0), 0.0);
        let east = heading_between(&origin, &ScenePosition::new(5.0, 0.0), 0.0);
        assert!(south.abs() < EPS);
        assert!((east - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn test_heading_offset_applied() {
        let origin = ScenePosition::default();
        let heading = heading_between(&origin, &ScenePosition::new(0.0, 5.0), PI);
        assert!((heading - PI).abs() < EPS);
    }

    #[test]
    fn test_wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < EPS);
        assert!((wrap_angle(-PI) - PI).abs() < EPS);
        assert!((wrap_angle(0.5) - 0.5).abs() < EPS);
        assert!((wrap_angle(-TAU - 0.5) + 0.5).abs() < EPS);
    }

    #[test]
    fn test_shortest_rotation_crosses_pi() {
        // From 170° to -170° is +20°, not -340°.
        let current = 170f64.to_radians();
        let target = (-170f64).to_radians();
        let delta = shortest_rotation(current, target);
        assert!((delta - 20f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn test_lerp_and_distance() {
        let a = ScenePosition::new(0.0, 0.0);
        let b = ScenePosition::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < EPS);
        assert_eq!(a.lerp(&b, 0.5), ScenePosition::new(1.5, 2.0));
        assert_eq!(a.lerp(&b, 2.0), b);
    }
}
