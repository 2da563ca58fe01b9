//! Static fallback route.
//!
//! When no live update has ever arrived, the reconciler can walk a fixed,
//! ordered route instead. The route is stepped by an external timer; it
//! wraps back to the first point after the last.

/// Ordered list of (latitude, longitude) waypoints with a cursor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FallbackRoute {
    points: Vec<(f64, f64)>,
    next_index: usize,
}

impl FallbackRoute {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self {
            points,
            next_index: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Index of the waypoint the next call to [`Self::advance`] returns.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Return the next waypoint and move the cursor, wrapping at the end.
    pub fn advance(&mut self) -> Option<(f64, f64)> {
        let point = *self.points.get(self.next_index)?;
        self.next_index = (self.next_index + 1) % self.points.len();
        Some(point)
    }

    /// Centre of the route's bounding box, used as the projection origin.
    pub fn midpoint(&self) -> Option<(f64, f64)> {
        let (first, rest) = self.points.split_first()?;
        let (mut min_lat, mut max_lat, mut min_lon, mut max_lon) = (first.0, first.0, first.1, first.1);
        for &(lat, lon) in rest {
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
            min_lon = min_lon.min(lon);
            max_lon = max_lon.max(lon);
        }
        Some(((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0))
    }
}
