//! Named campus landmarks for the "last building passed" status field.

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default radius used when a landmark entry omits one.
pub const DEFAULT_LANDMARK_RADIUS_M: f64 = 40.0;

/// A named point with a capture radius.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

impl Landmark {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, radius_m: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            radius_m,
        }
    }
}

/// Landmark lookup by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkIndex {
    landmarks: Vec<Landmark>,
}

impl LandmarkIndex {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// Nearest landmark whose radius contains the position.
    pub fn containing(&self, latitude: f64, longitude: f64) -> Option<&Landmark> {
        self.landmarks
            .iter()
            .map(|l| (l, haversine_m(latitude, longitude, l.latitude, l.longitude)))
            .filter(|(l, d)| *d <= l.radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(l, _)| l)
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> LandmarkIndex {
        LandmarkIndex::new(vec![
            Landmark::new("Library", 13.7300, 100.7780, 50.0),
            Landmark::new("Engineering", 13.7310, 100.7780, 50.0),
        ])
    }

    #[test]
    fn test_haversine_one_millidegree_latitude() {
        let d = haversine_m(13.7300, 100.7780, 13.7310, 100.7780);
        assert!((d - 111.2).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_containing_picks_nearest_within_radius() {
        let index = index();
        assert_eq!(index.containing(13.7301, 100.7780).unwrap().name, "Library");
        assert_eq!(index.containing(13.7309, 100.7780).unwrap().name, "Engineering");
    }

    #[test]
    fn test_containing_outside_all_radii() {
        assert!(index().containing(13.7305, 100.7780).is_none());
        assert!(LandmarkIndex::default().containing(13.73, 100.778).is_none());
    }
}
