use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A geographic point in degrees, always stored as (latitude, longitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both axes are finite and inside the WGS84 ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// Provider wire coordinate, serialized as `[longitude, latitude]`
///
/// Kept as its own type so a provider pair can never be read as a
/// `GeoPoint` without going through the `From` conversions below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat(f64, f64);

impl LonLat {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self(longitude, latitude)
    }

    pub fn longitude(&self) -> f64 {
        self.0
    }

    pub fn latitude(&self) -> f64 {
        self.1
    }
}

impl From<GeoPoint> for LonLat {
    fn from(point: GeoPoint) -> Self {
        LonLat(point.longitude, point.latitude)
    }
}

impl From<LonLat> for GeoPoint {
    fn from(coord: LonLat) -> Self {
        GeoPoint {
            latitude: coord.1,
            longitude: coord.0,
        }
    }
}

/// Routing preference requested from the directions provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePreference {
    Recommended,
    Shortest,
    Fastest,
}

impl RoutePreference {
    /// Iteration order is also the tie-break order during selection
    pub const ALL: [RoutePreference; 3] = [
        RoutePreference::Recommended,
        RoutePreference::Shortest,
        RoutePreference::Fastest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutePreference::Recommended => "recommended",
            RoutePreference::Shortest => "shortest",
            RoutePreference::Fastest => "fastest",
        }
    }
}

impl fmt::Display for RoutePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("a path needs at least 2 points, got {0}")]
pub struct PathTooShort(pub usize);

/// Ordered walk from start to end, at least two points long
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    points: Vec<GeoPoint>,
}

impl Path {
    pub fn new(points: Vec<GeoPoint>) -> Result<Self, PathTooShort> {
        if points.len() < 2 {
            return Err(PathTooShort(points.len()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false, a `Path` holds at least two points. Present for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> GeoPoint {
        self.points[0]
    }

    pub fn end(&self) -> GeoPoint {
        self.points[self.points.len() - 1]
    }

    /// Walking length along the path in meters
    pub fn length_m(&self) -> f64 {
        use geo::HaversineLength;

        let line: geo::LineString<f64> = self
            .points
            .iter()
            .map(|p| geo::coord! { x: p.longitude, y: p.latitude })
            .collect();
        line.haversine_length()
    }
}

/// A fetched candidate path with its aggregate risk
#[derive(Debug, Clone)]
pub struct ScoredPath {
    pub preference: RoutePreference,
    pub path: Path,
    pub total_risk: f64,
    /// Points whose risk could not be evaluated and counted as zero
    pub unscored_points: usize,
}
