// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{GeoPoint, LonLat, Path, PathTooShort, RoutePreference, ScoredPath};
pub use requests::{Coordinates, SafeRouteRequest, ValidationError};
pub use responses::{ErrorResponse, HealthResponse, SafeRouteResponse};
