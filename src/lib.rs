//! Safe Route - safest walking route service
//!
//! Fetches walking routes for several routing preferences from a directions
//! provider, scores each path against a fitted risk density model and returns
//! the lowest-risk route as an encoded polyline.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use self::core::{EncodedPolyline, RiskModel, RiskScorer, RouteError, RouteSelector};
pub use models::{GeoPoint, Path, RoutePreference, SafeRouteRequest, ScoredPath};
pub use services::{OrsClient, RouteFetcher};
