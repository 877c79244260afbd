use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{GeoPoint, LonLat, Path, RoutePreference};

/// Walking profile used for every directions request
pub const DEFAULT_PROFILE: &str = "foot-walking";

/// Errors that can occur when fetching a route from the directions provider
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unauthorized: directions provider rejected the API key")]
    Unauthorized,

    #[error("API returned error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Route geometry has {0} coordinates, need at least 2")]
    EmptyGeometry(usize),
}

/// Fetches one walking path between two points for a routing preference
#[async_trait]
pub trait RouteFetcher: Send + Sync {
    async fn fetch(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        preference: RoutePreference,
    ) -> Result<Path, FetchError>;
}

#[derive(Debug, Serialize)]
struct DirectionsRequest<'a> {
    coordinates: [LonLat; 2],
    preference: &'a str,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<LonLat>,
}

/// OpenRouteService directions client
///
/// Issues `POST {base}/v2/directions/{profile}/geojson` requests and reads the
/// path off the first feature's LineString geometry.
pub struct OrsClient {
    base_url: String,
    api_key: String,
    profile: String,
    client: Client,
}

impl OrsClient {
    /// Create a new client; without `timeout` the transport default applies
    pub fn new(
        base_url: String,
        api_key: String,
        profile: String,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            base_url,
            api_key,
            profile,
            client,
        })
    }

    fn directions_url(&self) -> String {
        format!(
            "{}/v2/directions/{}/geojson",
            self.base_url.trim_end_matches('/'),
            self.profile
        )
    }
}

#[async_trait]
impl RouteFetcher for OrsClient {
    async fn fetch(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        preference: RoutePreference,
    ) -> Result<Path, FetchError> {
        let url = self.directions_url();
        let payload = DirectionsRequest {
            coordinates: [origin.into(), destination.into()],
            preference: preference.as_str(),
        };

        tracing::debug!("Requesting {} route from {}", preference, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.api_key)
            .header("Accept", "application/geo+json, application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(FetchError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_geometry(&body)
    }
}

/// Read the path out of a GeoJSON directions response, converting to (lat, lon)
fn parse_geometry(body: &str) -> Result<Path, FetchError> {
    let collection: FeatureCollection = serde_json::from_str(body)
        .map_err(|e| FetchError::InvalidResponse(format!("Failed to parse directions: {}", e)))?;

    let feature = collection
        .features
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::InvalidResponse("Missing route feature".into()))?;

    let points: Vec<GeoPoint> = feature
        .geometry
        .coordinates
        .into_iter()
        .map(GeoPoint::from)
        .collect();

    if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
        return Err(FetchError::InvalidResponse(format!(
            "Coordinate out of range: {}",
            bad
        )));
    }

    let count = points.len();
    Path::new(points).map_err(|_| FetchError::EmptyGeometry(count))
}
