use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use crate::models::domain::GeoPoint;

/// Client-caused request problems, surfaced as 400 with the message verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing source or destination")]
    MissingEndpoints,

    #[error("Invalid format for source or destination")]
    InvalidFormat,
}

/// Request body for `POST /get_safe_route`
///
/// `src` and `dest` stay as raw JSON until validated so that a missing
/// endpoint and a malformed one can be told apart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeRouteRequest {
    #[serde(default)]
    pub src: Option<Value>,
    #[serde(default)]
    pub dest: Option<Value>,
}

/// A validated endpoint as sent by clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct Coordinates {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

impl From<Coordinates> for GeoPoint {
    fn from(c: Coordinates) -> Self {
        GeoPoint::new(c.latitude, c.longitude)
    }
}

impl SafeRouteRequest {
    pub fn new(src: Value, dest: Value) -> Self {
        Self {
            src: Some(src),
            dest: Some(dest),
        }
    }

    /// Validate both endpoints, returning (origin, destination)
    pub fn endpoints(&self) -> Result<(GeoPoint, GeoPoint), ValidationError> {
        let (src, dest) = match (self.src.as_ref(), self.dest.as_ref()) {
            (Some(src), Some(dest)) if is_present(src) && is_present(dest) => (src, dest),
            _ => return Err(ValidationError::MissingEndpoints),
        };

        if !has_required_keys(src) || !has_required_keys(dest) {
            return Err(ValidationError::InvalidFormat);
        }

        Ok((parse_point(src)?, parse_point(dest)?))
    }
}

/// Empty or zero-like values count as missing, same as an absent field
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn has_required_keys(value: &Value) -> bool {
    value
        .as_object()
        .map(|o| o.contains_key("latitude") && o.contains_key("longitude"))
        .unwrap_or(false)
}

fn parse_point(value: &Value) -> Result<GeoPoint, ValidationError> {
    let coords: Coordinates =
        serde_json::from_value(value.clone()).map_err(|_| ValidationError::InvalidFormat)?;

    coords.validate().map_err(|errors| {
        tracing::debug!("Coordinate range check failed: {}", errors);
        ValidationError::InvalidFormat
    })?;

    Ok(coords.into())
}
