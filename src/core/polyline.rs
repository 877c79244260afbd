use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::{GeoPoint, Path};

/// Decimal digits kept by the standard polyline format
pub const DEFAULT_PRECISION: u32 = 5;

/// Errors from encoding or decoding polylines
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolylineError {
    #[error("cannot encode an empty path")]
    EmptyPath,

    #[error("coordinate at index {0} is not finite")]
    NonFiniteCoordinate(usize),

    #[error("invalid character {character:?} at byte {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("polyline ends in the middle of a value")]
    Truncated,

    #[error("polyline has a latitude without a longitude")]
    UnpairedValue,

    #[error("polyline coordinate overflows at byte {0}")]
    Overflow(usize),
}

/// Polyline string for a path, lossy at the chosen precision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedPolyline(String);

impl EncodedPolyline {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn decode(&self) -> Result<Vec<GeoPoint>, PolylineError> {
        decode(&self.0, DEFAULT_PRECISION)
    }
}

impl fmt::Display for EncodedPolyline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode a path at 5-digit precision
///
/// A `Path` always has at least two finite points when built from provider
/// geometry, so this cannot fail for paths produced by the fetcher.
pub fn encode_path(path: &Path) -> Result<EncodedPolyline, PolylineError> {
    encode(path.points(), DEFAULT_PRECISION)
}

/// Encode (latitude, longitude) pairs in order with delta + varint packing
pub fn encode(points: &[GeoPoint], precision: u32) -> Result<EncodedPolyline, PolylineError> {
    if points.is_empty() {
        return Err(PolylineError::EmptyPath);
    }

    let factor = 10f64.powi(precision as i32);
    let mut out = String::with_capacity(points.len() * 8);
    let (mut prev_lat, mut prev_lon) = (0i64, 0i64);

    for (idx, point) in points.iter().enumerate() {
        if !point.latitude.is_finite() || !point.longitude.is_finite() {
            return Err(PolylineError::NonFiniteCoordinate(idx));
        }

        // f64::round rounds half away from zero, matching common polyline encoders
        let lat = (point.latitude * factor).round() as i64;
        let lon = (point.longitude * factor).round() as i64;

        encode_value(lat - prev_lat, &mut out);
        encode_value(lon - prev_lon, &mut out);

        prev_lat = lat;
        prev_lon = lon;
    }

    Ok(EncodedPolyline(out))
}

#[inline]
fn encode_value(delta: i64, out: &mut String) {
    let mut value = delta << 1;
    if delta < 0 {
        value = !value;
    }

    let mut value = value as u64;
    while value >= 0x20 {
        out.push((((0x20 | (value & 0x1f)) + 63) as u8) as char);
        value >>= 5;
    }
    out.push(((value + 63) as u8) as char);
}

/// Decode a polyline back into (latitude, longitude) points
pub fn decode(encoded: &str, precision: u32) -> Result<Vec<GeoPoint>, PolylineError> {
    let factor = 10f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut pos = 0;
    let (mut lat, mut lon) = (0i64, 0i64);

    while pos < bytes.len() {
        lat = lat
            .checked_add(decode_value(encoded, &mut pos)?)
            .ok_or(PolylineError::Overflow(pos))?;
        if pos >= bytes.len() {
            return Err(PolylineError::UnpairedValue);
        }
        lon = lon
            .checked_add(decode_value(encoded, &mut pos)?)
            .ok_or(PolylineError::Overflow(pos))?;

        points.push(GeoPoint::new(lat as f64 / factor, lon as f64 / factor));
    }

    Ok(points)
}

fn decode_value(encoded: &str, pos: &mut usize) -> Result<i64, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut result: u64 = 0;
    let mut shift = 0u32;

    loop {
        let byte = *bytes.get(*pos).ok_or(PolylineError::Truncated)?;
        if !(63..=126).contains(&byte) || shift > 60 {
            let character = encoded[*pos..].chars().next().unwrap_or('\u{fffd}');
            return Err(PolylineError::InvalidCharacter {
                character,
                position: *pos,
            });
        }
        *pos += 1;

        let chunk = (byte - 63) as u64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    let value = if result & 1 == 1 {
        !(result >> 1) as i64
    } else {
        (result >> 1) as i64
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_points() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(38.5, -120.2),
            GeoPoint::new(40.7, -120.95),
            GeoPoint::new(43.252, -126.453),
        ]
    }

    #[test]
    fn test_encode_reference_polyline() {
        let encoded = encode(&reference_points(), DEFAULT_PRECISION).unwrap();
        assert_eq!(encoded.as_str(), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn test_decode_reference_polyline() {
        let points = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@", DEFAULT_PRECISION).unwrap();
        assert_eq!(points.len(), 3);
        for (decoded, original) in points.iter().zip(reference_points()) {
            assert!((decoded.latitude - original.latitude).abs() < 1e-5);
            assert!((decoded.longitude - original.longitude).abs() < 1e-5);
        }
    }

    #[test]
    fn test_decode_within_precision() {
        let points = vec![
            GeoPoint::new(12.971612345, 77.594598765),
            GeoPoint::new(12.9600001, 77.6000009),
            GeoPoint::new(-33.8688197, 151.2092955),
        ];

        let encoded = encode(&points, DEFAULT_PRECISION).unwrap();
        let decoded = encoded.decode().unwrap();

        assert_eq!(decoded.len(), points.len());
        for (d, p) in decoded.iter().zip(&points) {
            assert!((d.latitude - p.latitude).abs() <= 1e-5);
            assert!((d.longitude - p.longitude).abs() <= 1e-5);
        }
    }

    #[test]
    fn test_encode_empty_path_fails() {
        assert_eq!(encode(&[], DEFAULT_PRECISION), Err(PolylineError::EmptyPath));
    }

    #[test]
    fn test_encode_non_finite_fails() {
        let points = vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(f64::NAN, 1.0)];
        assert_eq!(
            encode(&points, DEFAULT_PRECISION),
            Err(PolylineError::NonFiniteCoordinate(1))
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode(&reference_points(), DEFAULT_PRECISION).unwrap();
        let b = encode(&reference_points(), DEFAULT_PRECISION).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            decode("_p~iF ", DEFAULT_PRECISION),
            Err(PolylineError::InvalidCharacter { position: 5, .. })
        ));
        // Continuation bit set on the last character
        assert_eq!(decode("_p~i", DEFAULT_PRECISION), Err(PolylineError::Truncated));
        // Latitude only
        assert_eq!(decode("_p~iF", DEFAULT_PRECISION), Err(PolylineError::UnpairedValue));
    }

    #[test]
    fn test_decode_rejects_accumulated_overflow() {
        // Two latitude deltas of 2^62 push the running sum past i64::MAX
        let mut encoded = String::new();
        for _ in 0..2 {
            encode_value(1 << 62, &mut encoded);
            encode_value(0, &mut encoded);
        }

        let first_pair = encoded.len() / 2;
        assert_eq!(
            decode(&encoded, DEFAULT_PRECISION),
            Err(PolylineError::Overflow(first_pair + 13))
        );
    }

    #[test]
    fn test_decode_empty_string() {
        assert_eq!(decode("", DEFAULT_PRECISION).unwrap(), vec![]);
    }
}
