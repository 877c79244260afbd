// Core algorithm exports
pub mod polyline;
pub mod risk;
pub mod selector;

pub use polyline::{decode, encode, encode_path, EncodedPolyline, PolylineError, DEFAULT_PRECISION};
pub use risk::{InputSpace, ModelArtifact, ModelError, RiskModel, RiskScorer, ScoringUnavailable};
pub use selector::{pick_lowest_risk, RouteError, RouteSelector};
