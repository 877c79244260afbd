// Service exports
pub mod directions;

pub use directions::{FetchError, OrsClient, RouteFetcher, DEFAULT_PROFILE};
