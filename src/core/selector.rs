use std::sync::Arc;
use thiserror::Error;

use crate::core::polyline::{encode_path, EncodedPolyline};
use crate::core::risk::RiskScorer;
use crate::models::{GeoPoint, Path, RoutePreference, ScoredPath};
use crate::services::RouteFetcher;

/// Errors surfaced by route selection
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    /// Every preference failed to produce a candidate path
    #[error("No safe route found")]
    NoRouteFound,

    #[error("{0}")]
    Unexpected(String),
}

/// Picks the lowest-risk walking route among the provider's preferences
///
/// # Pipeline
/// 1. Fetch one path per preference, in `RoutePreference::ALL` order
/// 2. Sum point risk along each path, unavailable points count as zero
/// 3. Keep the minimum, first fetched wins ties
/// 4. Encode the winner as a polyline
#[derive(Clone)]
pub struct RouteSelector {
    fetcher: Arc<dyn RouteFetcher>,
    scorer: Arc<dyn RiskScorer>,
}

impl RouteSelector {
    pub fn new(fetcher: Arc<dyn RouteFetcher>, scorer: Arc<dyn RiskScorer>) -> Self {
        Self { fetcher, scorer }
    }

    /// Sum the risk of every point on a path
    pub fn score_path(&self, preference: RoutePreference, path: Path) -> ScoredPath {
        let mut total_risk = 0.0;
        let mut unscored_points = 0;

        for point in path.points() {
            match self.scorer.score(*point) {
                Ok(risk) => total_risk += risk,
                Err(e) => {
                    // Fail open: the point contributes nothing but the path stays eligible
                    tracing::trace!("Risk unavailable for {}: {}", point, e);
                    unscored_points += 1;
                }
            }
        }

        ScoredPath {
            preference,
            path,
            total_risk,
            unscored_points,
        }
    }

    /// Fetch and score a candidate for every preference, skipping failed fetches
    pub async fn candidates(&self, origin: GeoPoint, destination: GeoPoint) -> Vec<ScoredPath> {
        let mut scored = Vec::with_capacity(RoutePreference::ALL.len());

        for preference in RoutePreference::ALL {
            let path = match self.fetcher.fetch(origin, destination, preference).await {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Skipping {} route from {} to {}: {}", preference, origin, destination, e);
                    continue;
                }
            };

            let candidate = self.score_path(preference, path);
            if candidate.unscored_points > 0 {
                tracing::warn!(
                    "{} of {} points on the {} route could not be scored",
                    candidate.unscored_points,
                    candidate.path.len(),
                    preference
                );
            }
            tracing::debug!(
                "Candidate {}: {} points, {:.0} m, total risk {:.6e}",
                preference,
                candidate.path.len(),
                candidate.path.length_m(),
                candidate.total_risk
            );

            scored.push(candidate);
        }

        scored
    }

    /// Return the lowest-risk candidate path
    pub async fn select_safest_path(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<ScoredPath, RouteError> {
        let candidates = self.candidates(origin, destination).await;
        let fetched = candidates.len();

        let winner = pick_lowest_risk(candidates).ok_or(RouteError::NoRouteFound)?;

        tracing::info!(
            "Selected {} route ({} points, risk {:.6e}) out of {} candidates",
            winner.preference,
            winner.path.len(),
            winner.total_risk,
            fetched
        );

        Ok(winner)
    }

    /// Return the safest route encoded as a polyline
    pub async fn select_safest(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<EncodedPolyline, RouteError> {
        let winner = self.select_safest_path(origin, destination).await?;

        encode_path(&winner.path).map_err(|e| RouteError::Unexpected(e.to_string()))
    }
}

/// Lowest total risk wins; on ties the earliest candidate is kept
pub fn pick_lowest_risk(candidates: Vec<ScoredPath>) -> Option<ScoredPath> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(best) if best.total_risk <= candidate.total_risk => Some(best),
        _ => Some(candidate),
    })
}
