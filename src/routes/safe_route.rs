use actix_web::{web, HttpResponse, Responder};
use tracing::Instrument;

use crate::core::{RouteError, RouteSelector};
use crate::models::{ErrorResponse, HealthResponse, SafeRouteRequest, SafeRouteResponse};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub selector: RouteSelector,
    pub model_components: usize,
}

/// Configure the routing endpoints
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/get_safe_route", web::post().to(get_safe_route));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        model_components: state.model_components,
    })
}

/// Safest route endpoint
///
/// POST /get_safe_route
///
/// Request body:
/// ```json
/// {
///   "src": {"latitude": 12.9716, "longitude": 77.5946},
///   "dest": {"latitude": 12.9352, "longitude": 77.6146}
/// }
/// ```
async fn get_safe_route(
    state: web::Data<AppState>,
    req: web::Json<SafeRouteRequest>,
) -> HttpResponse {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("get_safe_route", %request_id);

    async move {
        let (origin, destination) = match req.endpoints() {
            Ok(endpoints) => endpoints,
            Err(e) => {
                tracing::info!("Rejected request: {} (src={:?}, dest={:?})", e, req.src, req.dest);
                return HttpResponse::BadRequest().json(ErrorResponse::new(e.to_string()));
            }
        };

        tracing::info!("Finding safest route from {} to {}", origin, destination);

        match state.selector.select_safest(origin, destination).await {
            Ok(polyline) => HttpResponse::Ok().json(SafeRouteResponse {
                safest_polyline: polyline.into_string(),
            }),
            Err(RouteError::NoRouteFound) => {
                tracing::warn!("No route found from {} to {}", origin, destination);
                HttpResponse::BadRequest().json(ErrorResponse::new(RouteError::NoRouteFound.to_string()))
            }
            Err(RouteError::Unexpected(description)) => {
                tracing::error!("Route selection failed: {}", description);
                HttpResponse::InternalServerError().json(ErrorResponse::new(format!(
                    "An unexpected error occurred: {}",
                    description
                )))
            }
        }
    }
    .instrument(span)
    .await
}
