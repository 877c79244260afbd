// Route exports
pub mod safe_route;

use actix_web::{error, http::StatusCode, web, HttpResponse};

use crate::models::ErrorResponse;

pub use safe_route::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(safe_route::configure);
}

/// Rejected request body, rendered in the `{"error": ...}` envelope
#[derive(Debug)]
pub struct JsonError {
    pub message: String,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.message.clone()))
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        message: format!("Invalid JSON: {}", err),
    }
    .into()
}

/// JSON extractor config shared by the server and tests
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(handle_json_payload_error)
}
