use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use safe_route::config::{LoggingSettings, Settings};
use safe_route::core::{RiskModel, RouteSelector};
use safe_route::routes::{self, AppState};
use safe_route::services::OrsClient;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingSettings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "json" => subscriber.json().init(),
        _ => subscriber.compact().init(),
    }
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(&LoggingSettings::default());
            return Err(startup_error("Failed to load configuration", e));
        }
    };

    init_logging(&settings.logging);

    info!("Starting Safe Route service...");

    // The model is loaded once and shared read-only by every worker
    let model = RiskModel::load(&settings.risk.model_path, settings.risk.effective_input_space())
        .map_err(|e| startup_error("Failed to load risk model", e))?;
    let model_components = model.n_components();

    info!(
        "Risk model loaded from {} ({} components, {:?} input)",
        settings.risk.model_path,
        model_components,
        model.input_space()
    );

    if settings.directions.api_key.is_empty() {
        warn!("No directions API key configured; set ORS_API_KEY or SAFE_ROUTE__DIRECTIONS__API_KEY");
    }

    let directions = OrsClient::new(
        settings.directions.base_url.clone(),
        settings.directions.api_key.clone(),
        settings.directions.profile.clone(),
        settings.directions.timeout(),
    )
    .map_err(|e| startup_error("Failed to create directions client", e))?;

    info!(
        "Directions client initialized ({} profile at {})",
        settings.directions.profile, settings.directions.base_url
    );

    let app_state = AppState {
        selector: RouteSelector::new(Arc::new(directions), Arc::new(model)),
        model_components,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(routes::json_config())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
