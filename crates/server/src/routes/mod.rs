use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{IntoMakeService, get},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::DeploymentImpl;

pub mod config;
pub mod contracts;
pub mod customers;
pub mod dashboard;
pub mod estimates;
pub mod frontend;
pub mod health;
pub mod invoices;
pub mod pay_terms;
pub mod payments;
pub mod projects;

#[cfg(test)]
pub(crate) mod test_support;

/// Every `/api` route, with state applied.
pub fn api_router(deployment: DeploymentImpl) -> Router {
    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(config::router())
        .merge(customers::router(&deployment))
        .merge(projects::router(&deployment))
        .merge(estimates::router(&deployment))
        .merge(invoices::router(&deployment))
        .merge(payments::router(&deployment))
        .merge(pay_terms::router(&deployment))
        .merge(contracts::router(&deployment))
        .merge(dashboard::router())
        .with_state(deployment);

    Router::new().nest("/api", base_routes)
}

pub fn router(deployment: DeploymentImpl) -> IntoMakeService<Router> {
    api_router(deployment)
        .route("/", get(frontend::serve_frontend_root))
        .route("/{*path}", get(frontend::serve_frontend))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .into_make_service()
}

/// Origins come from the comma separated `ALLOWED_ORIGINS`; unparsable
/// entries are skipped with a warning.
pub fn parse_allowed_origins(raw: Option<&str>) -> Vec<HeaderValue> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("http://localhost:3000");
    raw.split(',')
        .filter_map(|origin| {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

fn cors_layer() -> CorsLayer {
    let origins = parse_allowed_origins(std::env::var("ALLOWED_ORIGINS").ok().as_deref());
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
