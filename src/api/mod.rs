use crate::report::service::ReportService;
use axum::Router;
use axum::routing::get;

pub mod handlers;
pub mod responses;

/// Shared handler state: the report pipeline plus request defaults.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub service: ReportService,
    pub default_zone: String,
}

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route("/api/report", get(handlers::get_report))
        .route("/api/report/latest", get(handlers::get_latest_report))
        .route("/api/window", get(handlers::get_window))
        .route("/api/health", get(handlers::get_health))
        .with_state(context)
}
