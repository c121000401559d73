use occupancy_report::api::{self, ApiContext};
use occupancy_report::config::{self, Config};
use occupancy_report::provider::OccupancyProvider;
use occupancy_report::provider::fixed::FixedOccupancyProvider;
use occupancy_report::provider::http::HttpOccupancyProvider;
use occupancy_report::report::service::ReportService;
use occupancy_report::state::AppState;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config::config_path();
    let config = config::load_from_path(&config_path)?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = %config_path.display(),
        app = %config.app.name,
        "occupancy-report starting"
    );

    let provider = build_provider(&config)?;
    let state = Arc::new(RwLock::new(AppState::new()));
    let service = ReportService::new(provider, Arc::clone(&state), config.display_offset_hours());
    let app = api::router(ApiContext {
        service,
        default_zone: config.default_zone().to_string(),
    });

    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        default_zone = config.default_zone(),
        display_offset_hours = config.display_offset_hours(),
        "API server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Upstream HTTP API when configured, otherwise the fixture file (or nothing).
fn build_provider(
    config: &Config,
) -> Result<Arc<dyn OccupancyProvider>, Box<dyn std::error::Error>> {
    if let Some(base_url) = config.upstream_base_url() {
        let provider = HttpOccupancyProvider::new(
            base_url,
            config.upstream_path(),
            config.upstream_timeout(),
            config.upstream_api_token(),
        )?;
        tracing::info!(endpoint = provider.endpoint(), "Using upstream occupancy API");
        return Ok(Arc::new(provider));
    }

    match config.fixture_path() {
        Some(path) => match FixedOccupancyProvider::from_payload_file(path) {
            Ok(provider) => {
                tracing::info!(
                    path = %path.display(),
                    records = provider.len(),
                    "Serving occupancy fixture"
                );
                Ok(Arc::new(provider))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load occupancy fixture, serving no data");
                Ok(Arc::new(FixedOccupancyProvider::default()))
            }
        },
        None => {
            tracing::warn!("No upstream configured in [upstream].base_url, serving no data");
            Ok(Arc::new(FixedOccupancyProvider::default()))
        }
    }
}
