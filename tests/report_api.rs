use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use async_trait::async_trait;
use occupancy_report::api::{self, ApiContext};
use occupancy_report::provider::fixed::FixedOccupancyProvider;
use occupancy_report::provider::{OccupancyProvider, ProviderError};
use occupancy_report::report::{OccupancyRecord, ReportWindow};
use occupancy_report::report::service::ReportService;
use occupancy_report::state::AppState;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use time::macros::datetime;
use tokio::sync::Notify;
use tower::ServiceExt;

fn record(zone: &str, timestamp: time::OffsetDateTime, count: i64, pct: f64) -> OccupancyRecord {
    OccupancyRecord {
        zone_name: zone.to_string(),
        timestamp_utc: Some(timestamp),
        occupancy_count: count,
        occupancy_percentage: pct,
        max_capacity: 120,
    }
}

fn app() -> Router {
    let provider = FixedOccupancyProvider::new(vec![
        record("Main-Entrance", datetime!(2024-03-13 20:00 UTC), 10, 10.0),
        record("Main-Entrance", datetime!(2024-03-13 21:00 UTC), 25, 30.0),
        record("Main-Entrance", datetime!(2024-03-13 23:00 UTC), -5, 0.0),
        record("Side-Door", datetime!(2024-03-13 21:00 UTC), 3, 80.0),
        record("Main-Entrance", datetime!(2024-04-01 09:00 UTC), 99, 99.0),
    ]);
    let state = Arc::new(RwLock::new(AppState::new()));
    api::router(ApiContext {
        service: ReportService::new(Arc::new(provider), state, 8),
        default_zone: "Main-Entrance".to_string(),
    })
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

#[tokio::test]
async fn summary_report_for_week_averages_default_zone() {
    let app = app();

    let (status, body) = get_json(&app, "/api/report?date=2024-03-13&granularity=week").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zone"], "Main-Entrance");
    assert_eq!(body["mode"], "summary");
    assert_eq!(body["window"]["start"], "2024-03-10");
    assert_eq!(body["window"]["end"], "2024-03-16");
    assert_eq!(body["window"]["days"], 7);
    let average = body["average_percentage"].as_f64().expect("average");
    assert!((average - 40.0 / 3.0).abs() < 1e-9);
    assert_eq!(body["max_capacity"], 120);
    assert_eq!(body["display_ceiling"], 50);
    assert_eq!(body["series"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn hourly_report_lists_source_and_display_hours() {
    let app = app();

    let (status, body) = get_json(
        &app,
        "/api/report?date=2024-03-13&granularity=day&mode=hourly&zone=Main-Entrance",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let series = body["series"].as_array().expect("series array");
    let hours: Vec<(u64, u64, u64)> = series
        .iter()
        .map(|point| {
            (
                point["source_hour"].as_u64().expect("source hour"),
                point["display_hour"].as_u64().expect("display hour"),
                point["value"].as_u64().expect("value"),
            )
        })
        .collect();
    assert_eq!(hours, vec![(20, 4, 10), (21, 5, 25), (23, 7, 0)]);
    assert_eq!(series[0]["label"], "20:00 (04:00)");
    assert_eq!(body["display_ceiling"], 30);
    let average = body["average_percentage"].as_f64().expect("average");
    assert!((average - 40.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn unknown_zone_yields_zero_summary() {
    let app = app();

    let (status, body) = get_json(&app, "/api/report?date=2024-03-13&zone=Atrium").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["average_percentage"], 0.0);
    assert_eq!(body["max_capacity"], 0);
    assert_eq!(body["display_ceiling"], 50);
}

#[tokio::test]
async fn invalid_granularity_is_bad_request() {
    let app = app();

    let (status, body) = get_json(&app, "/api/report?date=2024-03-13&granularity=year").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_QUERY");
}

#[tokio::test]
async fn latest_report_follows_most_recent_refresh() {
    let app = app();

    let (status, _) = get_json(&app, "/api/report/latest").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    get_json(&app, "/api/report?date=2024-03-13&zone=Side-Door").await;
    let (status, body) = get_json(&app, "/api/report/latest").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zone"], "Side-Door");
    assert_eq!(body["generation"], 1);
    assert_eq!(body["average_percentage"], 80.0);
}

#[tokio::test]
async fn window_endpoint_resolves_month_and_custom_ranges() {
    let app = app();

    let (status, body) = get_json(&app, "/api/window?date=2024-02-15&granularity=month").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start"], "2024-02-01");
    assert_eq!(body["end"], "2024-02-29");
    assert_eq!(body["days"], 29);

    let (status, body) = get_json(
        &app,
        "/api/window?granularity=custom&start=2024-03-20&end=2024-03-01",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start"], "2024-03-01");
    assert_eq!(body["end"], "2024-03-20");
}

#[tokio::test]
async fn health_is_ok_before_any_fetch() {
    let app = app();

    let (status, body) = get_json(&app, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body.get("last_error").is_none());
}

/// Holds the first fetch until released; later fetches pass straight through.
#[derive(Debug)]
struct FirstFetchGate {
    gate: Arc<Notify>,
    held: AtomicBool,
    inner: FixedOccupancyProvider,
}

#[async_trait]
impl OccupancyProvider for FirstFetchGate {
    async fn fetch(&self, window: ReportWindow) -> Result<Vec<OccupancyRecord>, ProviderError> {
        if !self.held.swap(true, Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.inner.fetch(window).await
    }
}

#[tokio::test]
async fn concurrent_clients_each_receive_their_own_report() {
    let gate = Arc::new(Notify::new());
    let provider = FirstFetchGate {
        gate: Arc::clone(&gate),
        held: AtomicBool::new(false),
        inner: FixedOccupancyProvider::new(vec![
            record("Hall", datetime!(2024-03-13 10:00 UTC), 4, 70.0),
            record("Lobby", datetime!(2024-03-13 10:00 UTC), 2, 50.0),
        ]),
    };
    let state = Arc::new(RwLock::new(AppState::new()));
    let app = api::router(ApiContext {
        service: ReportService::new(Arc::new(provider), Arc::clone(&state), 8),
        default_zone: "Hall".to_string(),
    });

    let slow = tokio::spawn({
        let app = app.clone();
        async move { get_json(&app, "/api/report?date=2024-03-13&zone=Hall").await }
    });
    while state.read().expect("state lock").latest_generation() == 0 {
        tokio::task::yield_now().await;
    }

    let (status, lobby) = get_json(&app, "/api/report?date=2024-03-13&zone=Lobby").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lobby["zone"], "Lobby");
    assert_eq!(lobby["average_percentage"], 50.0);

    gate.notify_one();
    let (status, hall) = slow.await.expect("join slow request");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hall["zone"], "Hall");
    assert_eq!(hall["average_percentage"], 70.0);

    let (_, latest) = get_json(&app, "/api/report/latest").await;
    assert_eq!(latest["zone"], "Lobby");
    assert_eq!(latest["generation"], 2);
}
