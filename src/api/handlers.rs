use crate::api::ApiContext;
use crate::api::responses::{
    HealthStatus, HealthSuccessResponse, ReportErrorCode, ReportErrorResponse,
    ReportSuccessResponse, SeriesPoint, WindowBody,
};
use crate::error::AppError;
use crate::report::aggregate::{AggregateMode, HourBucket};
use crate::report::window::{
    Granularity, ReportWindow, WindowError, format_date, parse_date, resolve_selection,
};
use crate::state::{AppState, FetchStatus, ReportSelection, ReportSnapshot};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub date: Option<String>,
    pub granularity: Option<String>,
    pub zone: Option<String>,
    pub mode: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub date: Option<String>,
    pub granularity: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

pub enum ReportResponse {
    Success(ReportSuccessResponse),
    Error {
        status: StatusCode,
        body: ReportErrorResponse,
    },
}

impl IntoResponse for ReportResponse {
    fn into_response(self) -> Response {
        match self {
            ReportResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            ReportResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_report(
    State(context): State<ApiContext>,
    Query(query): Query<ReportQuery>,
) -> impl IntoResponse {
    let selection = match selection_from_query(&query, &context.default_zone, today_utc()) {
        Ok(selection) => selection,
        Err(message) => return invalid_query(&message),
    };

    match context.service.refresh(selection).await {
        Ok(snapshot) => success_response(&snapshot),
        Err(AppError::Provider(err)) => report_error(
            StatusCode::BAD_GATEWAY,
            ReportErrorCode::UpstreamError,
            format!("Failed to fetch occupancy data: {err}"),
            SystemTime::now(),
        ),
        Err(AppError::StateLock) => internal_error("state lock poisoned during refresh"),
    }
}

pub async fn get_latest_report(State(context): State<ApiContext>) -> impl IntoResponse {
    build_latest_report_response(context.service.state(), SystemTime::now())
}

pub async fn get_window(Query(query): Query<WindowQuery>) -> impl IntoResponse {
    build_window_response(&query, today_utc(), SystemTime::now())
}

pub async fn get_health(State(context): State<ApiContext>) -> impl IntoResponse {
    build_health_response(context.service.state(), SystemTime::now())
}

fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

fn selection_from_query(
    query: &ReportQuery,
    default_zone: &str,
    today: Date,
) -> Result<ReportSelection, String> {
    let (reference_date, granularity, custom_start, custom_end) = parse_window_params(
        query.date.as_deref(),
        query.granularity.as_deref(),
        query.start.as_deref(),
        query.end.as_deref(),
        today,
    )
    .map_err(|err| err.to_string())?;

    let mode = match query.mode.as_deref() {
        Some(raw) => raw.parse::<AggregateMode>()?,
        None => AggregateMode::Summary,
    };
    let zone = query
        .zone
        .as_deref()
        .map(str::trim)
        .filter(|zone| !zone.is_empty())
        .unwrap_or(default_zone);

    Ok(
        ReportSelection::new(reference_date, granularity, zone, mode)
            .with_custom_range(custom_start, custom_end),
    )
}

type WindowParams = (Date, Granularity, Option<Date>, Option<Date>);

fn parse_window_params(
    date: Option<&str>,
    granularity: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
    today: Date,
) -> Result<WindowParams, WindowError> {
    let reference_date = date.map(parse_date).transpose()?.unwrap_or(today);
    let granularity = granularity
        .map(str::parse::<Granularity>)
        .transpose()?
        .unwrap_or(Granularity::Day);
    let custom_start = start.map(parse_date).transpose()?;
    let custom_end = end.map(parse_date).transpose()?;
    Ok((reference_date, granularity, custom_start, custom_end))
}

fn success_response(snapshot: &ReportSnapshot) -> ReportResponse {
    match format_timestamp(snapshot.generated_at) {
        Ok(timestamp) => ReportResponse::Success(ReportSuccessResponse {
            zone: snapshot.selection.zone.clone(),
            granularity: snapshot.selection.granularity.to_string(),
            mode: snapshot.selection.mode.to_string(),
            window: window_body(snapshot.window),
            average_percentage: snapshot.summary.average_percentage,
            max_capacity: snapshot.summary.max_capacity,
            display_ceiling: snapshot.summary.display_ceiling,
            series: snapshot.summary.series.iter().map(series_point).collect(),
            generation: snapshot.generation,
            timestamp,
        }),
        Err(_err) => internal_error("timestamp formatting failure"),
    }
}

fn window_body(window: ReportWindow) -> WindowBody {
    WindowBody {
        start: format_date(window.start()),
        end: format_date(window.end()),
        days: window.days(),
    }
}

fn series_point(bucket: &HourBucket) -> SeriesPoint {
    SeriesPoint {
        source_hour: bucket.source_hour,
        display_hour: bucket.display_hour,
        label: format!(
            "{:02}:00 ({:02}:00)",
            bucket.source_hour, bucket.display_hour
        ),
        value: bucket.value,
    }
}

fn build_latest_report_response(state: &Arc<RwLock<AppState>>, now: SystemTime) -> ReportResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return internal_error("state lock poisoned while reading report");
        }
    };
    let snapshot = guard.report().cloned();
    drop(guard);

    match snapshot {
        Some(snapshot) => success_response(&snapshot),
        None => report_error(
            StatusCode::SERVICE_UNAVAILABLE,
            ReportErrorCode::NoData,
            "No report has been generated yet".to_string(),
            now,
        ),
    }
}

fn build_window_response(query: &WindowQuery, today: Date, now: SystemTime) -> Response {
    let params = parse_window_params(
        query.date.as_deref(),
        query.granularity.as_deref(),
        query.start.as_deref(),
        query.end.as_deref(),
        today,
    );
    match params {
        Ok((reference, granularity, start, end)) => {
            let window = resolve_selection(reference, granularity, start, end);
            (StatusCode::OK, Json(window_body(window))).into_response()
        }
        Err(err) => report_error(
            StatusCode::BAD_REQUEST,
            ReportErrorCode::InvalidQuery,
            err.to_string(),
            now,
        )
        .into_response(),
    }
}

fn build_health_response(state: &Arc<RwLock<AppState>>, now: SystemTime) -> Response {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return internal_error("state lock poisoned while reading fetch status").into_response();
        }
    };
    let (status, last_error) = match guard.fetch_status() {
        FetchStatus::Failed { message } => (HealthStatus::Degraded, Some(message.clone())),
        FetchStatus::Idle | FetchStatus::Pending { .. } | FetchStatus::Ok => {
            (HealthStatus::Ok, None)
        }
    };
    drop(guard);

    match format_timestamp(now) {
        Ok(timestamp) => (
            StatusCode::OK,
            Json(HealthSuccessResponse {
                status,
                last_error,
                timestamp,
            }),
        )
            .into_response(),
        Err(_) => internal_error("timestamp formatting failure").into_response(),
    }
}

fn invalid_query(message: &str) -> ReportResponse {
    warn!(message = message, "Rejected report query");
    report_error(
        StatusCode::BAD_REQUEST,
        ReportErrorCode::InvalidQuery,
        message.to_string(),
        SystemTime::now(),
    )
}

fn report_error(
    status: StatusCode,
    error_code: ReportErrorCode,
    error_message: String,
    timestamp: SystemTime,
) -> ReportResponse {
    match format_timestamp(timestamp) {
        Ok(formatted) => ReportResponse::Error {
            status,
            body: ReportErrorResponse {
                error_code,
                error_message,
                timestamp: formatted,
            },
        },
        Err(_err) => internal_error("timestamp formatting failure"),
    }
}

fn internal_error(message: &str) -> ReportResponse {
    error!(message = message, "Internal error while handling report request");
    let formatted = format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        "1970-01-01T00:00:00Z".to_string()
    });
    ReportResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ReportErrorResponse {
            error_code: ReportErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: formatted,
        },
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}
