use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ReportSuccessResponse {
    pub zone: String,
    pub granularity: String,
    pub mode: String,
    pub window: WindowBody,
    pub average_percentage: f64,
    pub max_capacity: u32,
    pub display_ceiling: u32,
    pub series: Vec<SeriesPoint>,
    pub generation: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WindowBody {
    pub start: String,
    pub end: String,
    pub days: i64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SeriesPoint {
    pub source_hour: u8,
    pub display_hour: u8,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReportErrorResponse {
    pub error_code: ReportErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportErrorCode {
    InvalidQuery,
    UpstreamError,
    NoData,
    InternalError,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub timestamp: String,
}
