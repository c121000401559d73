//! Upstream sources of raw occupancy records.
//!
//! The aggregation core never talks to the network itself; it receives a
//! flat list of [`OccupancyRecord`]s for a [`ReportWindow`] from an
//! [`OccupancyProvider`].

use crate::report::aggregate::OccupancyRecord;
use crate::report::window::ReportWindow;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

pub mod fixed;
pub mod http;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to read fixture: {0}")]
    Read(#[from] std::io::Error),
}

#[async_trait]
pub trait OccupancyProvider: Send + Sync + std::fmt::Debug {
    /// Fetch every record whose date falls inside `window`.
    async fn fetch(&self, window: ReportWindow) -> Result<Vec<OccupancyRecord>, ProviderError>;
}

/// One entry of the upstream zone → entries mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamEntry {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub occupancy_count: i64,
    #[serde(default)]
    pub occupancy_percentage: f64,
    #[serde(default)]
    pub max_capacity: u32,
}

/// Flatten an upstream payload into records, zone by zone in payload order.
pub fn records_from_payload(body: &str) -> Result<Vec<OccupancyRecord>, ProviderError> {
    // `preserve_order` keeps zones in payload order.
    let zones: serde_json::Map<String, serde_json::Value> = serde_json::from_str(body)?;
    let mut records = Vec::new();
    for (zone_name, entries) in zones {
        let entries: Vec<UpstreamEntry> = serde_json::from_value(entries)?;
        for entry in entries {
            records.push(record_from_entry(&zone_name, entry));
        }
    }
    Ok(records)
}

fn record_from_entry(zone_name: &str, entry: UpstreamEntry) -> OccupancyRecord {
    let timestamp_utc = entry.timestamp.as_deref().and_then(|raw| {
        match OffsetDateTime::parse(raw, &Rfc3339) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                debug!(zone = zone_name, timestamp = raw, error = %err, "Unparseable timestamp");
                None
            }
        }
    });

    OccupancyRecord {
        zone_name: zone_name.to_string(),
        timestamp_utc,
        occupancy_count: entry.occupancy_count,
        occupancy_percentage: entry.occupancy_percentage,
        max_capacity: entry.max_capacity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn payload_is_flattened_in_document_order() -> Result<(), ProviderError> {
        let body = r#"{
            "Side-Door": [
                {"timestamp": "2024-03-13T09:00:00Z", "occupancy_count": 4, "occupancy_percentage": 10.0, "max_capacity": 40}
            ],
            "Main-Entrance": [
                {"timestamp": "2024-03-13T10:00:00Z", "occupancy_count": 12, "occupancy_percentage": 30.5, "max_capacity": 120},
                {"timestamp": "2024-03-13T11:00:00+08:00", "occupancy_count": -2, "occupancy_percentage": 0.0, "max_capacity": 120}
            ]
        }"#;

        let records = records_from_payload(body)?;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].zone_name, "Side-Door");
        assert_eq!(records[1].zone_name, "Main-Entrance");
        assert_eq!(
            records[1].timestamp_utc,
            Some(datetime!(2024-03-13 10:00 UTC))
        );
        assert_eq!(records[1].occupancy_percentage, 30.5);
        assert_eq!(records[2].occupancy_count, -2);
        assert_eq!(
            records[2].timestamp_utc,
            Some(datetime!(2024-03-13 03:00 UTC))
        );
        Ok(())
    }

    #[test]
    fn missing_or_bad_timestamps_become_none() -> Result<(), ProviderError> {
        let body = r#"{
            "Hall": [
                {"occupancy_count": 1, "occupancy_percentage": 5.0},
                {"timestamp": null, "occupancy_count": 2},
                {"timestamp": "yesterday", "occupancy_count": 3}
            ]
        }"#;

        let records = records_from_payload(body)?;

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.timestamp_utc.is_none()));
        assert_eq!(records[0].max_capacity, 0);
        assert_eq!(records[1].occupancy_percentage, 0.0);
        Ok(())
    }

    #[test]
    fn malformed_zone_entries_are_a_decode_error() {
        let result = records_from_payload(r#"{"Hall": {"occupancy_count": 1}}"#);

        assert!(matches!(result, Err(ProviderError::Decode(_))));
    }

    #[test]
    fn non_object_payload_is_a_decode_error() {
        let result = records_from_payload("[1, 2, 3]");

        assert!(matches!(result, Err(ProviderError::Decode(_))));
    }
}
