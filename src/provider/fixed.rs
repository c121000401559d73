use crate::provider::{OccupancyProvider, ProviderError, records_from_payload};
use crate::report::aggregate::OccupancyRecord;
use crate::report::window::ReportWindow;
use async_trait::async_trait;
use std::path::Path;
use time::UtcOffset;

/// In-memory provider serving a fixed record set.
///
/// Timestamped records are filtered to the requested window; records
/// without a timestamp are always returned, matching an upstream that
/// cannot tell when they were taken.
#[derive(Debug, Clone, Default)]
pub struct FixedOccupancyProvider {
    records: Vec<OccupancyRecord>,
}

impl FixedOccupancyProvider {
    pub fn new(records: Vec<OccupancyRecord>) -> Self {
        Self { records }
    }

    /// Load records from a JSON file in the upstream wire format.
    pub fn from_payload_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::new(records_from_payload(&contents)?))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl OccupancyProvider for FixedOccupancyProvider {
    async fn fetch(&self, window: ReportWindow) -> Result<Vec<OccupancyRecord>, ProviderError> {
        Ok(self
            .records
            .iter()
            .filter(|record| {
                record.timestamp_utc.is_none_or(|timestamp| {
                    window.contains(timestamp.to_offset(UtcOffset::UTC).date())
                })
            })
            .cloned()
            .collect())
    }
}
