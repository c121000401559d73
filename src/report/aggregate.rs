//! Zone occupancy aggregation.
//!
//! Turns raw upstream records into the summary a chart needs: the mean
//! occupancy percentage for a pie chart, or a per-hour series for a line
//! chart labelled in both the source (UTC) and display time base.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Hours added to the source (UTC) hour to obtain the display hour.
pub const DEFAULT_DISPLAY_OFFSET_HOURS: i32 = 8;
/// Axis ceiling reported when there is nothing to plot.
pub const DEFAULT_DISPLAY_CEILING: u32 = 50;
/// Headroom factor applied to the largest hourly value.
pub const CEILING_HEADROOM: f64 = 1.2;

/// A single upstream occupancy reading for one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyRecord {
    pub zone_name: String,
    /// `None` when the upstream entry had no usable timestamp.
    pub timestamp_utc: Option<OffsetDateTime>,
    pub occupancy_count: i64,
    pub occupancy_percentage: f64,
    pub max_capacity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateMode {
    Hourly,
    Summary,
}

impl AggregateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateMode::Hourly => "hourly",
            AggregateMode::Summary => "summary",
        }
    }
}

impl fmt::Display for AggregateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(AggregateMode::Hourly),
            "summary" => Ok(AggregateMode::Summary),
            other => Err(format!("unknown aggregate mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourBucket {
    pub source_hour: u8,
    pub display_hour: u8,
    pub value: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSummary {
    pub average_percentage: f64,
    pub max_capacity: u32,
    /// Ordered by source hour. Hours without data are absent, not zero.
    pub series: Vec<HourBucket>,
    pub display_ceiling: u32,
}

impl AggregateSummary {
    pub fn empty() -> Self {
        Self {
            average_percentage: 0.0,
            max_capacity: 0,
            series: Vec::new(),
            display_ceiling: DEFAULT_DISPLAY_CEILING,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty() && self.max_capacity == 0 && self.average_percentage == 0.0
    }
}

impl Default for AggregateSummary {
    fn default() -> Self {
        Self::empty()
    }
}

pub fn aggregate(
    records: &[OccupancyRecord],
    zone_filter: &str,
    mode: AggregateMode,
) -> AggregateSummary {
    aggregate_with_offset(records, zone_filter, mode, DEFAULT_DISPLAY_OFFSET_HOURS)
}

pub fn aggregate_with_offset(
    records: &[OccupancyRecord],
    zone_filter: &str,
    mode: AggregateMode,
    display_offset_hours: i32,
) -> AggregateSummary {
    let matching: Vec<&OccupancyRecord> = records
        .iter()
        .filter(|record| record.zone_name == zone_filter)
        .collect();

    if matching.is_empty() {
        return AggregateSummary::empty();
    }

    let max_capacity = last_reported_capacity(&matching);
    let average_percentage = mean_percentage(&matching);

    match mode {
        AggregateMode::Summary => AggregateSummary {
            average_percentage,
            max_capacity,
            series: Vec::new(),
            display_ceiling: DEFAULT_DISPLAY_CEILING,
        },
        AggregateMode::Hourly => {
            let series = hourly_series(&matching, display_offset_hours);
            AggregateSummary {
                average_percentage,
                max_capacity,
                display_ceiling: display_ceiling(&series),
                series,
            }
        }
    }
}

// Last-write-wins rather than a true maximum; zero means "not reported".
fn last_reported_capacity(records: &[&OccupancyRecord]) -> u32 {
    records
        .iter()
        .map(|record| record.max_capacity)
        .filter(|capacity| *capacity != 0)
        .last()
        .unwrap_or(0)
}

fn mean_percentage(records: &[&OccupancyRecord]) -> f64 {
    let (sum, count) = records
        .iter()
        .fold((0.0_f64, 0_u32), |(sum, count), record| {
            (sum + record.occupancy_percentage, count + 1)
        });
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

fn hourly_series(records: &[&OccupancyRecord], display_offset_hours: i32) -> Vec<HourBucket> {
    let mut buckets: BTreeMap<u8, u32> = BTreeMap::new();

    for record in records {
        let Some(timestamp) = record.timestamp_utc else {
            continue;
        };
        let source_hour = timestamp.to_offset(time::UtcOffset::UTC).hour();
        // Same source hour overwrites: the latest record wins.
        buckets.insert(source_hour, clamp_count(record.occupancy_count));
    }

    buckets
        .into_iter()
        .map(|(source_hour, value)| HourBucket {
            source_hour,
            display_hour: to_display_hour(source_hour, display_offset_hours),
            value: Some(value),
        })
        .collect()
}

fn clamp_count(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

/// Convert a source-time hour to the display time base.
pub fn to_display_hour(source_hour: u8, offset_hours: i32) -> u8 {
    (i32::from(source_hour) + offset_hours).rem_euclid(24) as u8
}

/// Suggested y-axis bound for a series: 20% headroom over the peak.
pub fn display_ceiling(series: &[HourBucket]) -> u32 {
    if series.is_empty() {
        return DEFAULT_DISPLAY_CEILING;
    }
    let peak = series
        .iter()
        .filter_map(|bucket| bucket.value)
        .max()
        .unwrap_or(0);
    (f64::from(peak) * CEILING_HEADROOM).ceil() as u32
}
