//! Report window resolution, occupancy aggregation and the fetch pipeline
//! that ties them to an upstream provider.

pub mod aggregate;
pub mod service;
pub mod window;

pub use aggregate::{
    AggregateMode, AggregateSummary, HourBucket, OccupancyRecord, aggregate, aggregate_with_offset,
};
pub use window::{Granularity, ReportWindow, resolve_window};
