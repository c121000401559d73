use crate::report::aggregate::{AggregateMode, AggregateSummary};
use crate::report::window::{Granularity, ReportWindow, resolve_selection};
use std::time::SystemTime;
use time::Date;

/// What the caller currently wants to look at.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSelection {
    pub reference_date: Date,
    pub granularity: Granularity,
    pub zone: String,
    pub mode: AggregateMode,
    pub custom_start: Option<Date>,
    pub custom_end: Option<Date>,
}

impl ReportSelection {
    pub fn new(
        reference_date: Date,
        granularity: Granularity,
        zone: impl Into<String>,
        mode: AggregateMode,
    ) -> Self {
        Self {
            reference_date,
            granularity,
            zone: zone.into(),
            mode,
            custom_start: None,
            custom_end: None,
        }
    }

    pub fn with_custom_range(mut self, start: Option<Date>, end: Option<Date>) -> Self {
        self.custom_start = start;
        self.custom_end = end;
        self
    }

    pub fn window(&self) -> ReportWindow {
        resolve_selection(
            self.reference_date,
            self.granularity,
            self.custom_start,
            self.custom_end,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSnapshot {
    pub generation: u64,
    pub selection: ReportSelection,
    pub window: ReportWindow,
    pub summary: AggregateSummary,
    pub generated_at: SystemTime,
}

/// Issued when a fetch starts; only the newest ticket may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
}

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Pending { generation: u64 },
    Ok,
    Failed { message: String },
}

/// Latest published report and fetch status shared by every client.
#[derive(Debug)]
pub struct AppState {
    latest_generation: u64,
    report: Option<ReportSnapshot>,
    fetch_status: FetchStatus,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            latest_generation: 0,
            report: None,
            fetch_status: FetchStatus::Idle,
        }
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest_generation
    }

    pub fn report(&self) -> Option<&ReportSnapshot> {
        self.report.as_ref()
    }

    pub fn fetch_status(&self) -> &FetchStatus {
        &self.fetch_status
    }

    /// Hand out the ticket that supersedes every request still in flight.
    pub fn begin_request(&mut self) -> RequestTicket {
        self.latest_generation += 1;
        self.fetch_status = FetchStatus::Pending {
            generation: self.latest_generation,
        };
        RequestTicket {
            generation: self.latest_generation,
        }
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.generation == self.latest_generation
    }

    /// Publish `snapshot` as the latest report if `ticket` is still the
    /// newest request. Returns whether it was published.
    pub fn complete_request(&mut self, ticket: RequestTicket, snapshot: ReportSnapshot) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.report = Some(snapshot);
        self.fetch_status = FetchStatus::Ok;
        true
    }

    /// Record a failed fetch; the previous report stays visible. A stale
    /// failure leaves the newer status alone.
    pub fn fail_request(&mut self, ticket: RequestTicket, message: String) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.fetch_status = FetchStatus::Failed { message };
        true
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
