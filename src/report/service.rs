use crate::error::AppError;
use crate::provider::OccupancyProvider;
use crate::report::aggregate::{AggregateSummary, OccupancyRecord, aggregate_with_offset};
use crate::state::{AppState, ReportSelection, ReportSnapshot};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Resolves, fetches and aggregates reports, publishing them on [`AppState`].
#[derive(Debug, Clone)]
pub struct ReportService {
    provider: Arc<dyn OccupancyProvider>,
    state: Arc<RwLock<AppState>>,
    display_offset_hours: i32,
}

impl ReportService {
    pub fn new(
        provider: Arc<dyn OccupancyProvider>,
        state: Arc<RwLock<AppState>>,
        display_offset_hours: i32,
    ) -> Self {
        Self {
            provider,
            state,
            display_offset_hours,
        }
    }

    pub fn state(&self) -> &Arc<RwLock<AppState>> {
        &self.state
    }

    /// Run one fetch for `selection` and return its report. The report only
    /// becomes the published latest one if no newer request started meanwhile.
    pub async fn refresh(&self, selection: ReportSelection) -> Result<ReportSnapshot, AppError> {
        self.refresh_at(selection, SystemTime::now()).await
    }

    async fn refresh_at(
        &self,
        selection: ReportSelection,
        generated_at: SystemTime,
    ) -> Result<ReportSnapshot, AppError> {
        let window = selection.window();
        let ticket = {
            let mut guard = self.state.write().map_err(|_| AppError::StateLock)?;
            guard.begin_request()
        };
        debug!(
            generation = ticket.generation(),
            zone = %selection.zone,
            granularity = %selection.granularity,
            start = %window.start(),
            end = %window.end(),
            "Report refresh started"
        );

        let records = match self.provider.fetch(window).await {
            Ok(records) => records,
            Err(err) => {
                warn!(generation = ticket.generation(), error = %err, "Occupancy fetch failed");
                let mut guard = self.state.write().map_err(|_| AppError::StateLock)?;
                if !guard.fail_request(ticket, err.to_string()) {
                    debug!(generation = ticket.generation(), "Stale failure not recorded");
                }
                return Err(AppError::Provider(err));
            }
        };

        let summary = self.summarize(&selection, &records);
        let snapshot = ReportSnapshot {
            generation: ticket.generation(),
            selection,
            window,
            summary,
            generated_at,
        };

        let published = {
            let mut guard = self.state.write().map_err(|_| AppError::StateLock)?;
            guard.complete_request(ticket, snapshot.clone())
        };
        if !published {
            info!(
                generation = snapshot.generation,
                zone = %snapshot.selection.zone,
                "Newer request in flight, report not published"
            );
            return Ok(snapshot);
        }

        info!(
            generation = snapshot.generation,
            zone = %snapshot.selection.zone,
            records = records.len(),
            average_percentage = snapshot.summary.average_percentage,
            buckets = snapshot.summary.series.len(),
            "Report published"
        );
        Ok(snapshot)
    }

    fn summarize(
        &self,
        selection: &ReportSelection,
        records: &[OccupancyRecord],
    ) -> AggregateSummary {
        let summary = aggregate_with_offset(
            records,
            &selection.zone,
            selection.mode,
            self.display_offset_hours,
        );
        if summary.is_empty() {
            debug!(zone = %selection.zone, "No records matched zone");
        }
        summary
    }
}
