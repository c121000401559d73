//! reqwest-backed [`OccupancyProvider`] for the upstream footfall API.

use crate::provider::{OccupancyProvider, ProviderError, records_from_payload};
use crate::report::aggregate::OccupancyRecord;
use crate::report::window::{ReportWindow, format_date};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

const BODY_SNIPPET_CHARS: usize = 256;

#[derive(Clone)]
pub struct HttpOccupancyProvider {
    endpoint: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl HttpOccupancyProvider {
    /// `base_url` and `path` are joined as-is; `path` should start with `/`.
    pub fn new(
        base_url: &str,
        path: &str,
        timeout: Duration,
        api_token: Option<String>,
    ) -> Result<Self, ProviderError> {
        let base = base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ProviderError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: format!("{base}{path}"),
            api_token,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for HttpOccupancyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpOccupancyProvider")
            .field("endpoint", &self.endpoint)
            .field("has_token", &self.api_token.is_some())
            .finish()
    }
}

#[async_trait]
impl OccupancyProvider for HttpOccupancyProvider {
    async fn fetch(&self, window: ReportWindow) -> Result<Vec<OccupancyRecord>, ProviderError> {
        let start = format_date(window.start());
        let end = format_date(window.end());
        debug!(endpoint = %self.endpoint, %start, %end, "Fetching occupancy records");

        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("start", start.as_str()), ("end", end.as_str())]);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
            warn!(status = status.as_u16(), "Upstream occupancy request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: snippet,
            });
        }

        let records = records_from_payload(&body)?;
        debug!(count = records.len(), "Upstream occupancy records received");
        Ok(records)
    }
}
