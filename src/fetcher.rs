use crate::config::SourceConfig;
use crate::error::{AppError, Result};
use crate::models::HourlyRequest;
use crate::parameter::wire_code;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Downloads hourly report pages from the monitoring network.
pub struct Fetcher {
    client: Client,
    base_url: String,
    query_type: String,
    max_retries: u32,
}

impl Fetcher {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(source.user_agent.as_str())
            .timeout(Duration::from_secs(source.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: source.base_url.clone(),
            query_type: source.query_type.clone(),
            max_retries: source.max_retries,
        })
    }

    /// Build the upstream query URL. The parameter is sent as its wire code.
    pub fn request_url(&self, request: &HourlyRequest) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::InvalidData(format!("Invalid base URL '{}': {}", self.base_url, e)))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("qtipo", &self.query_type)
                .append_pair("parametro", &wire_code(&request.parameter))
                .append_pair("anio", request.year.trim())
                .append_pair("qmes", request.month.trim());

            if let Some(day) = request.day.as_deref() {
                query.append_pair("dia", day.trim());
            }
            if let Some(hour) = request.hour {
                query.append_pair("hora", &hour.to_string());
            }
            if let Some(station) = request.station.as_deref() {
                query.append_pair("qestacion", station);
            }
        }

        Ok(url)
    }

    /// Fetch the raw markup for `request`, retrying transient failures.
    pub async fn fetch_markup(&self, request: &HourlyRequest) -> Result<String> {
        let url = self.request_url(request)?;
        debug!("Fetching hourly report from {}", url);

        let markup = retry_with_backoff(self.max_retries, || async {
            let response = self.client.get(url.clone()).send().await?;
            let response = response.error_for_status()?;
            Ok(response.text().await?)
        })
        .await?;

        info!(
            "Fetched {} bytes for {} {}-{}",
            markup.len(),
            request.parameter,
            request.year,
            request.month
        );
        Ok(markup)
    }
}

/// Retry a future with exponential backoff
/// Base delay before the first retry; doubles on each further attempt.
const RETRY_BASE_DELAY_MS: u64 = 250;

/// Timeouts, refused connections, 5xx responses and I/O failures are worth
/// another attempt; 4xx responses and parse errors are not.
fn is_transient(error: &AppError) -> bool {
    match error {
        AppError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        AppError::Io(_) => true,
        _ => false,
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(1 << attempt.saturating_sub(1).min(16)))
}

async fn retry_with_backoff<F, Fut, T>(max_retries: u32, mut attempt_fn: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        let error = match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        attempt += 1;
        if attempt > max_retries || !is_transient(&error) {
            return Err(error);
        }

        let delay = backoff_delay(attempt);
        warn!(
            "Hourly report request failed ({}), retry {}/{} in {:?}",
            error, attempt, max_retries, delay
        );
        tokio::time::sleep(delay).await;
    }
}
