//! Collects current observations for a set of known stations.
//!
//! Fetches run in bounded concurrent batches so one slow upstream cannot
//! serialise the whole cycle, and every per-station fetch is isolated: a
//! failure or malformed feed drops that station only, never the batch.

use crate::readings::error::ReadingError;
use crate::readings::parse::parse_realtime;
use crate::types::reading::Reading;
use crate::types::station::Station;
use futures_util::{stream, StreamExt};
use log::{debug, info};
use reqwest::Client;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Default realtime observation feed.
pub const DEFAULT_REALTIME_URL: &str = "https://www.ndbc.noaa.gov/data/realtime2";

/// How many station fetches may be in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 20;

pub struct ReadingCollector {
    base_url: String,
    http: Client,
    concurrency: usize,
}

impl ReadingCollector {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_REALTIME_URL)
    }

    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        ReadingCollector {
            base_url: base_url.into(),
            http,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Fetch the current reading for every station, keeping only successes.
    ///
    /// When the same station appears more than once in `stations`, the most
    /// recently observed reading wins; exact `(station, observed_at)`
    /// duplicates are left for the store's ignore-duplicates upsert to
    /// collapse. The result is sorted by station id so repeated runs over the
    /// same inputs are comparable.
    pub async fn collect(&self, stations: &[Station]) -> Vec<Reading> {
        let results: Vec<Result<Reading, ReadingError>> = stream::iter(stations)
            .map(|station| self.fetch_station(station))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut successes = Vec::with_capacity(results.len());
        let mut failures = 0usize;
        for result in results {
            match result {
                Ok(reading) => successes.push(reading),
                Err(err) => {
                    failures += 1;
                    debug!("skipping station: {err}");
                }
            }
        }

        let readings = keep_latest_per_station(successes);
        info!(
            "collected {} readings from {} stations ({} failed)",
            readings.len(),
            stations.len(),
            failures
        );
        readings
    }

    async fn fetch_station(&self, station: &Station) -> Result<Reading, ReadingError> {
        let url = format!("{}/{}.txt", self.base_url, station.id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ReadingError::NetworkRequest(url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    ReadingError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    ReadingError::NetworkRequest(url, e)
                });
            }
        };
        let body = response
            .text()
            .await
            .map_err(|e| ReadingError::BodyRead(url, e))?;
        parse_realtime(station, &body)
    }
}

/// Collapse duplicate stations to their most recently observed reading,
/// sorted by station id so repeated cycles over the same inputs compare
/// equal. Exact `(station, observed_at)` ties are not resolved here; the
/// store's ignore-duplicates upsert collapses those.
fn keep_latest_per_station(readings: Vec<Reading>) -> Vec<Reading> {
    let mut latest: HashMap<String, Reading> = HashMap::with_capacity(readings.len());
    for reading in readings {
        match latest.entry(reading.station_id.clone()) {
            Entry::Occupied(mut slot) => {
                if reading.observed_at > slot.get().observed_at {
                    slot.insert(reading);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(reading);
            }
        }
    }
    let mut result: Vec<Reading> = latest.into_values().collect();
    result.sort_by(|a, b| a.station_id.cmp(&b.station_id));
    result
}
