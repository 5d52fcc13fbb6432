//! Fetches, parses and caches the canonical list of observation stations.
//!
//! The registry fails soft: if the upstream feed is unreachable, the last
//! good list keeps being served even past its TTL, and a fresh process falls
//! back to an on-disk snapshot of the previous run before resorting to an
//! empty list. Callers therefore never see an error from [`get_stations`],
//! only a possibly-stale or possibly-empty list.
//!
//! [`get_stations`]: StationRegistry::get_stations

use crate::cache::{CacheEntry, Clock, SystemClock};
use crate::stations::error::RegistryError;
use crate::types::station::{Capability, Station, StationType};
use bincode::config::{Configuration, Fixint, LittleEndian};
use chrono::Duration;
use log::{debug, info, warn};
use parking_lot::RwLock;
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default active-stations feed.
pub const DEFAULT_STATIONS_URL: &str = "https://www.ndbc.noaa.gov/activestations.xml";

/// Registry refresh interval. The station population changes on the scale of
/// weeks, so a day-old list is still authoritative.
pub const REGISTRY_TTL_HOURS: i64 = 24;

const SNAPSHOT_FILE_NAME: &str = "active_stations.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Singleton cache of the active-station list.
pub struct StationRegistry {
    url: String,
    http: Client,
    ttl: Duration,
    snapshot_path: Option<PathBuf>,
    cached: RwLock<Option<CacheEntry<Vec<Station>>>>,
    refresh_gate: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl StationRegistry {
    /// Registry against the default feed, with an optional directory for the
    /// on-disk snapshot.
    pub fn new(http: Client, cache_dir: Option<&Path>) -> Self {
        Self::custom(
            http,
            DEFAULT_STATIONS_URL.to_string(),
            Duration::hours(REGISTRY_TTL_HOURS),
            cache_dir,
            Arc::new(SystemClock),
        )
    }

    /// Fully-parameterised constructor, used by tests and alternate feeds.
    pub fn custom(
        http: Client,
        url: String,
        ttl: Duration,
        cache_dir: Option<&Path>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        StationRegistry {
            url,
            http,
            ttl,
            snapshot_path: cache_dir.map(|d| d.join(SNAPSHOT_FILE_NAME)),
            cached: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            clock,
        }
    }

    /// The current station list. Never fails: a refresh error degrades to the
    /// last good list (memory or disk snapshot, even stale), or an empty list
    /// if nothing has ever been fetched.
    pub async fn get_stations(&self) -> Vec<Station> {
        if let Some(stations) = self.fresh_from_memory() {
            return stations;
        }

        // One refresh at a time; concurrent misses wait here and then re-check
        // instead of racing duplicate fetches.
        let _gate = self.refresh_gate.lock().await;
        if let Some(stations) = self.fresh_from_memory() {
            return stations;
        }

        if self.cached.read().is_none() {
            if let Some(entry) = self.load_snapshot().await {
                let fresh = entry.is_fresh(self.clock.now(), self.ttl);
                let stations = entry.value.clone();
                *self.cached.write() = Some(entry);
                if fresh {
                    debug!("serving {} stations from disk snapshot", stations.len());
                    return stations;
                }
            }
        }

        match self.refresh().await {
            Ok(stations) => stations,
            Err(err) => {
                warn!("station refresh failed: {err}");
                match self.cached.read().as_ref() {
                    Some(entry) => {
                        info!("serving stale station list ({} stations)", entry.value.len());
                        entry.value.clone()
                    }
                    None => Vec::new(),
                }
            }
        }
    }

    /// Stations with valid coordinates, the map-facing subset.
    pub async fn map_stations(&self) -> Vec<Station> {
        self.get_stations()
            .await
            .into_iter()
            .filter(Station::has_valid_coordinates)
            .collect()
    }

    /// Stations whose classified type is in `types`.
    pub async fn stations_of_types(&self, types: &[StationType]) -> Vec<Station> {
        self.get_stations()
            .await
            .into_iter()
            .filter(|s| types.contains(&s.station_type))
            .collect()
    }

    /// Stations advertising the given sensor capability.
    pub async fn stations_with_capability(&self, capability: Capability) -> Vec<Station> {
        self.get_stations()
            .await
            .into_iter()
            .filter(|s| s.has_capability(capability))
            .collect()
    }

    async fn refresh(&self) -> Result<Vec<Station>, RegistryError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RegistryError::NetworkRequest(self.url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    RegistryError::HttpStatus {
                        url: self.url.clone(),
                        status,
                        source: e,
                    }
                } else {
                    RegistryError::NetworkRequest(self.url.clone(), e)
                });
            }
        };
        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::BodyRead(self.url.clone(), e))?;

        let stations = parse_active_stations(&body)?;
        info!("parsed {} stations from {}", stations.len(), self.url);

        let entry = CacheEntry::new(stations.clone(), self.clock.now());
        *self.cached.write() = Some(entry.clone());
        self.store_snapshot(&entry).await;
        Ok(stations)
    }

    fn fresh_from_memory(&self) -> Option<Vec<Station>> {
        let guard = self.cached.read();
        let entry = guard.as_ref()?;
        entry
            .is_fresh(self.clock.now(), self.ttl)
            .then(|| entry.value.clone())
    }

    async fn load_snapshot(&self) -> Option<CacheEntry<Vec<Station>>> {
        let path = self.snapshot_path.clone()?;
        if !path.exists() {
            return None;
        }
        let result = tokio::task::spawn_blocking(move || read_snapshot(&path)).await;
        match result {
            Ok(Ok(entry)) => Some(entry),
            Ok(Err(err)) => {
                warn!("failed to load registry snapshot: {err}");
                None
            }
            Err(err) => {
                warn!("snapshot load task failed: {err}");
                None
            }
        }
    }

    /// Best-effort: snapshot failures are logged, never propagated; the
    /// in-memory list is already up to date at this point.
    async fn store_snapshot(&self, entry: &CacheEntry<Vec<Station>>) {
        let Some(path) = self.snapshot_path.clone() else {
            return;
        };
        let entry = entry.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            bincode::serde::encode_to_vec(&entry, BINCODE_CONFIG)
                .map_err(|e| RegistryError::SnapshotEncode(Box::new(e)))
        })
        .await;
        match encoded {
            Ok(Ok(bytes)) => {
                if let Err(err) = tokio::fs::write(&path, &bytes).await {
                    warn!("failed to write registry snapshot to {}: {err}", path.display());
                } else {
                    debug!("wrote registry snapshot ({} bytes)", bytes.len());
                }
            }
            Ok(Err(err)) => warn!("failed to encode registry snapshot: {err}"),
            Err(err) => warn!("snapshot encode task failed: {err}"),
        }
    }
}

fn read_snapshot(path: &Path) -> Result<CacheEntry<Vec<Station>>, RegistryError> {
    let bytes =
        std::fs::read(path).map_err(|e| RegistryError::SnapshotRead(path.to_path_buf(), e))?;
    let (entry, _) =
        bincode::serde::decode_from_slice::<CacheEntry<Vec<Station>>, _>(&bytes, BINCODE_CONFIG)
            .map_err(|e| RegistryError::SnapshotDecode(path.to_path_buf(), Box::new(e)))?;
    Ok(entry)
}

#[derive(Debug, Deserialize)]
struct StationsDoc {
    #[serde(rename = "station", default)]
    stations: Vec<StationRecord>,
}

#[derive(Debug, Deserialize)]
struct StationRecord {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@lat")]
    lat: Option<String>,
    #[serde(rename = "@lon")]
    lon: Option<String>,
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@owner")]
    owner: Option<String>,
    #[serde(rename = "@type")]
    station_type: Option<String>,
    #[serde(rename = "@met")]
    met: Option<String>,
    #[serde(rename = "@currents")]
    currents: Option<String>,
    #[serde(rename = "@waterquality")]
    water_quality: Option<String>,
}

/// Parse the active-stations XML document. Individual malformed records
/// (missing id, unparsable coordinates) are dropped silently; only a document
/// that fails to parse at all is an error.
fn parse_active_stations(xml: &str) -> Result<Vec<Station>, RegistryError> {
    let doc: StationsDoc = from_str(xml)?;

    let mut stations = Vec::with_capacity(doc.stations.len());
    for record in doc.stations {
        let Some(id) = record.id.filter(|id| !id.is_empty()) else {
            continue;
        };
        let (Some(lat), Some(lon)) = (
            record.lat.as_deref().and_then(|v| v.parse::<f64>().ok()),
            record.lon.as_deref().and_then(|v| v.parse::<f64>().ok()),
        ) else {
            debug!("dropping station {id}: missing or non-numeric coordinates");
            continue;
        };

        let flag = |v: &Option<String>| v.as_deref() == Some("y");
        stations.push(Station {
            id,
            lat,
            lon,
            name: record.name.unwrap_or_default(),
            owner: record.owner.unwrap_or_default(),
            station_type: StationType::classify(record.station_type.as_deref().unwrap_or("")),
            has_met: flag(&record.met),
            has_currents: flag(&record.currents),
            has_water_quality: flag(&record.water_quality),
        });
    }
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_clock::ManualClock;
    use chrono::{TimeZone, Utc};

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<stations created="2024-06-01T12:00:00UTC" count="5">
  <station id="46026" lat="37.759" lon="-122.833" name="San Francisco" owner="NDBC" pgm="NDBC Meteorological/Ocean" type="Moored Buoy" met="y" currents="n" waterquality="n"/>
  <station id="46407" lat="42.682" lon="-128.952" name="SE Papa" owner="NDBC" pgm="Tsunami" type="DART Buoy" met="n" currents="n" waterquality="n"/>
  <station id="badlat" lat="not-a-number" lon="-120.0" name="Broken" owner="NDBC" pgm="NDBC" type="Moored Buoy" met="y" currents="n" waterquality="n"/>
  <station id="ftpc1" lat="38.954" lon="-123.741" name="Point Arena" owner="NOS" pgm="NOS/CO-OPS" type="Fixed C-MAN Station" met="y" currents="n" waterquality="y"/>
  <station id="nolat" lon="-120.0" name="No Latitude" owner="NDBC" pgm="NDBC" type="Moored Buoy" met="y" currents="n" waterquality="n"/>
</stations>"#;

    fn manual_clock() -> Arc<ManualClock> {
        ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    fn offline_registry(clock: Arc<ManualClock>, cache_dir: Option<&Path>) -> StationRegistry {
        // Connection-refused locally, so refresh fails fast and deterministically.
        StationRegistry::custom(
            Client::new(),
            "http://127.0.0.1:9/activestations.xml".to_string(),
            Duration::hours(REGISTRY_TTL_HOURS),
            cache_dir,
            clock,
        )
    }

    #[test]
    fn malformed_records_are_dropped_not_fatal() {
        let stations = parse_active_stations(SAMPLE_XML).expect("document parses");
        // Five records, one non-numeric latitude, one missing latitude.
        assert_eq!(stations.len(), 3);
        assert!(stations.iter().all(|s| s.id != "badlat" && s.id != "nolat"));
    }

    #[test]
    fn records_classify_and_carry_flags() {
        let stations = parse_active_stations(SAMPLE_XML).expect("document parses");
        let sf = stations.iter().find(|s| s.id == "46026").unwrap();
        assert_eq!(sf.station_type, StationType::Buoy);
        assert!(sf.has_met);
        assert!(!sf.has_water_quality);

        let dart = stations.iter().find(|s| s.id == "46407").unwrap();
        assert_eq!(dart.station_type, StationType::Dart);

        let cman = stations.iter().find(|s| s.id == "ftpc1").unwrap();
        assert_eq!(cman.station_type, StationType::Fixed);
        assert!(cman.has_water_quality);
    }

    #[tokio::test]
    async fn empty_list_when_upstream_down_and_no_cache() {
        let registry = offline_registry(manual_clock(), None);
        assert!(registry.get_stations().await.is_empty());
    }

    #[tokio::test]
    async fn stale_list_is_served_when_refresh_fails() {
        let clock = manual_clock();
        let registry = offline_registry(clock.clone(), None);
        let stations = parse_active_stations(SAMPLE_XML).unwrap();
        *registry.cached.write() = Some(CacheEntry::new(stations.clone(), clock.now()));

        // Push the cache past its TTL; the refresh will fail, so the stale
        // list must come back instead of an error or an empty list.
        clock.advance(Duration::hours(REGISTRY_TTL_HOURS + 1));
        let served = registry.get_stations().await;
        assert_eq!(served, stations);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = manual_clock();
        let writer = offline_registry(clock.clone(), Some(dir.path()));

        let stations = parse_active_stations(SAMPLE_XML).unwrap();
        let entry = CacheEntry::new(stations.clone(), clock.now());
        writer.store_snapshot(&entry).await;

        let reader = offline_registry(clock.clone(), Some(dir.path()));
        let loaded = reader.load_snapshot().await.expect("snapshot present");
        assert_eq!(loaded.value, stations);
        assert_eq!(loaded.fetched_at, clock.now());

        // A fresh process serves the snapshot without a successful refresh.
        assert_eq!(reader.get_stations().await, stations);
    }

    #[tokio::test]
    async fn capability_and_type_filters() {
        let clock = manual_clock();
        let registry = offline_registry(clock.clone(), None);
        let stations = parse_active_stations(SAMPLE_XML).unwrap();
        *registry.cached.write() = Some(CacheEntry::new(stations, clock.now()));

        let met = registry.stations_with_capability(Capability::Met).await;
        assert_eq!(met.len(), 2);

        let darts = registry.stations_of_types(&[StationType::Dart]).await;
        assert_eq!(darts.len(), 1);
        assert_eq!(darts[0].id, "46407");

        assert_eq!(registry.map_stations().await.len(), 3);
    }
}
