// Price tracking cache in front of the orchestrator
// Entries are keyed by the serialized request and considered fresh for the configured TTL.
// Expiry is lazy: a stale entry is only replaced by the next lookup for the same key, or
// dropped when a caller runs purge_expired.

use crate::aggregator::{FlightSearchResult, HotelSearchResult, SearchAggregator};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::models::{FlightSearchParams, HotelSearchParams};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PriceTrackerError {
    #[error("Failed to build cache key: {0}")]
    CacheKey(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PriceTrackRequest {
    Flight {
        params: FlightSearchParams,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        providers: Option<Vec<String>>,
    },
    Hotel {
        params: HotelSearchParams,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        providers: Option<Vec<String>>,
    },
}

impl PriceTrackRequest {
    // Field order is fixed by the types, so equal requests always produce equal keys
    pub fn cache_key(&self) -> Result<String, PriceTrackerError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Flights(FlightSearchResult),
    Hotels(HotelSearchResult),
}

impl SearchOutcome {
    pub fn success(&self) -> bool {
        match self {
            SearchOutcome::Flights(result) => result.success,
            SearchOutcome::Hotels(result) => result.success,
        }
    }

    pub fn offer_count(&self) -> usize {
        match self {
            SearchOutcome::Flights(result) => result.offers.len(),
            SearchOutcome::Hotels(result) => result.offers.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedPrices {
    pub data: SearchOutcome,
    pub cached: bool,
    pub last_update: DateTime<Utc>,
}

struct CacheEntry {
    data: SearchOutcome,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct TrackerStats {
    hits: AtomicUsize,
    misses: AtomicUsize,
    refreshes: AtomicUsize,
    purged: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTrackerStatsReport {
    pub entries: usize,
    pub hits: usize,
    // Lookups with no entry at all
    pub misses: usize,
    // Lookups that found a stale entry and searched again
    pub refreshes: usize,
    pub purged: usize,
}

pub struct PriceTracker {
    aggregator: Arc<SearchAggregator>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
    stats: TrackerStats,
}

impl PriceTracker {
    pub fn new(aggregator: Arc<SearchAggregator>, config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            aggregator,
            clock,
            ttl: Duration::seconds(config.ttl_seconds as i64),
            entries: DashMap::new(),
            stats: TrackerStats::default(),
        }
    }

    pub async fn track_prices(
        &self,
        request: &PriceTrackRequest,
    ) -> Result<TrackedPrices, PriceTrackerError> {
        let key = request.cache_key()?;
        let now = self.clock.now();

        // The map guard is released before any await below
        let existing = self
            .entries
            .get(&key)
            .map(|entry| (entry.timestamp, now - entry.timestamp < self.ttl, entry.data.clone()));

        match existing {
            Some((timestamp, true, data)) => {
                self.stats.hits.fetch_add(1, Ordering::SeqCst);
                debug!(%timestamp, "price cache hit");
                return Ok(TrackedPrices {
                    data,
                    cached: true,
                    last_update: timestamp,
                });
            }
            Some((timestamp, false, _)) => {
                self.stats.refreshes.fetch_add(1, Ordering::SeqCst);
                debug!(%timestamp, "price cache entry expired, searching again");
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::SeqCst);
                debug!("price cache miss");
            }
        }

        let data = match request {
            PriceTrackRequest::Flight { params, providers } => SearchOutcome::Flights(
                self.aggregator
                    .search_flights(params, providers.as_deref())
                    .await,
            ),
            PriceTrackRequest::Hotel { params, providers } => SearchOutcome::Hotels(
                self.aggregator
                    .search_hotels(params, providers.as_deref())
                    .await,
            ),
        };

        let timestamp = self.clock.now();
        info!(offers = data.offer_count(), success = data.success(), "price snapshot stored");
        self.entries.insert(
            key,
            CacheEntry {
                data: data.clone(),
                timestamp,
            },
        );

        Ok(TrackedPrices {
            data,
            cached: false,
            last_update: timestamp,
        })
    }

    // Removes every entry older than the TTL and returns how many went
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now - entry.timestamp < self.ttl);
        let removed = before.saturating_sub(self.entries.len());
        self.stats.purged.fetch_add(removed, Ordering::SeqCst);
        if removed > 0 {
            info!(removed, "purged expired price snapshots");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> PriceTrackerStatsReport {
        PriceTrackerStatsReport {
            entries: self.entries.len(),
            hits: self.stats.hits.load(Ordering::SeqCst),
            misses: self.stats.misses.load(Ordering::SeqCst),
            refreshes: self.stats.refreshes.load(Ordering::SeqCst),
            purged: self.stats.purged.load(Ordering::SeqCst),
        }
    }
}
