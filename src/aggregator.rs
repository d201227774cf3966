// Aggregation orchestrator
// Fans a search out to the requested providers concurrently, isolates every provider failure
// into a per-provider error record, merges the successes into one price-sorted list, then
// hands that list to the ranking engine.

use crate::clock::Clock;
use crate::config::AggregationConfig;
use crate::models::{
    CanonicalFlightOffer, CanonicalHotelOffer, FlightSearchParams, HotelSearchParams, Offer,
    ProviderResult, ProviderResults, SearchMeta,
};
use crate::provider::{ProviderError, ProviderResponse, TravelProvider};
use crate::ranking::{
    compare_flights, compare_hotels, recommend_flights, recommend_hotels, FlightComparison,
    FlightRecommendations, HotelComparison, HotelRecommendations,
};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("Provider {provider} panicked: {message}")]
    ProviderPanicked { provider: String, message: String },

    #[error("Provider {0} task was cancelled")]
    ProviderCancelled(String),

    #[error("Ranking failed: {0}")]
    RankingFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<P, T, C, R> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub offers: Vec<T>,
    pub providers: ProviderResults<T>,
    pub comparison: Option<C>,
    pub recommendations: Option<R>,
    pub meta: SearchMeta<P>,
}

pub type FlightSearchResult =
    SearchResult<FlightSearchParams, CanonicalFlightOffer, FlightComparison, FlightRecommendations>;
pub type HotelSearchResult =
    SearchResult<HotelSearchParams, CanonicalHotelOffer, HotelComparison, HotelRecommendations>;

type Attempt<T> = BoxFuture<'static, ProviderResponse<Vec<T>>>;

// What came back from one fan-out, before ranking
struct Gathered<T> {
    queried: Vec<String>,
    providers: ProviderResults<T>,
    merged: Vec<T>,
}

pub struct SearchAggregator {
    // Registration order is the fan-out order for location suggestions
    providers: Vec<Arc<dyn TravelProvider>>,
    provider_timeout: Duration,
    defaults: AggregationConfig,
    clock: Arc<dyn Clock>,
}

impl SearchAggregator {
    pub fn new(config: &AggregationConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            providers: Vec::new(),
            provider_timeout: Duration::from_millis(config.provider_timeout_ms),
            defaults: config.clone(),
            clock,
        }
    }

    // A provider registered under an existing name replaces the old one in place
    pub fn register(&mut self, provider: Arc<dyn TravelProvider>) {
        match self.providers.iter().position(|p| p.name() == provider.name()) {
            Some(index) => self.providers[index] = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<dyn TravelProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    pub fn providers(&self) -> &[Arc<dyn TravelProvider>] {
        &self.providers
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn default_flight_providers(&self) -> &[String] {
        &self.defaults.flight_providers
    }

    pub fn default_hotel_providers(&self) -> &[String] {
        &self.defaults.hotel_providers
    }

    pub async fn search_flights(
        &self,
        params: &FlightSearchParams,
        providers: Option<&[String]>,
    ) -> FlightSearchResult {
        let requested = providers.unwrap_or(&self.defaults.flight_providers);
        info!(
            origin = %params.origin,
            destination = %params.destination,
            providers = requested.len(),
            "starting flight search"
        );

        let shared = Arc::new(params.clone());
        let gathered = self
            .fan_out(requested, |provider| {
                let params = Arc::clone(&shared);
                async move { provider.search_flights(&params).await }.boxed()
            })
            .await;

        let meta = SearchMeta {
            params: params.clone(),
            timestamp: self.clock.now(),
            providers_queried: gathered.queried.clone(),
        };
        finish(gathered, meta, compare_flights, recommend_flights)
    }

    pub async fn search_hotels(
        &self,
        params: &HotelSearchParams,
        providers: Option<&[String]>,
    ) -> HotelSearchResult {
        let requested = providers.unwrap_or(&self.defaults.hotel_providers);
        info!(
            city = params.city_code.as_deref().unwrap_or("-"),
            providers = requested.len(),
            "starting hotel search"
        );

        let shared = Arc::new(params.clone());
        let gathered = self
            .fan_out(requested, |provider| {
                let params = Arc::clone(&shared);
                async move { provider.search_hotels(&params).await }.boxed()
            })
            .await;

        let meta = SearchMeta {
            params: params.clone(),
            timestamp: self.clock.now(),
            providers_queried: gathered.queried.clone(),
        };
        finish(gathered, meta, compare_hotels, recommend_hotels)
    }

    // Starts one task per registered, requested provider and waits for all of them
    async fn fan_out<T, F>(&self, requested: &[String], start: F) -> Gathered<T>
    where
        T: Offer,
        F: Fn(Arc<dyn TravelProvider>) -> Attempt<T>,
    {
        let mut queried: Vec<String> = Vec::new();
        let mut handles = Vec::new();

        for name in requested {
            if queried.contains(name) {
                continue;
            }
            let Some(provider) = self.provider(name) else {
                warn!(provider = %name, "no adapter registered, skipping");
                continue;
            };

            queried.push(name.clone());
            let attempt = start(Arc::clone(provider));
            let limit = self.provider_timeout;
            let provider_name = name.clone();
            handles.push(tokio::spawn(async move {
                debug!(provider = %provider_name, "provider attempt started");
                match timeout(limit, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(limit.as_millis() as u64)),
                }
            }));
        }

        let outcomes = join_all(handles).await;

        let mut providers = BTreeMap::new();
        let mut merged = Vec::new();
        for (name, outcome) in queried.iter().zip(outcomes) {
            let result = match outcome {
                Ok(Ok(mut offers)) => {
                    for offer in offers.iter_mut() {
                        offer.set_provider(name);
                    }
                    info!(provider = %name, count = offers.len(), "provider succeeded");
                    merged.extend(offers.iter().cloned());
                    ProviderResult::Success { data: offers }
                }
                Ok(Err(e)) => {
                    warn!(provider = %name, error = %e, "provider failed");
                    ProviderResult::Failure {
                        error: e.to_string(),
                    }
                }
                Err(join_error) => {
                    let err = if join_error.is_panic() {
                        AggregationError::ProviderPanicked {
                            provider: name.clone(),
                            message: panic_message(join_error.into_panic()),
                        }
                    } else {
                        AggregationError::ProviderCancelled(name.clone())
                    };
                    error!(provider = %name, error = %err, "provider task aborted");
                    ProviderResult::Failure {
                        error: err.to_string(),
                    }
                }
            };
            providers.insert(name.clone(), result);
        }

        Gathered {
            queried,
            providers,
            merged,
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// Stable ascending sort by total price; an unpriced offer sorts as 0
pub fn sort_by_price<T: Offer>(offers: &mut [T]) {
    offers.sort_by(|a, b| a.total_price().total_cmp(&b.total_price()));
}

// Sorts and ranks the merged list; a panic anywhere in here leaves the offers as gathered
pub fn rank_offers<T: Offer, C, R>(
    mut offers: Vec<T>,
    compare: impl FnOnce(&[T]) -> C,
    recommend: impl FnOnce(&[T]) -> R,
) -> (Vec<T>, Result<(C, R), AggregationError>) {
    let ranked = catch_unwind(AssertUnwindSafe(|| {
        sort_by_price(&mut offers);
        (compare(&offers), recommend(&offers))
    }));
    match ranked {
        Ok(outcome) => (offers, Ok(outcome)),
        Err(payload) => (
            offers,
            Err(AggregationError::RankingFailed(panic_message(payload))),
        ),
    }
}

fn finish<P, T, C, R>(
    gathered: Gathered<T>,
    meta: SearchMeta<P>,
    compare: impl FnOnce(&[T]) -> C,
    recommend: impl FnOnce(&[T]) -> R,
) -> SearchResult<P, T, C, R>
where
    T: Offer,
{
    let Gathered {
        providers, merged, ..
    } = gathered;

    let (offers, ranked) = rank_offers(merged, compare, recommend);
    match ranked {
        Ok((comparison, recommendations)) => {
            info!(
                offers = offers.len(),
                providers = providers.len(),
                "search completed"
            );
            SearchResult {
                success: true,
                error: None,
                offers,
                providers,
                comparison: Some(comparison),
                recommendations: Some(recommendations),
                meta,
            }
        }
        Err(e) => {
            error!(error = %e, "search ranking failed, returning partial results");
            SearchResult {
                success: false,
                error: Some(e.to_string()),
                offers,
                providers,
                comparison: None,
                recommendations: None,
                meta,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::{flight, hotel, MockProvider};
    use chrono::{TimeZone, Utc};

    fn aggregator_with(providers: Vec<MockProvider>) -> SearchAggregator {
        let start = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let config = AggregationConfig {
            provider_timeout_ms: 200,
            ..Default::default()
        };
        let mut aggregator = SearchAggregator::new(&config, Arc::new(ManualClock::new(start)));
        for provider in providers {
            aggregator.register(Arc::new(provider));
        }
        aggregator
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn params() -> FlightSearchParams {
        FlightSearchParams::new("JFK", "LAX", "2026-11-01")
    }

    #[tokio::test]
    async fn test_failure_isolated_in_either_order() {
        for order in [["good", "bad"], ["bad", "good"]] {
            let aggregator = aggregator_with(vec![
                MockProvider::new("good").with_flights(vec![flight("g1", 120.0, "PT5H", 0)]),
                MockProvider::new("bad").failing("upstream exploded"),
            ]);

            let result = aggregator
                .search_flights(&params(), Some(names(&order).as_slice()))
                .await;

            assert!(result.success);
            assert_eq!(result.offers.len(), 1);
            assert_eq!(result.offers[0].provider, "good");
            assert!(result.providers["good"].is_success());
            assert_eq!(
                result.providers["bad"].error(),
                Some("Provider request failed: upstream exploded")
            );
        }
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_still_success() {
        let aggregator = aggregator_with(vec![
            MockProvider::new("a").failing("down"),
            MockProvider::new("b").failing("also down"),
        ]);

        let result = aggregator
            .search_flights(&params(), Some(names(&["a", "b"]).as_slice()))
            .await;

        assert!(result.success);
        assert!(result.error.is_none());
        assert!(result.offers.is_empty());
        assert_eq!(result.providers.len(), 2);
        assert!(result.providers.values().all(|r| !r.is_success()));
        assert_eq!(result.comparison.unwrap().total_options, 0);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let aggregator = aggregator_with(vec![
            MockProvider::new("fast").with_flights(vec![flight("f1", 99.0, "PT3H", 0)]),
            MockProvider::new("slow")
                .with_flights(vec![flight("s1", 50.0, "PT3H", 0)])
                .delayed(Duration::from_secs(5)),
        ]);

        let result = aggregator
            .search_flights(&params(), Some(names(&["slow", "fast"]).as_slice()))
            .await;

        assert!(result.success);
        assert_eq!(result.offers.len(), 1);
        assert_eq!(
            result.providers["slow"].error(),
            Some("Request timeout after 200ms")
        );
    }

    #[tokio::test]
    async fn test_panicking_provider_becomes_error_record() {
        let aggregator = aggregator_with(vec![
            MockProvider::new("steady").with_flights(vec![flight("s1", 80.0, "PT2H", 0)]),
            MockProvider::new("wild").panicking(),
        ]);

        let result = aggregator
            .search_flights(&params(), Some(names(&["wild", "steady"]).as_slice()))
            .await;

        assert!(result.success);
        assert_eq!(result.offers.len(), 1);
        let error = result.providers["wild"].error().unwrap();
        assert!(error.contains("panicked"), "unexpected error: {error}");
    }

    #[tokio::test]
    async fn test_unregistered_and_duplicate_names_skipped() {
        let aggregator = aggregator_with(vec![
            MockProvider::new("a").with_flights(vec![flight("a1", 100.0, "PT1H", 0)]),
        ]);

        let result = aggregator
            .search_flights(&params(), Some(names(&["ghost", "a", "a"]).as_slice()))
            .await;

        assert_eq!(result.meta.providers_queried, vec!["a"]);
        assert_eq!(result.providers.len(), 1);
        assert_eq!(result.offers.len(), 1);
    }

    #[tokio::test]
    async fn test_default_provider_lists() {
        let aggregator = aggregator_with(vec![
            MockProvider::new("amadeus")
                .with_flights(vec![flight("a1", 300.0, "PT6H", 1)])
                .with_hotels(vec![hotel("h1", 200.0, Some(4.0))]),
            MockProvider::new("skyscanner").with_flights(vec![flight("s1", 250.0, "PT6H", 0)]),
        ]);

        let flights = aggregator.search_flights(&params(), None).await;
        assert_eq!(flights.meta.providers_queried, vec!["amadeus", "skyscanner"]);
        assert_eq!(flights.offers.len(), 2);

        let hotels = aggregator
            .search_hotels(&HotelSearchParams::for_city("PAR", "2026-11-01", "2026-11-03"), None)
            .await;
        assert_eq!(hotels.meta.providers_queried, vec!["amadeus"]);
        assert_eq!(hotels.offers.len(), 1);
        assert_eq!(hotels.offers[0].provider, "amadeus");
        assert_eq!(
            hotels.recommendations.unwrap().highest_rated.unwrap().offer.id,
            "h1"
        );
    }

    #[tokio::test]
    async fn test_end_to_end_flight_search() {
        let aggregator = aggregator_with(vec![
            MockProvider::new("alpha").with_flights(vec![
                flight("a1", 450.0, "PT6H10M", 1),
                flight("a2", 210.0, "PT5H40M", 0),
                flight("a3", 0.0, "PT7H", 2),
            ]),
            MockProvider::new("beta").with_flights(vec![
                flight("b1", 320.0, "PT5H5M", 0),
                flight("b2", 210.0, "PT8H", 1),
            ]),
        ]);

        let result = aggregator
            .search_flights(&params(), Some(names(&["alpha", "beta"]).as_slice()))
            .await;

        assert!(result.success);
        let ids: Vec<&str> = result.offers.iter().map(|o| o.id.as_str()).collect();
        // Stable sort keeps a2 ahead of b2 at the same price
        assert_eq!(ids, vec!["a3", "a2", "b2", "b1", "a1"]);
        assert!(result
            .offers
            .windows(2)
            .all(|w| w[0].price.total <= w[1].price.total));

        let comparison = result.comparison.unwrap();
        assert_eq!(comparison.total_options, 5);
        assert_eq!(comparison.provider_count, 2);
        assert_eq!(comparison.direct_flights, 2);
        assert_eq!(comparison.price.unwrap().min, 210.0);

        let recs = result.recommendations.unwrap();
        let cheapest = recs.cheapest.unwrap();
        assert_eq!(result.offers[cheapest.index], cheapest.offer);
        assert_eq!(cheapest.offer.id, "a3");
        assert_eq!(cheapest.savings, 450.0);

        let fastest = recs.fastest.unwrap();
        assert_eq!(result.offers[fastest.index], fastest.offer);
        assert_eq!(fastest.offer.id, "b1");

        let direct = recs.best_direct.unwrap();
        assert_eq!(result.offers[direct.index], direct.offer);
        assert_eq!(direct.offer.id, "a2");
        assert_eq!(direct.premium, 210.0);

        let value = recs.best_value.unwrap();
        assert_eq!(result.offers[value.index], value.offer);

        assert_eq!(result.meta.params, params());
        assert_eq!(
            result.meta.timestamp,
            Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_ranking_panic_keeps_partial_offers() {
        let offers = vec![flight("x", 300.0, "PT1H", 0), flight("y", 100.0, "PT1H", 0)];
        let (offers, ranked) = rank_offers(
            offers,
            |_: &[CanonicalFlightOffer]| -> FlightComparison { panic!("bad comparison") },
            recommend_flights,
        );

        assert_eq!(offers.len(), 2);
        let err = ranked.unwrap_err();
        assert_eq!(err.to_string(), "Ranking failed: bad comparison");
    }

    #[test]
    fn test_result_serializes_provider_records() {
        let mut providers = BTreeMap::new();
        providers.insert(
            "bad".to_string(),
            ProviderResult::<CanonicalFlightOffer>::Failure {
                error: "boom".to_string(),
            },
        );
        let result: FlightSearchResult = SearchResult {
            success: true,
            error: None,
            offers: vec![],
            providers,
            comparison: None,
            recommendations: None,
            meta: SearchMeta {
                params: params(),
                timestamp: Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
                providers_queried: vec!["bad".to_string()],
            },
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["providers"]["bad"]["error"], "boom");
        assert!(value.get("error").is_none());
        assert_eq!(value["meta"]["providersQueried"][0], "bad");
    }
}
