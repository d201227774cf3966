use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{seq::SliceRandom, thread_rng, Rng};
use std::sync::Arc;
use travel_aggregator::aggregator::{rank_offers, SearchAggregator};
use travel_aggregator::clock::SystemClock;
use travel_aggregator::config::{AggregationConfig, CacheConfig};
use travel_aggregator::models::{
    CanonicalFlightOffer, FlightSearchParams, Itinerary, LocationSuggestion, Price,
};
use travel_aggregator::price_tracker::{PriceTrackRequest, PriceTracker};
use travel_aggregator::provider::{ProviderResponse, TravelProvider};
use travel_aggregator::ranking::{compare_flights, recommend_flights};

fn random_offers(count: usize) -> Vec<CanonicalFlightOffer> {
    let mut rng = thread_rng();
    let providers = ["amadeus", "skyscanner"];
    (0..count)
        .map(|i| CanonicalFlightOffer {
            id: format!("offer{i}"),
            price: Price {
                total: rng.gen_range(0.0..2000.0),
                currency: "USD".to_string(),
                ..Default::default()
            },
            outbound: Itinerary {
                duration: Some(format!("PT{}H{}M", rng.gen_range(1..20), rng.gen_range(0..60))),
                stops: rng.gen_range(0..4),
                ..Default::default()
            },
            provider: providers.choose(&mut rng).unwrap_or(&"amadeus").to_string(),
            ..Default::default()
        })
        .collect()
}

// Merge + rank of a gathered offer list
pub fn ranking_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("offer_ranking");

    for size in [10, 100, 1000].iter() {
        let offers = random_offers(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &offers, |b, offers| {
            b.iter(|| {
                let (ranked, outcome) =
                    rank_offers(black_box(offers.clone()), compare_flights, recommend_flights);
                black_box((ranked, outcome.is_ok()))
            })
        });
    }

    group.finish();
}

struct FixedProvider {
    offers: Vec<CanonicalFlightOffer>,
}

#[async_trait]
impl TravelProvider for FixedProvider {
    fn name(&self) -> &str {
        "amadeus"
    }

    async fn search_flights(
        &self,
        _params: &FlightSearchParams,
    ) -> ProviderResponse<Vec<CanonicalFlightOffer>> {
        Ok(self.offers.clone())
    }

    async fn search_locations(&self, _query: &str) -> ProviderResponse<Vec<LocationSuggestion>> {
        Ok(Vec::new())
    }
}

// Cached lookups across a warm set of routes
pub fn tracker_benchmark(c: &mut Criterion) {
    let mut aggregator = SearchAggregator::new(&AggregationConfig::default(), Arc::new(SystemClock));
    aggregator.register(Arc::new(FixedProvider {
        offers: random_offers(50),
    }));
    let tracker = PriceTracker::new(
        Arc::new(aggregator),
        &CacheConfig::default(),
        Arc::new(SystemClock),
    );

    let routes: Vec<PriceTrackRequest> = ["LAX", "SFO", "ORD", "MIA", "SEA"]
        .iter()
        .map(|destination| PriceTrackRequest::Flight {
            params: FlightSearchParams::new("JFK", destination, "2026-11-01"),
            providers: Some(vec!["amadeus".to_string()]),
        })
        .collect();

    // Warm every entry once so the measured loop only sees hits
    tokio_test::block_on(async {
        for request in &routes {
            let _ = tracker.track_prices(request).await;
        }
    });

    c.bench_function("price_tracker_cached_lookup", |b| {
        let mut rng = thread_rng();
        b.iter(|| {
            let request = routes.choose(&mut rng).unwrap_or(&routes[0]);
            let tracked = tokio_test::block_on(tracker.track_prices(black_box(request)));
            black_box(tracked.map(|t| t.cached).unwrap_or(false))
        })
    });
}

criterion_group!(benches, ranking_benchmark, tracker_benchmark);
criterion_main!(benches);
