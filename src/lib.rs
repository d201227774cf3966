// Travel search aggregation engine
// Provider adapters, the concurrent orchestrator, ranking, price tracking and location merging.

pub mod aggregator;
pub mod amadeus;
pub mod clock;
pub mod config;
pub mod locations;
pub mod models;
pub mod price_tracker;
pub mod provider;
pub mod ranking;
pub mod skyscanner;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types for convenience
pub use aggregator::{
    AggregationError, FlightSearchResult, HotelSearchResult, SearchAggregator, SearchResult,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use models::{
    CanonicalFlightOffer, CanonicalHotelOffer, FlightSearchParams, HotelSearchParams,
    LocationSuggestion, ProviderResult,
};
pub use price_tracker::{PriceTrackRequest, PriceTracker, TrackedPrices};
pub use provider::{ProviderError, TravelProvider};
pub use ranking::{median, parse_duration};
