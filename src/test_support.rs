// Scriptable provider and offer builders shared by the unit tests

use crate::models::{
    BestPrice, CanonicalFlightOffer, CanonicalHotelOffer, FlightSearchParams, HotelSearchParams,
    Itinerary, LocationSuggestion, Price,
};
use crate::provider::{ProviderError, ProviderResponse, TravelProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct MockProvider {
    name: String,
    flights: Vec<CanonicalFlightOffer>,
    hotels: Option<Vec<CanonicalHotelOffer>>,
    locations: Vec<LocationSuggestion>,
    failure: Option<String>,
    delay: Option<Duration>,
    panics: bool,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flights: Vec::new(),
            hotels: None,
            locations: Vec::new(),
            failure: None,
            delay: None,
            panics: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_flights(mut self, flights: Vec<CanonicalFlightOffer>) -> Self {
        self.flights = flights;
        self
    }

    pub fn with_hotels(mut self, hotels: Vec<CanonicalHotelOffer>) -> Self {
        self.hotels = Some(hotels);
        self
    }

    pub fn with_locations(mut self, locations: Vec<LocationSuggestion>) -> Self {
        self.locations = locations;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond<T: Clone + Sync>(&self, data: &[T]) -> ProviderResponse<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("{} blew up", self.name);
        }
        match &self.failure {
            Some(message) => Err(ProviderError::request(message.clone())),
            None => Ok(data.to_vec()),
        }
    }
}

#[async_trait]
impl TravelProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_flights(
        &self,
        _params: &FlightSearchParams,
    ) -> ProviderResponse<Vec<CanonicalFlightOffer>> {
        self.respond(&self.flights).await
    }

    async fn search_hotels(
        &self,
        _params: &HotelSearchParams,
    ) -> ProviderResponse<Vec<CanonicalHotelOffer>> {
        match &self.hotels {
            Some(hotels) => self.respond(hotels).await,
            None => Err(ProviderError::Unsupported {
                provider: self.name.clone(),
                operation: "hotel search",
            }),
        }
    }

    async fn search_locations(&self, _query: &str) -> ProviderResponse<Vec<LocationSuggestion>> {
        self.respond(&self.locations).await
    }
}

pub fn flight(id: &str, price: f64, duration: &str, stops: u32) -> CanonicalFlightOffer {
    CanonicalFlightOffer {
        id: id.to_string(),
        price: Price {
            total: price,
            currency: "USD".to_string(),
            ..Default::default()
        },
        outbound: Itinerary {
            duration: Some(duration.to_string()),
            carrier: "XX".to_string(),
            stops,
            ..Default::default()
        },
        airline: "XX".to_string(),
        ..Default::default()
    }
}

pub fn hotel(id: &str, price: f64, rating: Option<f64>) -> CanonicalHotelOffer {
    CanonicalHotelOffer {
        id: id.to_string(),
        name: format!("Hotel {id}"),
        rating,
        best_price: Some(BestPrice {
            currency: "EUR".to_string(),
            total: price,
            per_night: None,
        }),
        ..Default::default()
    }
}

pub fn place(id: &str, name: &str, country: Option<&str>) -> LocationSuggestion {
    LocationSuggestion {
        id: id.to_string(),
        name: name.to_string(),
        kind: "city".to_string(),
        country: country.map(str::to_string),
        provider: String::new(),
    }
}
