// Canonical travel search model shared by every provider adapter
// Providers translate their own schemas into these types, and everything downstream
// (ranking, caching, location merging) only ever sees the canonical shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl TravelClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelClass::Economy => "ECONOMY",
            TravelClass::PremiumEconomy => "PREMIUM_ECONOMY",
            TravelClass::Business => "BUSINESS",
            TravelClass::First => "FIRST",
        }
    }
}

// Flight search request as handed over by the route layer
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightSearchParams {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub return_date: Option<String>,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub travel_class: Option<TravelClass>,
    pub currency: String,
    pub non_stop: bool,
    pub max_results: u32,
}

impl Default for FlightSearchParams {
    fn default() -> Self {
        Self {
            origin: String::new(),
            destination: String::new(),
            departure_date: String::new(),
            return_date: None,
            adults: 1,
            children: 0,
            infants: 0,
            travel_class: None,
            currency: "USD".to_string(),
            non_stop: false,
            max_results: 10,
        }
    }
}

impl FlightSearchParams {
    pub fn new(origin: &str, destination: &str, departure_date: &str) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date: departure_date.to_string(),
            ..Default::default()
        }
    }

    // Name of the first required field that is missing, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.origin.trim().is_empty() {
            Some("origin")
        } else if self.destination.trim().is_empty() {
            Some("destination")
        } else if self.departure_date.trim().is_empty() {
            Some("departureDate")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HotelArea {
    City(String),
    Coordinates {
        latitude: f64,
        longitude: f64,
        radius: u32,
    },
}

// Hotel search request: either a city code or a coordinate box is required
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotelSearchParams {
    pub city_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<u32>,
    pub check_in_date: String,
    pub check_out_date: String,
    pub adults: u32,
    pub rooms: u32,
    pub price_range: Option<String>,
    pub currency: String,
    pub sort: Option<String>,
    pub language: Option<String>,
}

impl Default for HotelSearchParams {
    fn default() -> Self {
        Self {
            city_code: None,
            latitude: None,
            longitude: None,
            radius: None,
            check_in_date: String::new(),
            check_out_date: String::new(),
            adults: 1,
            rooms: 1,
            price_range: None,
            currency: "USD".to_string(),
            sort: None,
            language: None,
        }
    }
}

impl HotelSearchParams {
    pub fn for_city(city_code: &str, check_in_date: &str, check_out_date: &str) -> Self {
        Self {
            city_code: Some(city_code.to_string()),
            check_in_date: check_in_date.to_string(),
            check_out_date: check_out_date.to_string(),
            ..Default::default()
        }
    }

    // City code wins when both a city and coordinates are supplied
    pub fn area(&self) -> Option<HotelArea> {
        if let Some(code) = self.city_code.as_ref().filter(|c| !c.trim().is_empty()) {
            return Some(HotelArea::City(code.clone()));
        }
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(HotelArea::Coordinates {
                latitude,
                longitude,
                radius: self.radius.unwrap_or(5),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    pub amount: f64,
    #[serde(rename = "type")]
    pub fee_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub total: f64,
    pub currency: String,
    pub base: Option<f64>,
    pub fees: Vec<Fee>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightEndpoint {
    pub airport: String,
    pub terminal: Option<String>,
    pub at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
    // ISO-8601 duration exactly as the provider sent it, e.g. "PT5H30M"
    pub duration: Option<String>,
    pub carrier: String,
    pub flight_number: Option<String>,
    pub aircraft: Option<String>,
    pub stops: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFlightOffer {
    pub id: String,
    pub price: Price,
    pub outbound: Itinerary,
    #[serde(rename = "return")]
    pub return_itinerary: Option<Itinerary>,
    pub airline: String,
    pub validating_airline: Option<String>,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelLocation {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPolicies {
    pub cancellation_deadline: Option<String>,
    pub payment_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOffer {
    pub id: String,
    pub room: Option<String>,
    pub price: Price,
    pub policies: RoomPolicies,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestPrice {
    pub currency: String,
    pub total: f64,
    pub per_night: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalHotelOffer {
    pub id: String,
    pub name: String,
    pub location: HotelLocation,
    pub amenities: Vec<String>,
    // Star rating already parsed from the provider's representation
    pub rating: Option<f64>,
    pub offers: Vec<RoomOffer>,
    pub best_price: Option<BestPrice>,
    pub provider: String,
}

// Shared behaviour the orchestrator needs from both offer kinds
pub trait Offer: Clone + Send + 'static {
    fn total_price(&self) -> f64;
    fn provider(&self) -> &str;
    fn set_provider(&mut self, provider: &str);
}

impl Offer for CanonicalFlightOffer {
    fn total_price(&self) -> f64 {
        self.price.total
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn set_provider(&mut self, provider: &str) {
        self.provider = provider.to_string();
    }
}

impl Offer for CanonicalHotelOffer {
    fn total_price(&self) -> f64 {
        self.best_price.as_ref().map_or(0.0, |p| p.total)
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn set_provider(&mut self, provider: &str) {
        self.provider = provider.to_string();
    }
}

// Outcome of one provider attempt; a provider failure never travels past this value
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProviderResult<T> {
    Success { data: Vec<T> },
    Failure { error: String },
}

impl<T> ProviderResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderResult::Success { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ProviderResult::Failure { error } => Some(error),
            ProviderResult::Success { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&[T]> {
        match self {
            ProviderResult::Success { data } => Some(data),
            ProviderResult::Failure { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSuggestion {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub country: Option<String>,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    pub iata_code: String,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta<P> {
    pub params: P,
    pub timestamp: DateTime<Utc>,
    pub providers_queried: Vec<String>,
}

pub type ProviderResults<T> = BTreeMap<String, ProviderResult<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_params_missing_field() {
        let params = FlightSearchParams::new("JFK", "LAX", "2026-11-01");
        assert_eq!(params.missing_field(), None);
        assert_eq!(params.adults, 1);
        assert_eq!(params.currency, "USD");

        let params = FlightSearchParams::new("JFK", " ", "2026-11-01");
        assert_eq!(params.missing_field(), Some("destination"));

        let params = FlightSearchParams::default();
        assert_eq!(params.missing_field(), Some("origin"));
    }

    #[test]
    fn test_hotel_area_prefers_city_code() {
        let mut params = HotelSearchParams::for_city("PAR", "2026-11-01", "2026-11-03");
        params.latitude = Some(48.85);
        params.longitude = Some(2.35);
        assert_eq!(params.area(), Some(HotelArea::City("PAR".to_string())));

        params.city_code = None;
        assert_eq!(
            params.area(),
            Some(HotelArea::Coordinates {
                latitude: 48.85,
                longitude: 2.35,
                radius: 5,
            })
        );

        params.longitude = None;
        assert_eq!(params.area(), None);
    }

    #[test]
    fn test_flight_params_deserialize_with_defaults() {
        let params: FlightSearchParams = serde_json::from_str(
            r#"{"origin":"JFK","destination":"LAX","departureDate":"2026-11-01","travelClass":"BUSINESS"}"#,
        )
        .unwrap();
        assert_eq!(params.adults, 1);
        assert_eq!(params.travel_class, Some(TravelClass::Business));
        assert!(!params.non_stop);
    }

    #[test]
    fn test_provider_result_serialization() {
        let ok: ProviderResult<u32> = ProviderResult::Success { data: vec![1, 2] };
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"data":[1,2]}"#);

        let failed: ProviderResult<u32> = ProviderResult::Failure {
            error: "boom".to_string(),
        };
        assert_eq!(serde_json::to_string(&failed).unwrap(), r#"{"error":"boom"}"#);
        assert_eq!(failed.error(), Some("boom"));
        assert!(failed.data().is_none());
    }

    #[test]
    fn test_return_itinerary_serialized_as_return() {
        let offer = CanonicalFlightOffer {
            id: "1".to_string(),
            return_itinerary: Some(Itinerary::default()),
            ..Default::default()
        };
        let value = serde_json::to_value(&offer).unwrap();
        assert!(value.get("return").is_some());
        assert!(value.get("validatingAirline").is_some());
    }
}
