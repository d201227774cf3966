// OAuth client-credentials provider adapter
// Holds a single bearer token slot, refreshed lazily the first time a call is made at or
// after its expiry, and normalizes flight/hotel/location responses into canonical offers.

use crate::clock::Clock;
use crate::config::AmadeusConfig;
use crate::models::{
    Airport, BestPrice, CanonicalFlightOffer, CanonicalHotelOffer, Fee, FlightEndpoint,
    FlightSearchParams, HotelArea, HotelLocation, HotelSearchParams, Itinerary,
    LocationSuggestion, Price, RoomOffer, RoomPolicies, TravelClass,
};
use crate::provider::{
    amount_or_zero, build_http_client, ensure_success, ProviderError, ProviderResponse,
    RawAmount, TravelProvider,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const PROVIDER_NAME: &str = "amadeus";

const TOKEN_PATH: &str = "/v1/security/oauth2/token";
const FLIGHT_OFFERS_PATH: &str = "/v2/shopping/flight-offers";
const HOTEL_OFFERS_PATH: &str = "/v2/shopping/hotel-offers";
const LOCATIONS_PATH: &str = "/v1/reference-data/locations";

// Used when the token endpoint omits expires_in or sends one that is not a usable lifetime
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 1799;

#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AmadeusProvider {
    client: Client,
    base_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    clock: Arc<dyn Clock>,
    // Held across the refresh so concurrent callers share one token request
    token: Mutex<Option<OAuthToken>>,
}

impl AmadeusProvider {
    pub fn new(config: &AmadeusConfig, clock: Arc<dyn Clock>) -> ProviderResponse<Self> {
        let client = build_http_client(config.timeout_ms, "travel-aggregator/0.1")?;
        Ok(Self {
            client,
            base_url: config.resolved_base_url(),
            client_id: config.client_id.clone().filter(|s| !s.is_empty()),
            client_secret: config.client_secret.clone().filter(|s| !s.is_empty()),
            clock,
            token: Mutex::new(None),
        })
    }

    // Unconditional client-credentials exchange; replaces whatever token is stored
    pub async fn authenticate(&self) -> ProviderResponse<OAuthToken> {
        let mut slot = self.token.lock().await;
        let token = self.request_token().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    // Returns the stored access token, refreshing it first when missing or expired
    pub async fn ensure_valid_token(&self) -> ProviderResponse<String> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref() {
            if self.clock.now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
            debug!(expired_at = %token.expires_at, "amadeus token expired");
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *slot = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> ProviderResponse<OAuthToken> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(ProviderError::AuthenticationError(
                    "amadeus client credentials are not configured".to_string(),
                ))
            }
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, TOKEN_PATH))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await?;
        let response = ensure_success(response, PROVIDER_NAME)
            .await
            .map_err(|e| match e {
                ProviderError::RequestError { message, .. } => {
                    ProviderError::AuthenticationError(message)
                }
                other => other,
            })?;

        let body: raw::TokenResponse = response.json().await?;
        let access_token = body.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            ProviderError::AuthenticationError("token response carried no access_token".to_string())
        })?;
        let expires_at = token_expiry(self.clock.now(), body.expires_in);

        info!(%expires_at, "amadeus access token refreshed");
        Ok(OAuthToken {
            access_token,
            expires_at,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ProviderResponse<T> {
        let token = self.ensure_valid_token().await?;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        let response = ensure_success(response, PROVIDER_NAME).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn lookup_airport(&self, code: &str) -> ProviderResponse<Option<Airport>> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ProviderError::InvalidParams("airport code is required".to_string()));
        }

        let query = [
            ("subType", "AIRPORT".to_string()),
            ("keyword", code.clone()),
        ];
        let body: raw::LocationsResponse = self.get_json(LOCATIONS_PATH, &query).await?;
        Ok(body
            .data
            .into_iter()
            .find(|loc| loc.iata_code.as_deref() == Some(code.as_str()))
            .map(airport_from_location))
    }

    // Same as lookup_airport but any failure is logged and reported as None
    pub async fn airport_info(&self, code: &str) -> Option<Airport> {
        match self.lookup_airport(code).await {
            Ok(airport) => airport,
            Err(e) => {
                warn!(code, error = %e, "airport lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl TravelProvider for AmadeusProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search_flights(
        &self,
        params: &FlightSearchParams,
    ) -> ProviderResponse<Vec<CanonicalFlightOffer>> {
        if let Some(field) = params.missing_field() {
            return Err(ProviderError::InvalidParams(format!("{field} is required")));
        }

        let query = flight_query(params);
        debug!(origin = %params.origin, destination = %params.destination, "amadeus flight search");
        let body: raw::FlightOffersResponse = self.get_json(FLIGHT_OFFERS_PATH, &query).await?;
        let offers = normalize_flight_offers(body);
        info!(count = offers.len(), "amadeus returned flight offers");
        Ok(offers)
    }

    async fn search_hotels(
        &self,
        params: &HotelSearchParams,
    ) -> ProviderResponse<Vec<CanonicalHotelOffer>> {
        let query = hotel_query(params)?;
        let body: raw::HotelOffersResponse = self.get_json(HOTEL_OFFERS_PATH, &query).await?;
        let nights = stay_nights(&params.check_in_date, &params.check_out_date);
        let offers = normalize_hotel_offers(body, nights);
        info!(count = offers.len(), "amadeus returned hotel offers");
        Ok(offers)
    }

    async fn search_locations(&self, query: &str) -> ProviderResponse<Vec<LocationSuggestion>> {
        let params = [
            ("subType", "CITY,AIRPORT".to_string()),
            ("keyword", query.trim().to_string()),
        ];
        let body: raw::LocationsResponse = self.get_json(LOCATIONS_PATH, &params).await?;
        Ok(body.data.into_iter().filter_map(suggestion_from_location).collect())
    }
}

fn flight_query(params: &FlightSearchParams) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("originLocationCode", params.origin.clone()),
        ("destinationLocationCode", params.destination.clone()),
        ("departureDate", params.departure_date.clone()),
        ("adults", params.adults.max(1).to_string()),
        (
            "travelClass",
            params
                .travel_class
                .unwrap_or(TravelClass::Economy)
                .as_str()
                .to_string(),
        ),
        ("nonStop", params.non_stop.to_string()),
        ("currencyCode", params.currency.clone()),
        ("max", params.max_results.to_string()),
    ];
    if let Some(return_date) = params.return_date.as_ref().filter(|d| !d.is_empty()) {
        query.push(("returnDate", return_date.clone()));
    }
    if params.children > 0 {
        query.push(("children", params.children.to_string()));
    }
    if params.infants > 0 {
        query.push(("infants", params.infants.to_string()));
    }
    query
}

fn hotel_query(params: &HotelSearchParams) -> ProviderResponse<Vec<(&'static str, String)>> {
    let area = params.area().ok_or_else(|| {
        ProviderError::InvalidParams("cityCode or latitude/longitude is required".to_string())
    })?;
    if params.check_in_date.trim().is_empty() || params.check_out_date.trim().is_empty() {
        return Err(ProviderError::InvalidParams(
            "checkInDate and checkOutDate are required".to_string(),
        ));
    }

    let mut query = Vec::new();
    match area {
        HotelArea::City(code) => query.push(("cityCode", code)),
        HotelArea::Coordinates {
            latitude,
            longitude,
            radius,
        } => {
            query.push(("latitude", latitude.to_string()));
            query.push(("longitude", longitude.to_string()));
            query.push(("radius", radius.to_string()));
            query.push(("radiusUnit", "KM".to_string()));
        }
    }
    query.push(("checkInDate", params.check_in_date.clone()));
    query.push(("checkOutDate", params.check_out_date.clone()));
    query.push(("adults", params.adults.max(1).to_string()));
    query.push(("roomQuantity", params.rooms.max(1).to_string()));
    query.push(("currency", params.currency.clone()));
    if let Some(range) = &params.price_range {
        query.push(("priceRange", range.clone()));
    }
    if let Some(sort) = &params.sort {
        query.push(("sort", sort.clone()));
    }
    if let Some(lang) = &params.language {
        query.push(("lang", lang.clone()));
    }
    Ok(query)
}

// Whole nights between the stay dates; None when either date is unparseable or the stay is empty
pub fn stay_nights(check_in: &str, check_out: &str) -> Option<i64> {
    let check_in = NaiveDate::parse_from_str(check_in.trim(), "%Y-%m-%d").ok()?;
    let check_out = NaiveDate::parse_from_str(check_out.trim(), "%Y-%m-%d").ok()?;
    let nights = (check_out - check_in).num_days();
    (nights > 0).then_some(nights)
}

fn normalize_price(price: Option<raw::Price>, fallback_currency: &str) -> Price {
    let price = price.unwrap_or_default();
    Price {
        total: amount_or_zero(price.total.as_ref()),
        currency: price
            .currency
            .unwrap_or_else(|| fallback_currency.to_string()),
        base: price.base.as_ref().and_then(RawAmount::parse),
        fees: price
            .fees
            .into_iter()
            .map(|fee| Fee {
                amount: amount_or_zero(fee.amount.as_ref()),
                fee_type: fee.fee_type,
            })
            .collect(),
    }
}

fn normalize_endpoint(endpoint: Option<raw::Endpoint>) -> FlightEndpoint {
    let endpoint = endpoint.unwrap_or_default();
    FlightEndpoint {
        airport: endpoint.iata_code.unwrap_or_default(),
        terminal: endpoint.terminal,
        at: endpoint.at,
    }
}

// First segment supplies the departure, last segment the arrival
fn normalize_itinerary(itinerary: raw::Itinerary) -> Itinerary {
    let stops = itinerary.segments.len().saturating_sub(1) as u32;
    let mut segments = itinerary.segments.into_iter();
    let first = segments.next().unwrap_or_default();
    let last = segments.last();

    let carrier = first.carrier_code.clone().unwrap_or_default();
    let flight_number = match (&first.carrier_code, &first.number) {
        (Some(code), Some(number)) => Some(format!("{code}{number}")),
        (None, Some(number)) => Some(number.clone()),
        _ => None,
    };
    let aircraft = first.aircraft.as_ref().and_then(|a| a.code.clone());
    let departure = normalize_endpoint(first.departure);
    let arrival = match last {
        Some(segment) => normalize_endpoint(segment.arrival),
        None => normalize_endpoint(first.arrival),
    };

    Itinerary {
        departure,
        arrival,
        duration: itinerary.duration,
        carrier,
        flight_number,
        aircraft,
        stops,
    }
}

pub fn normalize_flight_offers(body: raw::FlightOffersResponse) -> Vec<CanonicalFlightOffer> {
    let carriers = body.dictionaries.map(|d| d.carriers).unwrap_or_default();

    body.data
        .into_iter()
        .enumerate()
        .map(|(index, offer)| {
            let mut itineraries = offer.itineraries.into_iter();
            let outbound = itineraries.next().map(normalize_itinerary).unwrap_or_default();
            let return_itinerary = itineraries.next().map(normalize_itinerary);

            let airline = carriers
                .get(&outbound.carrier)
                .cloned()
                .unwrap_or_else(|| outbound.carrier.clone());

            CanonicalFlightOffer {
                id: offer.id.unwrap_or_else(|| (index + 1).to_string()),
                price: normalize_price(offer.price, ""),
                outbound,
                return_itinerary,
                airline,
                validating_airline: offer.validating_airline_codes.into_iter().next(),
                provider: PROVIDER_NAME.to_string(),
            }
        })
        .collect()
}

fn join_address(address: Option<raw::Address>) -> Option<String> {
    let address = address?;
    let parts: Vec<String> = address
        .lines
        .into_iter()
        .chain(address.city_name)
        .chain(address.postal_code)
        .chain(address.country_code)
        .filter(|p| !p.trim().is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

// best_price comes from the first room offer; per_night prefers the provider's nightly average
pub fn normalize_hotel_offers(
    body: raw::HotelOffersResponse,
    nights: Option<i64>,
) -> Vec<CanonicalHotelOffer> {
    body.data
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let hotel = entry.hotel.unwrap_or_default();

            let mut best_price = None;
            let offers: Vec<RoomOffer> = entry
                .offers
                .into_iter()
                .enumerate()
                .map(|(offer_index, offer)| {
                    let average_total = offer
                        .price
                        .as_ref()
                        .and_then(|p| p.variations.as_ref())
                        .and_then(|v| v.average.as_ref())
                        .and_then(|a| a.total.as_ref())
                        .and_then(RawAmount::parse);
                    let price = normalize_price(offer.price, "");

                    if best_price.is_none() {
                        let per_night = average_total.or_else(|| {
                            nights
                                .filter(|_| price.total > 0.0)
                                .map(|n| price.total / n as f64)
                        });
                        best_price = Some(BestPrice {
                            currency: price.currency.clone(),
                            total: price.total,
                            per_night,
                        });
                    }

                    let room = offer.room.and_then(|r| {
                        r.description
                            .and_then(|d| d.text)
                            .or_else(|| r.type_estimated.and_then(|t| t.category))
                    });
                    let policies = offer.policies.unwrap_or_default();

                    RoomOffer {
                        id: offer.id.unwrap_or_else(|| format!("{}-{}", index + 1, offer_index + 1)),
                        room,
                        price,
                        policies: RoomPolicies {
                            cancellation_deadline: policies.cancellation.and_then(|c| c.deadline),
                            payment_type: policies.payment_type,
                        },
                    }
                })
                .collect();

            CanonicalHotelOffer {
                id: hotel.hotel_id.unwrap_or_else(|| (index + 1).to_string()),
                name: hotel.name.unwrap_or_default(),
                location: HotelLocation {
                    lat: hotel.latitude,
                    lng: hotel.longitude,
                    address: join_address(hotel.address),
                },
                amenities: hotel.amenities,
                rating: hotel.rating.as_ref().and_then(RawAmount::parse),
                offers,
                best_price,
                provider: PROVIDER_NAME.to_string(),
            }
        })
        .collect()
}

fn suggestion_from_location(location: raw::Location) -> Option<LocationSuggestion> {
    let name = location.name.or(location.detailed_name)?;
    let id = location.iata_code.or(location.id).unwrap_or_else(|| name.clone());
    let address = location.address.unwrap_or_default();

    Some(LocationSuggestion {
        id,
        name,
        kind: location
            .sub_type
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| "location".to_string()),
        country: address.country_name.or(address.country_code),
        provider: PROVIDER_NAME.to_string(),
    })
}

fn airport_from_location(location: raw::Location) -> Airport {
    let address = location.address.unwrap_or_default();
    let geo = location.geo_code.unwrap_or_default();
    Airport {
        iata_code: location.iata_code.unwrap_or_default(),
        name: location.name.or(location.detailed_name).unwrap_or_default(),
        city: address.city_name,
        country: address.country_name.or(address.country_code),
        latitude: geo.latitude,
        longitude: geo.longitude,
    }
}

// Wire shapes; every field is optional because the upstream omits freely
pub mod raw {
    use crate::provider::RawAmount;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct TokenResponse {
        pub access_token: Option<String>,
        pub expires_in: Option<i64>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct FlightOffersResponse {
        pub data: Vec<FlightOffer>,
        pub dictionaries: Option<Dictionaries>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Dictionaries {
        pub carriers: HashMap<String, String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct FlightOffer {
        pub id: Option<String>,
        pub itineraries: Vec<Itinerary>,
        pub price: Option<Price>,
        pub validating_airline_codes: Vec<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Itinerary {
        pub duration: Option<String>,
        pub segments: Vec<Segment>,
    }

    #[derive(Debug, Default, Clone, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct Segment {
        pub departure: Option<Endpoint>,
        pub arrival: Option<Endpoint>,
        pub carrier_code: Option<String>,
        pub number: Option<String>,
        pub aircraft: Option<AircraftRef>,
    }

    #[derive(Debug, Default, Clone, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct Endpoint {
        pub iata_code: Option<String>,
        pub terminal: Option<String>,
        pub at: Option<String>,
    }

    #[derive(Debug, Default, Clone, Deserialize)]
    #[serde(default)]
    pub struct AircraftRef {
        pub code: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Price {
        pub currency: Option<String>,
        pub total: Option<RawAmount>,
        pub base: Option<RawAmount>,
        pub fees: Vec<FeeEntry>,
        pub variations: Option<Variations>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct FeeEntry {
        pub amount: Option<RawAmount>,
        #[serde(rename = "type")]
        pub fee_type: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Variations {
        pub average: Option<AveragePrice>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct AveragePrice {
        pub total: Option<RawAmount>,
        pub base: Option<RawAmount>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct HotelOffersResponse {
        pub data: Vec<HotelEntry>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct HotelEntry {
        pub hotel: Option<Hotel>,
        pub offers: Vec<HotelRoomOffer>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct Hotel {
        pub hotel_id: Option<String>,
        pub name: Option<String>,
        pub rating: Option<RawAmount>,
        pub latitude: Option<f64>,
        pub longitude: Option<f64>,
        pub address: Option<Address>,
        pub amenities: Vec<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct Address {
        pub lines: Vec<String>,
        pub city_name: Option<String>,
        pub postal_code: Option<String>,
        pub country_code: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct HotelRoomOffer {
        pub id: Option<String>,
        pub room: Option<Room>,
        pub price: Option<Price>,
        pub policies: Option<Policies>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct Room {
        pub type_estimated: Option<TypeEstimated>,
        pub description: Option<Description>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct TypeEstimated {
        pub category: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Description {
        pub text: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct Policies {
        pub cancellation: Option<Cancellation>,
        pub payment_type: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Cancellation {
        pub deadline: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct LocationsResponse {
        pub data: Vec<Location>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct Location {
        pub id: Option<String>,
        pub name: Option<String>,
        pub detailed_name: Option<String>,
        pub sub_type: Option<String>,
        pub iata_code: Option<String>,
        pub address: Option<LocationAddress>,
        pub geo_code: Option<GeoCode>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct LocationAddress {
        pub city_name: Option<String>,
        pub country_name: Option<String>,
        pub country_code: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct GeoCode {
        pub latitude: Option<f64>,
        pub longitude: Option<f64>,
    }
}

// Missing, non-positive and out-of-range lifetimes fall back to the default
fn token_expiry(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let default = Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS);
    let lifetime = expires_in
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .unwrap_or(default);
    now.checked_add_signed(lifetime)
        .or_else(|| now.checked_add_signed(default))
        .unwrap_or(now)
}
