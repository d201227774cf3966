// API-key quote provider adapter
// Browse quotes reference shared Places and Carriers tables by numeric id; those ids are
// resolved to IATA codes and carrier names before anything leaves this module.

use crate::config::SkyscannerConfig;
use crate::models::{
    CanonicalFlightOffer, FlightEndpoint, FlightSearchParams, Itinerary, LocationSuggestion,
    Price,
};
use crate::provider::{
    amount_or_zero, build_http_client, ensure_success, ProviderError, ProviderResponse,
    TravelProvider,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use tracing::{debug, info};

pub const PROVIDER_NAME: &str = "skyscanner";

pub struct SkyscannerProvider {
    client: Client,
    base_url: String,
    host: String,
    api_key: Option<String>,
    market: String,
    locale: String,
}

impl SkyscannerProvider {
    pub fn new(config: &SkyscannerConfig) -> ProviderResponse<Self> {
        let client = build_http_client(config.timeout_ms, "travel-aggregator/0.1")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            host: config.host.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            market: config.market.clone(),
            locale: config.locale.clone(),
        })
    }

    fn get(&self, url: String) -> ProviderResponse<RequestBuilder> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderError::AuthenticationError("skyscanner api key is not configured".to_string())
        })?;
        Ok(self
            .client
            .get(url)
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", &self.host))
    }
}

#[async_trait]
impl TravelProvider for SkyscannerProvider {
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

        let url = format!(
            "{}/apiservices/browsequotes/v1.0/{}/{}/{}/{}-sky/{}-sky/{}",
            self.base_url,
            self.market,
            params.currency,
            self.locale,
            params.origin,
            params.destination,
            params.departure_date
        );
        let mut request = self.get(url)?;
        if let Some(return_date) = params.return_date.as_ref().filter(|d| !d.is_empty()) {
            request = request.query(&[("inboundpartialdate", return_date)]);
        }

        debug!(origin = %params.origin, destination = %params.destination, "skyscanner browse quotes");
        let response = ensure_success(request.send().await?, PROVIDER_NAME).await?;
        let body: raw::BrowseQuotesResponse = response.json().await?;

        let mut offers = normalize_quotes(body, &params.currency);
        if params.non_stop {
            offers.retain(|o| o.outbound.stops == 0);
        }
        if params.max_results > 0 {
            offers.truncate(params.max_results as usize);
        }
        info!(count = offers.len(), "skyscanner returned flight quotes");
        Ok(offers)
    }

    async fn search_locations(&self, query: &str) -> ProviderResponse<Vec<LocationSuggestion>> {
        let url = format!(
            "{}/apiservices/autosuggest/v1.0/{}/USD/{}/",
            self.base_url, self.market, self.locale
        );
        let request = self.get(url)?.query(&[("query", query.trim())]);
        let response = ensure_success(request.send().await?, PROVIDER_NAME).await?;
        let body: raw::AutosuggestResponse = response.json().await?;
        Ok(body.places.into_iter().filter_map(suggestion_from_place).collect())
    }
}

// Quotes only say whether they are direct; an indirect quote has at least one connection
fn leg_to_itinerary(
    leg: raw::QuoteLeg,
    direct: bool,
    places: &HashMap<i64, raw::Place>,
    carriers: &HashMap<i64, String>,
) -> Itinerary {
    let airport = |id: Option<i64>| {
        id.and_then(|id| places.get(&id))
            .and_then(|p| p.iata_code.clone().or_else(|| p.skyscanner_code.clone()))
            .unwrap_or_default()
    };

    Itinerary {
        departure: FlightEndpoint {
            airport: airport(leg.origin_id),
            terminal: None,
            at: leg.departure_date.clone(),
        },
        arrival: FlightEndpoint {
            airport: airport(leg.destination_id),
            terminal: None,
            at: None,
        },
        duration: None,
        carrier: leg
            .carrier_ids
            .first()
            .and_then(|id| carriers.get(id))
            .cloned()
            .unwrap_or_default(),
        flight_number: None,
        aircraft: None,
        stops: if direct { 0 } else { 1 },
    }
}

pub fn normalize_quotes(body: raw::BrowseQuotesResponse, currency: &str) -> Vec<CanonicalFlightOffer> {
    let places: HashMap<i64, raw::Place> = body
        .places
        .into_iter()
        .filter_map(|p| p.place_id.map(|id| (id, p)))
        .collect();
    let carriers: HashMap<i64, String> = body
        .carriers
        .into_iter()
        .filter_map(|c| Some((c.carrier_id?, c.name?)))
        .collect();
    let currency = body
        .currencies
        .into_iter()
        .find_map(|c| c.code)
        .unwrap_or_else(|| currency.to_string());

    body.quotes
        .into_iter()
        .enumerate()
        .map(|(index, quote)| {
            let direct = quote.direct.unwrap_or(false);
            let outbound = leg_to_itinerary(
                quote.outbound_leg.unwrap_or_default(),
                direct,
                &places,
                &carriers,
            );
            let return_itinerary = quote
                .inbound_leg
                .map(|leg| leg_to_itinerary(leg, direct, &places, &carriers));

            CanonicalFlightOffer {
                id: quote
                    .quote_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| (index + 1).to_string()),
                price: Price {
                    total: amount_or_zero(quote.min_price.as_ref()),
                    currency: currency.clone(),
                    base: None,
                    fees: Vec::new(),
                },
                airline: outbound.carrier.clone(),
                outbound,
                return_itinerary,
                validating_airline: None,
                provider: PROVIDER_NAME.to_string(),
            }
        })
        .collect()
}

// Autosuggest marks a city by giving it the same id as its CityId
fn suggestion_from_place(place: raw::SuggestedPlace) -> Option<LocationSuggestion> {
    let name = place.place_name?;
    let is_city = place.place_id.is_some() && place.place_id == place.city_id;
    let id = place
        .place_id
        .map(|id| id.trim_end_matches("-sky").to_string())
        .unwrap_or_else(|| name.clone());

    Some(LocationSuggestion {
        id,
        name,
        kind: if is_city { "city" } else { "airport" }.to_string(),
        country: place.country_name,
        provider: PROVIDER_NAME.to_string(),
    })
}

// Wire shapes; every field is optional because the upstream omits freely
pub mod raw {
    use crate::provider::RawAmount;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct BrowseQuotesResponse {
        pub quotes: Vec<Quote>,
        pub places: Vec<Place>,
        pub carriers: Vec<Carrier>,
        pub currencies: Vec<Currency>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct Quote {
        pub quote_id: Option<i64>,
        pub min_price: Option<RawAmount>,
        pub direct: Option<bool>,
        pub outbound_leg: Option<QuoteLeg>,
        pub inbound_leg: Option<QuoteLeg>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct QuoteLeg {
        pub carrier_ids: Vec<i64>,
        pub origin_id: Option<i64>,
        pub destination_id: Option<i64>,
        pub departure_date: Option<String>,
    }

    #[derive(Debug, Default, Clone, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct Place {
        pub place_id: Option<i64>,
        pub iata_code: Option<String>,
        pub skyscanner_code: Option<String>,
        pub name: Option<String>,
        pub city_name: Option<String>,
        pub country_name: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct Carrier {
        pub carrier_id: Option<i64>,
        pub name: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct Currency {
        pub code: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct AutosuggestResponse {
        pub places: Vec<SuggestedPlace>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct SuggestedPlace {
        pub place_id: Option<String>,
        pub place_name: Option<String>,
        pub city_id: Option<String>,
        pub country_name: Option<String>,
    }
}
