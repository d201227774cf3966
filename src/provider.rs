// Provider adapter contract
// Every upstream travel source implements TravelProvider and returns canonical offers.

use crate::models::{
    CanonicalFlightOffer, CanonicalHotelOffer, FlightSearchParams, HotelSearchParams,
    LocationSuggestion,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Provider request failed: {message}")]
    RequestError {
        status_code: Option<u16>,
        message: String,
    },

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid search parameters: {0}")]
    InvalidParams(String),

    #[error("Response decode error: {0}")]
    DecodeError(String),

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },
}

impl ProviderError {
    pub fn request<S: Into<String>>(message: S) -> Self {
        ProviderError::RequestError {
            status_code: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::DecodeError(err.to_string())
        } else {
            ProviderError::RequestError {
                status_code: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

pub type ProviderResponse<T> = Result<T, ProviderError>;

#[async_trait]
pub trait TravelProvider: Send + Sync + 'static {
    // Registry name, also used to tag every offer this provider produces
    fn name(&self) -> &str;

    async fn search_flights(
        &self,
        params: &FlightSearchParams,
    ) -> ProviderResponse<Vec<CanonicalFlightOffer>>;

    async fn search_hotels(
        &self,
        _params: &HotelSearchParams,
    ) -> ProviderResponse<Vec<CanonicalHotelOffer>> {
        Err(ProviderError::Unsupported {
            provider: self.name().to_string(),
            operation: "hotel search",
        })
    }

    async fn search_locations(&self, query: &str) -> ProviderResponse<Vec<LocationSuggestion>>;
}

// Monetary or rating value as providers send it: sometimes a JSON number, sometimes a string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    pub fn parse(&self) -> Option<f64> {
        match self {
            RawAmount::Number(n) if n.is_finite() => Some(*n),
            RawAmount::Number(_) => None,
            RawAmount::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

// Missing or unparseable amounts count as zero
pub fn amount_or_zero(amount: Option<&RawAmount>) -> f64 {
    amount.and_then(RawAmount::parse).unwrap_or(0.0)
}

pub fn build_http_client(timeout_ms: u64, user_agent: &str) -> ProviderResponse<Client> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(user_agent)
        .build()
        .map_err(|e| ProviderError::request(format!("Failed to create HTTP client: {e}")))
}

// Turns a non-success response into the matching error, consuming the body for the message
pub async fn ensure_success(response: Response, provider: &str) -> ProviderResponse<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(
            format!("{provider} rejected credentials ({status}): {body}"),
        ),
        _ => ProviderError::RequestError {
            status_code: Some(status.as_u16()),
            message: format!("{provider} returned {status}: {body}"),
        },
    })
}
