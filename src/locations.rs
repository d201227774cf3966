// Location suggestions merged across every registered provider
// Providers are asked in registration order and the first (name, country) pair seen wins.

use crate::aggregator::{panic_message, SearchAggregator};
use crate::models::LocationSuggestion;
use crate::provider::ProviderError;
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use tokio::time::timeout;
use tracing::{debug, warn};

impl SearchAggregator {
    pub async fn get_location_suggestions(&self, query: &str) -> Vec<LocationSuggestion> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let limit = self.provider_timeout();
        let attempts = self.providers().iter().map(|provider| async move {
            let name = provider.name().to_string();
            let outcome = AssertUnwindSafe(timeout(limit, provider.search_locations(query)))
                .catch_unwind()
                .await;
            let result = match outcome {
                Ok(Ok(Ok(places))) => Ok(places),
                Ok(Ok(Err(e))) => Err(e.to_string()),
                Ok(Err(_)) => Err(ProviderError::Timeout(limit.as_millis() as u64).to_string()),
                Err(payload) => Err(format!("panicked: {}", panic_message(payload))),
            };
            (name, result)
        });

        let mut suggestions = Vec::new();
        for (name, result) in join_all(attempts).await {
            match result {
                Ok(places) => {
                    debug!(provider = %name, count = places.len(), "location suggestions received");
                    suggestions.extend(places.into_iter().map(|mut place| {
                        place.provider = name.clone();
                        place
                    }));
                }
                Err(error) => warn!(provider = %name, %error, "location search failed"),
            }
        }

        dedupe_suggestions(suggestions)
    }
}

// Keeps the first suggestion for each (name, country) pair, preserving order
pub fn dedupe_suggestions(suggestions: Vec<LocationSuggestion>) -> Vec<LocationSuggestion> {
    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    suggestions
        .into_iter()
        .filter(|s| seen.insert((s.name.clone(), s.country.clone())))
        .collect()
}
