// Ranking & comparison over a merged, price-sorted offer list
// Pure functions only. Every pick carries a clone of the chosen offer plus its index in
// the list it was computed from, and ties always go to the first offer encountered.

use crate::models::{CanonicalFlightOffer, CanonicalHotelOffer, Offer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MAX_COUNTED_STOPS: f64 = 3.0;
const MAX_COUNTED_AMENITIES: f64 = 10.0;
const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationStats {
    pub min: u32,
    pub max: u32,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightComparison {
    pub price: Option<PriceStats>,
    pub duration: Option<DurationStats>,
    pub provider_count: usize,
    pub direct_flights: usize,
    pub total_options: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelComparison {
    pub price: Option<PriceStats>,
    pub rating_range: Option<RatingRange>,
    pub provider_count: usize,
    pub total_options: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheapestPick<T> {
    pub offer: T,
    pub index: usize,
    // Price of the last (most expensive) listed offer minus this one
    pub savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastestPick {
    pub offer: CanonicalFlightOffer,
    pub index: usize,
    pub duration_minutes: u32,
    pub time_saved: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectPick {
    pub offer: CanonicalFlightOffer,
    pub index: usize,
    pub premium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuePick<T> {
    pub offer: T,
    pub index: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighestRatedPick {
    pub offer: CanonicalHotelOffer,
    pub index: usize,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecommendations {
    pub cheapest: Option<CheapestPick<CanonicalFlightOffer>>,
    pub fastest: Option<FastestPick>,
    pub best_direct: Option<DirectPick>,
    pub best_value: Option<ValuePick<CanonicalFlightOffer>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelRecommendations {
    pub cheapest: Option<CheapestPick<CanonicalHotelOffer>>,
    pub highest_rated: Option<HighestRatedPick>,
    pub best_value: Option<ValuePick<CanonicalHotelOffer>>,
}

// ISO-8601 duration ("PT2H30M", "P1DT2H") to whole minutes; anything unparseable is 0
pub fn parse_duration(duration: Option<&str>) -> u32 {
    duration.and_then(parse_iso_minutes).unwrap_or(0)
}

fn parse_iso_minutes(duration: &str) -> Option<u32> {
    let rest = duration.trim().strip_prefix('P')?;
    let (date_part, time_part) = rest.split_once('T').unwrap_or((rest, ""));

    let date_units: &[(char, u32)] = &[('D', 24 * 60)];
    let time_units: &[(char, u32)] = &[('H', 60), ('M', 1), ('S', 0)];

    let mut minutes: u32 = 0;
    let mut matched_any = false;
    for (part, units) in [(date_part, date_units), (time_part, time_units)] {
        let mut digits = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let (_, factor) = units.iter().find(|(unit, _)| *unit == c)?;
            let value: u32 = digits.parse().ok()?;
            minutes = minutes.checked_add(value.checked_mul(*factor)?)?;
            digits.clear();
            matched_any = true;
        }
        if !digits.is_empty() {
            return None;
        }
    }

    matched_any.then_some(minutes)
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn price_stats(prices: &[f64]) -> Option<PriceStats> {
    if prices.is_empty() {
        return None;
    }
    Some(PriceStats {
        min: prices.iter().copied().fold(f64::INFINITY, f64::min),
        max: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        average: prices.iter().sum::<f64>() / prices.len() as f64,
        median: median(prices),
    })
}

fn valid_prices<T: Offer>(offers: &[T]) -> Vec<f64> {
    offers
        .iter()
        .map(|o| o.total_price())
        .filter(|p| *p > 0.0)
        .collect()
}

fn provider_count<T: Offer>(offers: &[T]) -> usize {
    offers.iter().map(|o| o.provider()).collect::<HashSet<_>>().len()
}

fn outbound_minutes(offer: &CanonicalFlightOffer) -> u32 {
    parse_duration(offer.outbound.duration.as_deref())
}

pub fn compare_flights(offers: &[CanonicalFlightOffer]) -> FlightComparison {
    let durations: Vec<u32> = offers.iter().map(outbound_minutes).collect();

    let duration = (!durations.is_empty()).then(|| DurationStats {
        min: durations.iter().copied().min().unwrap_or(0),
        max: durations.iter().copied().max().unwrap_or(0),
        average: durations.iter().map(|d| *d as f64).sum::<f64>() / durations.len() as f64,
    });

    FlightComparison {
        price: price_stats(&valid_prices(offers)),
        duration,
        provider_count: provider_count(offers),
        direct_flights: offers.iter().filter(|o| o.outbound.stops == 0).count(),
        total_options: offers.len(),
    }
}

pub fn compare_hotels(offers: &[CanonicalHotelOffer]) -> HotelComparison {
    let ratings: Vec<f64> = offers.iter().filter_map(|o| o.rating).collect();
    let rating_range = (!ratings.is_empty()).then(|| RatingRange {
        min: ratings.iter().copied().fold(f64::INFINITY, f64::min),
        max: ratings.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    });

    HotelComparison {
        price: price_stats(&valid_prices(offers)),
        rating_range,
        provider_count: provider_count(offers),
        total_options: offers.len(),
    }
}

// Lowest total price; an offer without a price counts as 0
pub fn cheapest<T: Offer>(offers: &[T]) -> Option<CheapestPick<T>> {
    let mut best: Option<(usize, f64)> = None;
    for (index, offer) in offers.iter().enumerate() {
        let price = offer.total_price();
        if best.map_or(true, |(_, best_price)| price < best_price) {
            best = Some((index, price));
        }
    }

    let (index, price) = best?;
    let last_price = offers.last().map_or(price, |o| o.total_price());
    Some(CheapestPick {
        offer: offers[index].clone(),
        index,
        savings: last_price - price,
    })
}

fn best_by_score<T: Clone>(offers: &[T], score: impl Fn(&T) -> f64) -> Option<ValuePick<T>> {
    let mut best: Option<(usize, f64)> = None;
    for (index, offer) in offers.iter().enumerate() {
        let s = score(offer);
        if best.map_or(true, |(_, best_score)| s > best_score) {
            best = Some((index, s));
        }
    }
    best.map(|(index, score)| ValuePick {
        offer: offers[index].clone(),
        index,
        score,
    })
}

// Share of the range left below `max`, scaled to `weight`; invalid inputs score 0
fn relative_score(value: f64, max: f64, weight: f64) -> f64 {
    if value > 0.0 && max > 0.0 {
        ((1.0 - value / max) * weight).clamp(0.0, weight)
    } else {
        0.0
    }
}

pub fn flight_value_score(offer: &CanonicalFlightOffer, max_price: f64, max_duration: u32) -> f64 {
    let price_score = relative_score(offer.price.total, max_price, 40.0);
    let duration_score = relative_score(outbound_minutes(offer) as f64, max_duration as f64, 30.0);
    let stops_score = (1.0 - (offer.outbound.stops as f64 / MAX_COUNTED_STOPS).min(1.0)) * 20.0;

    0.4 * price_score + 0.3 * duration_score + 0.2 * stops_score + 10.0
}

pub fn hotel_value_score(offer: &CanonicalHotelOffer, max_price: f64) -> f64 {
    let price_score = relative_score(offer.total_price(), max_price, 40.0);
    let rating_score = offer
        .rating
        .map_or(0.0, |r| (r.clamp(0.0, MAX_RATING) / MAX_RATING) * 40.0);
    let amenity_score = (offer.amenities.len() as f64 / MAX_COUNTED_AMENITIES).min(1.0) * 20.0;

    0.4 * price_score + 0.4 * rating_score + 0.2 * amenity_score
}

pub fn recommend_flights(offers: &[CanonicalFlightOffer]) -> FlightRecommendations {
    let cheapest = cheapest(offers);
    let cheapest_price = cheapest.as_ref().map_or(0.0, |c| c.offer.price.total);

    let mut fastest: Option<(usize, u32)> = None;
    let mut slowest = 0;
    for (index, offer) in offers.iter().enumerate() {
        let minutes = outbound_minutes(offer);
        slowest = slowest.max(minutes);
        if fastest.map_or(true, |(_, best)| minutes < best) {
            fastest = Some((index, minutes));
        }
    }
    let fastest = fastest.map(|(index, minutes)| FastestPick {
        offer: offers[index].clone(),
        index,
        duration_minutes: minutes,
        time_saved: slowest - minutes,
    });

    let best_direct = offers
        .iter()
        .position(|o| o.outbound.stops == 0)
        .map(|index| DirectPick {
            offer: offers[index].clone(),
            index,
            premium: offers[index].price.total - cheapest_price,
        });

    let max_price = valid_prices(offers).into_iter().fold(0.0, f64::max);
    let max_duration = slowest;
    let best_value = best_by_score(offers, |o| flight_value_score(o, max_price, max_duration));

    FlightRecommendations {
        cheapest,
        fastest,
        best_direct,
        best_value,
    }
}

pub fn recommend_hotels(offers: &[CanonicalHotelOffer]) -> HotelRecommendations {
    let mut highest: Option<(usize, f64)> = None;
    for (index, offer) in offers.iter().enumerate() {
        let Some(rating) = offer.rating else { continue };
        if highest.map_or(true, |(_, best)| rating > best) {
            highest = Some((index, rating));
        }
    }
    let highest_rated = highest.map(|(index, rating)| HighestRatedPick {
        offer: offers[index].clone(),
        index,
        rating,
    });

    let max_price = valid_prices(offers).into_iter().fold(0.0, f64::max);
    let best_value = best_by_score(offers, |o| hotel_value_score(o, max_price));

    HotelRecommendations {
        cheapest: cheapest(offers),
        highest_rated,
        best_value,
    }
}
