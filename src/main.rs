// travel-search: command-line driver for the aggregation engine
// Loads configuration from the environment, registers the configured providers and prints
// results as pretty JSON on stdout.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use travel_aggregator::amadeus::AmadeusProvider;
use travel_aggregator::clock::{Clock, SystemClock};
use travel_aggregator::config::EngineConfig;
use travel_aggregator::models::{FlightSearchParams, HotelSearchParams, TravelClass};
use travel_aggregator::price_tracker::{PriceTrackRequest, PriceTracker};
use travel_aggregator::skyscanner::SkyscannerProvider;
use travel_aggregator::telemetry::init_tracing;
use travel_aggregator::SearchAggregator;

#[derive(Parser)]
#[command(name = "travel-search")]
#[command(about = "Search and compare flights and hotels across travel providers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search flights across providers
    Flights(FlightArgs),
    /// Search hotels across providers
    Hotels(HotelArgs),
    /// Suggest cities and airports matching a query
    Locations { query: String },
    /// Run a tracked search, repeated to show cache reuse
    Track {
        /// JSON request, e.g. {"type":"flight","params":{...}}
        request: String,
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl From<CabinClass> for TravelClass {
    fn from(class: CabinClass) -> Self {
        match class {
            CabinClass::Economy => TravelClass::Economy,
            CabinClass::PremiumEconomy => TravelClass::PremiumEconomy,
            CabinClass::Business => TravelClass::Business,
            CabinClass::First => TravelClass::First,
        }
    }
}

#[derive(Args)]
struct FlightArgs {
    origin: String,
    destination: String,
    #[arg(long)]
    date: String,
    #[arg(long)]
    return_date: Option<String>,
    #[arg(long, default_value_t = 1)]
    adults: u32,
    #[arg(long, default_value_t = 0)]
    children: u32,
    #[arg(long, default_value_t = 0)]
    infants: u32,
    #[arg(long, value_enum)]
    class: Option<CabinClass>,
    #[arg(long, default_value = "USD")]
    currency: String,
    #[arg(long)]
    non_stop: bool,
    #[arg(long, default_value_t = 10)]
    max: u32,
    /// Comma separated provider names; defaults come from configuration
    #[arg(long, value_delimiter = ',')]
    providers: Vec<String>,
}

#[derive(Args)]
struct HotelArgs {
    #[arg(long)]
    city: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lng: Option<f64>,
    #[arg(long)]
    radius: Option<u32>,
    #[arg(long)]
    check_in: String,
    #[arg(long)]
    check_out: String,
    #[arg(long, default_value_t = 1)]
    adults: u32,
    #[arg(long, default_value_t = 1)]
    rooms: u32,
    #[arg(long, default_value = "USD")]
    currency: String,
    #[arg(long, value_delimiter = ',')]
    providers: Vec<String>,
}

fn provider_selection(providers: &[String]) -> Option<&[String]> {
    (!providers.is_empty()).then_some(providers)
}

fn build_aggregator(config: &EngineConfig, clock: Arc<dyn Clock>) -> Result<SearchAggregator> {
    let mut aggregator = SearchAggregator::new(&config.aggregation, clock.clone());
    aggregator.register(Arc::new(
        AmadeusProvider::new(&config.amadeus, clock).context("failed to build amadeus provider")?,
    ));
    aggregator.register(Arc::new(
        SkyscannerProvider::new(&config.skyscanner)
            .context("failed to build skyscanner provider")?,
    ));
    Ok(aggregator)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let aggregator = build_aggregator(&config, clock.clone())?;

    match cli.command {
        Command::Flights(args) => {
            let params = FlightSearchParams {
                origin: args.origin,
                destination: args.destination,
                departure_date: args.date,
                return_date: args.return_date,
                adults: args.adults,
                children: args.children,
                infants: args.infants,
                travel_class: args.class.map(TravelClass::from),
                currency: args.currency,
                non_stop: args.non_stop,
                max_results: args.max,
            };
            let result = aggregator
                .search_flights(&params, provider_selection(&args.providers))
                .await;
            print_json(&result)?;
        }
        Command::Hotels(args) => {
            let params = HotelSearchParams {
                city_code: args.city,
                latitude: args.lat,
                longitude: args.lng,
                radius: args.radius,
                check_in_date: args.check_in,
                check_out_date: args.check_out,
                adults: args.adults,
                rooms: args.rooms,
                currency: args.currency,
                ..Default::default()
            };
            let result = aggregator
                .search_hotels(&params, provider_selection(&args.providers))
                .await;
            print_json(&result)?;
        }
        Command::Locations { query } => {
            let suggestions = aggregator.get_location_suggestions(&query).await;
            print_json(&suggestions)?;
        }
        Command::Track { request, repeat } => {
            let request: PriceTrackRequest =
                serde_json::from_str(&request).context("invalid tracking request")?;
            let tracker = PriceTracker::new(Arc::new(aggregator), &config.cache, clock);
            for _ in 0..repeat.max(1) {
                let tracked = tracker.track_prices(&request).await?;
                print_json(&tracked)?;
            }
            print_json(&tracker.stats())?;
        }
    }

    Ok(())
}
