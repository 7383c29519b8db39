mod config;
mod cost;
mod error;
mod history;
mod log;
mod models;
mod prices;
mod report;
mod service;
mod stats;
mod storage;
#[cfg(test)]
mod test_support;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use clap::{Args, Parser, Subcommand};
use crate::config::{
    db_path, ensure_initialized, find_api_key, load_config, normalize_region_code, set_api_key,
    AppConfig, PRICE_PROVIDER,
};
use crate::error::AppError;
use crate::history::{HistoryQuery, SortDirection, SortKey};
use crate::models::{DriveCategory, MonthKey, TripInput};
use crate::service::TripService;
use crate::storage::{Storage, TripStore};

const DEFAULT_HIGHWAY_PERCENT: u8 = 50;

#[derive(Debug, Parser)]
#[command(name = "drive-meter")]
#[command(about = "Vehicle trip cost logger and statistics")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the config and data directories
    Init,
    /// Store the EIA API key used to fetch gas prices
    SetApiKey {
        #[arg(long)]
        key: String,
    },
    /// Price a trip and save it
    Log {
        #[command(flatten)]
        trip: TripArgs,
        /// Print the cost without saving the trip
        #[arg(long)]
        dry_run: bool,
    },
    /// List saved trips a page at a time
    History {
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Change a saved trip and re-price it
    Edit {
        id: i64,
        #[command(flatten)]
        trip: TripArgs,
    },
    /// Remove a saved trip
    Delete {
        id: i64,
    },
    /// Overall statistics
    Stats {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Per-month statistics, or one month next to the month before it
    Monthly {
        #[arg(long)]
        month: Option<String>,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Months that have trips, newest first
    Months,
    /// Print every saved trip as JSON or CSV
    Export {
        #[arg(long, default_value = "json")]
        format: String,
    },
}

#[derive(Debug, Args, Default)]
struct TripArgs {
    #[arg(long)]
    miles: Option<f64>,
    /// Configured vehicle to take city/highway MPG from
    #[arg(long)]
    vehicle: Option<String>,
    #[arg(long)]
    city_mpg: Option<f64>,
    #[arg(long)]
    highway_mpg: Option<f64>,
    #[arg(long)]
    highway_percent: Option<u8>,
    #[arg(long)]
    region: Option<String>,
    /// required or recreational
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    reason: Option<String>,
    /// Local start time, e.g. 2024-03-05T08:30
    #[arg(long)]
    start: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn validate_format(input: &str) -> Result<OutputFormat, AppError> {
    match input.to_ascii_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => Err(AppError::Config(
            "Unsupported format. Use text or json.".into(),
        )),
    }
}

fn parse_start(raw: &str) -> Result<NaiveDateTime, AppError> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "start time '{raw}' must look like 2024-03-05T08:30 or 2024-03-05"
            ))
        })
}

fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Fills a trip from flags, falling back to `base` (when editing) and then to config defaults.
fn build_input(
    args: TripArgs,
    cfg: &AppConfig,
    base: Option<&TripInput>,
) -> Result<TripInput, AppError> {
    let distance_miles = args
        .miles
        .or(base.map(|b| b.distance_miles))
        .ok_or_else(|| AppError::InvalidInput("--miles is required".into()))?;

    let vehicle = match &args.vehicle {
        Some(name) => Some(cfg.find_vehicle(name).ok_or_else(|| {
            AppError::InvalidInput(format!("no vehicle named '{name}' in config"))
        })?),
        None => None,
    };
    let (default_city, default_highway) = match (vehicle, base, cfg.vehicles.first()) {
        (Some(v), _, _) => (Some(v.city_mpg), Some(v.highway_mpg)),
        (None, Some(b), _) => (Some(b.city_mpg), Some(b.highway_mpg)),
        (None, None, Some(v)) => (Some(v.city_mpg), Some(v.highway_mpg)),
        (None, None, None) => (None, None),
    };
    let city_mpg = args.city_mpg.or(default_city).ok_or_else(|| {
        AppError::InvalidInput("--city-mpg is required when no vehicle is configured".into())
    })?;
    let highway_mpg = args.highway_mpg.or(default_highway).ok_or_else(|| {
        AppError::InvalidInput("--highway-mpg is required when no vehicle is configured".into())
    })?;

    let category = match &args.category {
        Some(raw) => raw.parse::<DriveCategory>()?,
        None => base.map(|b| b.category).unwrap_or_default(),
    };
    let reason = match args.reason {
        Some(r) => Some(r.trim().to_string()).filter(|r| !r.is_empty()),
        None => base.and_then(|b| b.reason.clone()),
    };
    let start_time = match &args.start {
        Some(raw) => parse_start(raw)?,
        None => base.map(|b| b.start_time).unwrap_or_else(now_local),
    };

    let input = TripInput {
        distance_miles,
        city_mpg,
        highway_mpg,
        highway_percent: args
            .highway_percent
            .or(base.map(|b| b.highway_percent))
            .unwrap_or(DEFAULT_HIGHWAY_PERCENT),
        region_code: args
            .region
            .as_deref()
            .map(normalize_region_code)
            .or(base.map(|b| b.region_code.clone()))
            .unwrap_or_else(|| cfg.default_region.clone()),
        category,
        reason,
        start_time,
    };
    input.validate()?;
    Ok(input)
}

fn open_storage() -> Result<Storage, AppError> {
    ensure_initialized()?;
    Storage::open(&db_path()?)
}

fn trip_service(cfg: &AppConfig) -> Result<TripService, AppError> {
    TripService::from_config(cfg, find_api_key(PRICE_PROVIDER))
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    log::init_logging(cli.verbose);

    match cli.command {
        Commands::Init => {
            ensure_initialized()?;
            println!("Initialized drive-meter config and data directories.");
        }
        Commands::SetApiKey { key } => {
            ensure_initialized()?;
            set_api_key(PRICE_PROVIDER, &key)?;
            println!("EIA API key stored.");
        }
        Commands::Log { trip, dry_run } => {
            let cfg = load_config()?;
            let input = build_input(trip, &cfg, None)?;
            let mut storage = open_storage()?;
            let svc = trip_service(&cfg)?;
            if dry_run {
                let cost = svc.quote(&mut storage, &input).await?;
                println!("{}", report::breakdown_text(&input, &cost));
            } else {
                let record = svc.log_trip(&mut storage, &input).await?;
                println!("Trip {} saved.", record.id);
                println!("{}", report::breakdown_text(&record.input, &record.cost));
            }
        }
        Commands::History {
            sort,
            desc,
            page,
            per_page,
        } => {
            let cfg = load_config()?;
            let storage = open_storage()?;
            let query = HistoryQuery {
                sort: sort.as_deref().map(str::parse::<SortKey>).transpose()?,
                direction: if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
                page,
                per_page: per_page.unwrap_or(cfg.history_page_size),
            };
            let trips = storage.list_trips(None)?;
            let page = history::paginate(&trips, &query);
            println!("{}", report::trips_table(&page.trips));
            println!(
                "Page {} of {} ({} drives total)",
                page.page, page.total_pages, page.total_trips
            );
        }
        Commands::Edit { id, trip } => {
            let cfg = load_config()?;
            let mut storage = open_storage()?;
            let existing = storage.get_trip(id)?;
            let input = build_input(trip, &cfg, Some(&existing.input))?;
            let svc = trip_service(&cfg)?;
            let record = svc.update_trip(&mut storage, id, &input).await?;
            println!("Trip {} updated.", record.id);
            println!("{}", report::breakdown_text(&record.input, &record.cost));
        }
        Commands::Delete { id } => {
            let mut storage = open_storage()?;
            storage.delete_trip(id)?;
            println!("Trip {id} deleted.");
        }
        Commands::Stats { format } => {
            let format = validate_format(&format)?;
            let storage = open_storage()?;
            let overall = stats::summarize_all(&storage.list_trips(None)?)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&overall)?),
                OutputFormat::Text => println!("{}", report::overall_table(&overall)),
            }
        }
        Commands::Monthly { month, format } => {
            let format = validate_format(&format)?;
            let storage = open_storage()?;
            let trips = storage.list_trips(None)?;
            let months = match month {
                Some(raw) => stats::month_comparison(&trips, raw.parse::<MonthKey>()?)?,
                None => stats::summarize_by_month(&trips)?,
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&months)?),
                OutputFormat::Text if months.is_empty() => {
                    println!("Add some drives to see statistics.")
                }
                OutputFormat::Text => {
                    let current = stats::available_months(&trips)?.first().copied();
                    println!("{}", report::monthly_table(&months, current));
                }
            }
        }
        Commands::Months => {
            let storage = open_storage()?;
            for month in stats::available_months(&storage.list_trips(None)?)? {
                println!("{month}");
            }
        }
        Commands::Export { format } => {
            let storage = open_storage()?;
            if format.eq_ignore_ascii_case("json") {
                println!("{}", storage.export_trips_json()?);
            } else if format.eq_ignore_ascii_case("csv") {
                print!("{}", report::trips_csv(&storage.list_trips(None)?));
            } else {
                return Err(AppError::Config(
                    "Unsupported export format. Use json or csv".into(),
                ));
            }
        }
    }

    Ok(())
}
