use crate::config::{normalize_region_code, AppConfig, PRICE_PROVIDER};
use crate::cost::compute_cost;
use crate::error::AppError;
use crate::models::{CostBreakdown, TripInput, TripRecord};
use crate::prices::eia::EiaPriceSource;
use crate::prices::{FuelPriceLookup, StaticPriceTable};
use crate::storage::{PriceCache, TripStore};
use chrono::{Duration, NaiveDate, Utc};
use reqwest::Client;
use tracing::{debug, info};

/// Ten years; longer TTLs are treated as this.
const MAX_CACHE_HOURS: u64 = 24 * 365 * 10;

pub struct TripService {
    prices: Box<dyn FuelPriceLookup>,
    overrides: StaticPriceTable,
    cache_ttl: Duration,
}

impl TripService {
    pub fn new(
        prices: Box<dyn FuelPriceLookup>,
        overrides: StaticPriceTable,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            prices,
            overrides,
            cache_ttl,
        }
    }

    /// Uses the EIA feed when an API key is available, configured prices otherwise.
    pub fn from_config(cfg: &AppConfig, api_key: Option<String>) -> Result<Self, AppError> {
        let overrides = StaticPriceTable::new(&cfg.price_overrides);
        let prices: Box<dyn FuelPriceLookup> = match api_key {
            Some(key) => {
                let client = Client::builder()
                    .connect_timeout(std::time::Duration::from_secs(10))
                    .timeout(std::time::Duration::from_secs(30))
                    .build()?;
                Box::new(EiaPriceSource::new(client, &cfg.eia, key))
            }
            None => {
                debug!("no {PRICE_PROVIDER} API key, using configured prices only");
                Box::new(overrides.clone())
            }
        };
        let hours = cfg.price_cache_hours.min(MAX_CACHE_HOURS) as i64;
        Ok(Self::new(prices, overrides, Duration::hours(hours)))
    }

    pub async fn resolve_price(
        &self,
        cache: &mut impl PriceCache,
        region: &str,
        date: NaiveDate,
    ) -> Result<f64, AppError> {
        let region = normalize_region_code(region);
        if let Some(price) = self.overrides.get(&region) {
            debug!(%region, price, "using configured price override");
            return Ok(price);
        }

        let now = Utc::now();
        if let Some(price) = cache.cached_price(&region, date, self.cache_ttl, now)? {
            debug!(%region, %date, price, "using cached price");
            return Ok(price);
        }

        info!(%region, %date, source = self.prices.name(), "fetching newest price data");
        let price = self.prices.price_per_gallon(&region, date).await?;
        cache.store_price(&region, date, price, now)?;
        Ok(price)
    }

    pub async fn quote(
        &self,
        cache: &mut impl PriceCache,
        input: &TripInput,
    ) -> Result<CostBreakdown, AppError> {
        input.validate()?;
        let price = self
            .resolve_price(cache, &input.region_code, input.start_time.date())
            .await?;
        compute_cost(input, price)
    }

    pub async fn log_trip<S>(
        &self,
        store: &mut S,
        input: &TripInput,
    ) -> Result<TripRecord, AppError>
    where
        S: TripStore + PriceCache,
    {
        let cost = self.quote(&mut *store, input).await?;
        let record = store.create_trip(input, &cost, Utc::now())?;
        info!(id = record.id, total_cost = cost.total_cost, "logged trip");
        Ok(record)
    }

    pub async fn update_trip<S>(
        &self,
        store: &mut S,
        id: i64,
        input: &TripInput,
    ) -> Result<TripRecord, AppError>
    where
        S: TripStore + PriceCache,
    {
        store.get_trip(id)?;
        let cost = self.quote(&mut *store, input).await?;
        let record = store.update_trip(id, input, &cost, Utc::now())?;
        info!(id, total_cost = cost.total_cost, "updated trip");
        Ok(record)
    }
}
