use crate::config::normalize_region_code;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

pub mod eia;

/// Source of retail fuel prices, in currency units per gallon.
#[async_trait]
pub trait FuelPriceLookup: Send + Sync {
    fn name(&self) -> &'static str;

    /// Price for `region` that applied on `date`. Fails with `PriceUnavailable`.
    async fn price_per_gallon(&self, region: &str, date: NaiveDate) -> Result<f64, AppError>;
}

/// Fixed per-region prices, taken from the `price_overrides` config table.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceTable {
    prices: HashMap<String, f64>,
}

impl StaticPriceTable {
    pub fn new(prices: &HashMap<String, f64>) -> Self {
        Self {
            prices: prices
                .iter()
                .map(|(region, price)| (normalize_region_code(region), *price))
                .collect(),
        }
    }

    pub fn get(&self, region: &str) -> Option<f64> {
        self.prices.get(&normalize_region_code(region)).copied()
    }
}

#[async_trait]
impl FuelPriceLookup for StaticPriceTable {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn price_per_gallon(&self, region: &str, _date: NaiveDate) -> Result<f64, AppError> {
        self.get(region).ok_or_else(|| {
            AppError::PriceUnavailable(format!(
                "no configured price for region '{region}' and no EIA API key set"
            ))
        })
    }
}
