//! Fixtures shared by the unit tests.
//!
//! Only compiled during tests (`#[cfg(test)]`).

use crate::error::AppError;
use crate::models::{CostBreakdown, DriveCategory, TripInput, TripRecord};
use crate::prices::FuelPriceLookup;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid fixture timestamp")
}

/// 100 miles, 25 city / 35 highway, half highway, in NC.
pub fn sample_input() -> TripInput {
    TripInput {
        distance_miles: 100.0,
        city_mpg: 25.0,
        highway_mpg: 35.0,
        highway_percent: 50,
        region_code: "NC".into(),
        category: DriveCategory::Required,
        reason: None,
        start_time: at(2024, 3, 5, 8),
    }
}

/// A stored trip with only the fields aggregation cares about filled in meaningfully.
pub fn record(
    id: i64,
    start_time: NaiveDateTime,
    category: DriveCategory,
    miles: f64,
    total_cost: f64,
) -> TripRecord {
    let price = 3.5;
    TripRecord {
        id,
        input: TripInput {
            distance_miles: miles,
            category,
            start_time,
            ..sample_input()
        },
        cost: CostBreakdown {
            blended_mpg: 30.0,
            gallons_used: total_cost / price,
            price_per_gallon: price,
            total_cost,
        },
        calculated_at: Utc
            .timestamp_opt(1_700_000_000 + id * 60, 0)
            .single()
            .expect("valid fixed timestamp"),
    }
}

/// Lookup that always answers with one price and counts how often it was asked.
/// Clones share the counter, so a test can keep one after boxing the other.
#[derive(Clone)]
pub struct CountingLookup {
    pub price: f64,
    calls: Arc<AtomicUsize>,
}

impl CountingLookup {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FuelPriceLookup for CountingLookup {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn price_per_gallon(&self, _region: &str, _date: NaiveDate) -> Result<f64, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.price)
    }
}
