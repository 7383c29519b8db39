use crate::error::AppError;
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const MAX_REGION_CODE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriveCategory {
    #[default]
    Required,
    Recreational,
}

impl DriveCategory {
    pub fn as_label(self) -> &'static str {
        match self {
            DriveCategory::Required => "required",
            DriveCategory::Recreational => "recreational",
        }
    }
}

impl fmt::Display for DriveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for DriveCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(DriveCategory::Required),
            "recreational" => Ok(DriveCategory::Recreational),
            other => Err(AppError::InvalidInput(format!(
                "unknown drive category '{other}'. Use required or recreational."
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripInput {
    pub distance_miles: f64,
    pub city_mpg: f64,
    pub highway_mpg: f64,
    pub highway_percent: u8,
    pub region_code: String,
    pub category: DriveCategory,
    pub reason: Option<String>,
    pub start_time: NaiveDateTime,
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl TripInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if !positive(self.distance_miles) {
            return Err(AppError::InvalidInput(format!(
                "distance must be greater than zero, got {}",
                self.distance_miles
            )));
        }
        if !positive(self.city_mpg) {
            return Err(AppError::InvalidInput(format!(
                "city efficiency must be greater than zero, got {}",
                self.city_mpg
            )));
        }
        if !positive(self.highway_mpg) {
            return Err(AppError::InvalidInput(format!(
                "highway efficiency must be greater than zero, got {}",
                self.highway_mpg
            )));
        }
        if self.highway_percent > 100 {
            return Err(AppError::InvalidInput(format!(
                "highway percent must be between 0 and 100, got {}",
                self.highway_percent
            )));
        }
        let region = self.region_code.trim();
        if region.is_empty()
            || region.len() > MAX_REGION_CODE_LEN
            || !region.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(AppError::InvalidInput(format!(
                "region code '{}' must be 1-{MAX_REGION_CODE_LEN} letters or digits",
                self.region_code
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub blended_mpg: f64,
    pub gallons_used: f64,
    pub price_per_gallon: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: i64,
    #[serde(flatten)]
    pub input: TripInput,
    #[serde(flatten)]
    pub cost: CostBreakdown,
    pub calculated_at: DateTime<Utc>,
}

impl TripRecord {
    pub fn month(&self) -> MonthKey {
        MonthKey::of(&self.input.start_time)
    }

    /// Checks a stored record before it takes part in aggregation.
    pub fn validate(&self) -> Result<(), AppError> {
        self.input
            .validate()
            .map_err(|e| AppError::InvalidRecord(format!("trip {}: {e}", self.id)))?;

        let CostBreakdown {
            blended_mpg,
            gallons_used,
            price_per_gallon,
            total_cost,
        } = self.cost;
        if !positive(blended_mpg) || !positive(gallons_used) || !positive(price_per_gallon) {
            return Err(AppError::InvalidRecord(format!(
                "trip {}: cost breakdown has non-positive values",
                self.id
            )));
        }
        if !total_cost.is_finite() || total_cost < 0.0 {
            return Err(AppError::InvalidRecord(format!(
                "trip {}: total cost {total_cost} is not a valid amount",
                self.id
            )));
        }
        Ok(())
    }
}

/// Calendar month of a trip's recorded start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, AppError> {
        if !(1..=12).contains(&month) {
            return Err(AppError::InvalidInput(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(ts: &NaiveDateTime) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || AppError::InvalidInput(format!("month '{s}' must look like YYYY-MM"));
        let (year, month) = s.trim().split_once('-').ok_or_else(bad)?;
        let year: i32 = year.parse().map_err(|_| bad())?;
        let month: u32 = month.parse().map_err(|_| bad())?;
        MonthKey::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverallStats {
    pub num_drives: u64,
    pub sum_costs: f64,
    pub avg_cost: f64,
    pub total_miles: f64,
    pub required_drives_count: u64,
    pub recreational_drives_count: u64,
    pub required_drives_cost: f64,
    pub recreational_drives_cost: f64,
    pub overall_efficiency: f64,
    pub avg_gas_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub month: MonthKey,
    pub trip_count: u64,
    pub total_miles: f64,
    pub total_spent: f64,
    pub average_cost_per_trip: f64,
    pub required_count: u64,
    pub recreational_count: u64,
    pub required_cost: f64,
    pub recreational_cost: f64,
}
