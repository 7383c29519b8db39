use crate::error::AppError;
use crate::models::TripRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    StartTime,
    Miles,
    CityMpg,
    HighwayMpg,
    HighwayPercent,
    Region,
    BlendedMpg,
    Gallons,
    GasPrice,
    TotalCost,
    Category,
    Reason,
}

impl FromStr for SortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.trim().to_ascii_lowercase().as_str() {
            "start_time" | "date" => SortKey::StartTime,
            "miles" => SortKey::Miles,
            "mpg_city" | "city_mpg" => SortKey::CityMpg,
            "mpg_highway" | "highway_mpg" => SortKey::HighwayMpg,
            "highway_percent" => SortKey::HighwayPercent,
            "region" | "state_code" => SortKey::Region,
            "blended_mpg" => SortKey::BlendedMpg,
            "gallons" | "gallons_used" => SortKey::Gallons,
            "gas_price" | "price" => SortKey::GasPrice,
            "total_cost" | "cost" => SortKey::TotalCost,
            "category" | "drive_type" => SortKey::Category,
            "reason" => SortKey::Reason,
            other => {
                return Err(AppError::InvalidInput(format!(
                    "unknown sort column '{other}'"
                )))
            }
        };
        Ok(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort and paging state for one history listing.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub sort: Option<SortKey>,
    pub direction: SortDirection,
    pub page: usize,
    pub per_page: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            sort: None,
            direction: SortDirection::Ascending,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub trips: Vec<TripRecord>,
    pub page: usize,
    pub total_pages: usize,
    pub total_trips: usize,
}

fn compare(a: &TripRecord, b: &TripRecord, key: SortKey) -> Ordering {
    let (ai, bi) = (&a.input, &b.input);
    match key {
        SortKey::StartTime => ai.start_time.cmp(&bi.start_time),
        SortKey::Miles => ai.distance_miles.total_cmp(&bi.distance_miles),
        SortKey::CityMpg => ai.city_mpg.total_cmp(&bi.city_mpg),
        SortKey::HighwayMpg => ai.highway_mpg.total_cmp(&bi.highway_mpg),
        SortKey::HighwayPercent => ai.highway_percent.cmp(&bi.highway_percent),
        SortKey::Region => ai.region_code.cmp(&bi.region_code),
        SortKey::BlendedMpg => a.cost.blended_mpg.total_cmp(&b.cost.blended_mpg),
        SortKey::Gallons => a.cost.gallons_used.total_cmp(&b.cost.gallons_used),
        SortKey::GasPrice => a.cost.price_per_gallon.total_cmp(&b.cost.price_per_gallon),
        SortKey::TotalCost => a.cost.total_cost.total_cmp(&b.cost.total_cost),
        SortKey::Category => ai.category.cmp(&bi.category),
        SortKey::Reason => ai.reason.cmp(&bi.reason),
    }
}

pub fn paginate(records: &[TripRecord], query: &HistoryQuery) -> HistoryPage {
    let mut sorted = records.to_vec();
    if let Some(key) = query.sort {
        sorted.sort_by(|a, b| match query.direction {
            SortDirection::Ascending => compare(a, b, key),
            SortDirection::Descending => compare(b, a, key),
        });
    }

    let per_page = query.per_page.max(1);
    let total_trips = sorted.len();
    let total_pages = total_trips.div_ceil(per_page).max(1);
    let page = query.page.clamp(1, total_pages);
    let trips = sorted
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    HistoryPage {
        trips,
        page,
        total_pages,
        total_trips,
    }
}
