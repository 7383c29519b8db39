use crate::error::AppError;
use crate::models::{CostBreakdown, TripInput};

/// Distance-weighted harmonic blend of city and highway efficiency.
///
/// Gallons add up across the two driving modes, miles per gallon do not, so the
/// blend is `1 / ((1 - h) / city + h / highway)` with `h` the highway share.
pub fn blended_mpg(city_mpg: f64, highway_mpg: f64, highway_percent: u8) -> f64 {
    match highway_percent {
        0 => city_mpg,
        100 => highway_mpg,
        pct => {
            let h = f64::from(pct) / 100.0;
            1.0 / ((1.0 - h) / city_mpg + h / highway_mpg)
        }
    }
}

pub fn compute_cost(input: &TripInput, price_per_gallon: f64) -> Result<CostBreakdown, AppError> {
    input.validate()?;
    if !price_per_gallon.is_finite() || price_per_gallon <= 0.0 {
        return Err(AppError::InvalidPrice(price_per_gallon));
    }

    let blended_mpg = blended_mpg(input.city_mpg, input.highway_mpg, input.highway_percent);
    let gallons_used = input.distance_miles / blended_mpg;
    let total_cost = gallons_used * price_per_gallon;

    // Each input can be in range while the quotient still overflows or underflows.
    if ![blended_mpg, gallons_used, total_cost]
        .iter()
        .all(|v| v.is_finite() && *v > 0.0)
    {
        return Err(AppError::InvalidInput(format!(
            "trip of {} miles at {blended_mpg} mpg does not give a usable cost",
            input.distance_miles
        )));
    }

    Ok(CostBreakdown {
        blended_mpg,
        gallons_used,
        price_per_gallon,
        total_cost,
    })
}
