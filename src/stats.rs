use crate::error::AppError;
use crate::models::{DriveCategory, MonthKey, MonthlyAggregate, OverallStats, TripRecord};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Totals {
    count: u64,
    miles: f64,
    cost: f64,
    required_count: u64,
    required_cost: f64,
    mpg_sum: f64,
    price_sum: f64,
}

impl Totals {
    fn add(&mut self, record: &TripRecord) {
        self.count += 1;
        self.miles += record.input.distance_miles;
        self.cost += record.cost.total_cost;
        self.mpg_sum += record.cost.blended_mpg;
        self.price_sum += record.cost.price_per_gallon;
        if record.input.category == DriveCategory::Required {
            self.required_count += 1;
            self.required_cost += record.cost.total_cost;
        }
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            sum / self.count as f64
        }
    }
}

fn validate_all(records: &[TripRecord]) -> Result<(), AppError> {
    records.iter().try_for_each(TripRecord::validate)
}

pub fn summarize_all(records: &[TripRecord]) -> Result<OverallStats, AppError> {
    validate_all(records)?;

    let mut totals = Totals::default();
    records.iter().for_each(|r| totals.add(r));

    Ok(OverallStats {
        num_drives: totals.count,
        sum_costs: totals.cost,
        avg_cost: totals.mean(totals.cost),
        total_miles: totals.miles,
        required_drives_count: totals.required_count,
        recreational_drives_count: totals.count - totals.required_count,
        required_drives_cost: totals.required_cost,
        recreational_drives_cost: totals.cost - totals.required_cost,
        overall_efficiency: totals.mean(totals.mpg_sum),
        avg_gas_price: totals.mean(totals.price_sum),
    })
}

/// One aggregate per calendar month that has trips, most recent month first.
pub fn summarize_by_month(records: &[TripRecord]) -> Result<Vec<MonthlyAggregate>, AppError> {
    validate_all(records)?;

    let mut by_month: BTreeMap<MonthKey, Totals> = BTreeMap::new();
    for record in records {
        by_month.entry(record.month()).or_default().add(record);
    }

    Ok(by_month
        .into_iter()
        .rev()
        .map(|(month, t)| MonthlyAggregate {
            month,
            trip_count: t.count,
            total_miles: t.miles,
            total_spent: t.cost,
            average_cost_per_trip: t.mean(t.cost),
            required_count: t.required_count,
            recreational_count: t.count - t.required_count,
            required_cost: t.required_cost,
            recreational_cost: t.cost - t.required_cost,
        })
        .collect())
}

pub fn available_months(records: &[TripRecord]) -> Result<Vec<MonthKey>, AppError> {
    validate_all(records)?;

    let mut months: Vec<MonthKey> = records.iter().map(TripRecord::month).collect();
    months.sort_unstable_by(|a, b| b.cmp(a));
    months.dedup();
    Ok(months)
}

/// The selected month next to the one before it. Months without trips are left out.
pub fn month_comparison(
    records: &[TripRecord],
    month: MonthKey,
) -> Result<Vec<MonthlyAggregate>, AppError> {
    validate_all(records)?;

    let previous = month.previous();
    let in_window: Vec<TripRecord> = records
        .iter()
        .filter(|r| {
            let m = r.month();
            m == month || m == previous
        })
        .cloned()
        .collect();
    summarize_by_month(&in_window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DriveCategory::{Recreational, Required};
    use crate::test_support::{at, record};

    const TOLERANCE: f64 = 1e-9;

    fn mixed_records() -> Vec<TripRecord> {
        vec![
            record(1, at(2024, 1, 3, 9), Required, 12.0, 2.10),
            record(2, at(2024, 1, 20, 18), Recreational, 80.5, 11.75),
            record(3, at(2024, 2, 1, 7), Required, 30.0, 4.40),
            record(4, at(2023, 12, 31, 23), Recreational, 5.0, 0.95),
            record(5, at(2024, 2, 29, 12), Required, 210.0, 27.30),
            record(6, at(2024, 2, 29, 12), Recreational, 44.0, 6.05),
        ]
    }

    #[test]
    fn summarize_all_of_nothing_is_zeroed() {
        let stats = summarize_all(&[]).expect("empty summary");
        assert_eq!(stats.num_drives, 0);
        assert_eq!(stats.sum_costs, 0.0);
        assert_eq!(stats.avg_cost, 0.0);
        assert_eq!(stats.total_miles, 0.0);
        assert_eq!(stats.overall_efficiency, 0.0);
        assert_eq!(stats.avg_gas_price, 0.0);
    }

    #[test]
    fn summarize_all_splits_by_category() {
        let records = vec![
            record(1, at(2024, 5, 2, 8), Required, 40.0, 10.0),
            record(2, at(2024, 5, 9, 8), Recreational, 60.0, 20.0),
        ];
        let stats = summarize_all(&records).expect("summary");
        assert_eq!(stats.num_drives, 2);
        assert!((stats.sum_costs - 30.0).abs() < TOLERANCE);
        assert!((stats.avg_cost - 15.0).abs() < TOLERANCE);
        assert!((stats.total_miles - 100.0).abs() < TOLERANCE);
        assert_eq!(stats.required_drives_count, 1);
        assert_eq!(stats.recreational_drives_count, 1);
        assert!((stats.required_drives_cost - 10.0).abs() < TOLERANCE);
        assert!((stats.recreational_drives_cost - 20.0).abs() < TOLERANCE);
        assert!((stats.avg_gas_price - 3.5).abs() < TOLERANCE);
        assert!((stats.overall_efficiency - 30.0).abs() < TOLERANCE);
    }

    #[test]
    fn category_split_adds_up_to_totals() {
        let stats = summarize_all(&mixed_records()).expect("summary");
        assert_eq!(
            stats.required_drives_count + stats.recreational_drives_count,
            stats.num_drives
        );
        assert!(
            (stats.required_drives_cost + stats.recreational_drives_cost - stats.sum_costs).abs()
                < TOLERANCE
        );
    }

    #[test]
    fn summarize_by_month_orders_most_recent_first() {
        let months = summarize_by_month(&mixed_records()).expect("monthly");
        let keys: Vec<String> = months.iter().map(|m| m.month.to_string()).collect();
        assert_eq!(keys, vec!["2024-02", "2024-01", "2023-12"]);

        let feb = &months[0];
        assert_eq!(feb.trip_count, 3);
        assert_eq!(feb.required_count, 2);
        assert_eq!(feb.recreational_count, 1);
        assert!((feb.total_spent - 37.75).abs() < TOLERANCE);
        assert!((feb.required_cost - 31.70).abs() < TOLERANCE);
        assert!((feb.recreational_cost - 6.05).abs() < TOLERANCE);
        assert!((feb.total_miles - 284.0).abs() < TOLERANCE);
        assert!((feb.average_cost_per_trip - 37.75 / 3.0).abs() < TOLERANCE);

        for m in &months {
            assert_eq!(m.required_count + m.recreational_count, m.trip_count);
        }
    }

    #[test]
    fn summarize_by_month_never_invents_empty_months() {
        let records = vec![
            record(1, at(2024, 1, 10, 9), Required, 10.0, 1.0),
            record(2, at(2024, 6, 10, 9), Required, 10.0, 1.0),
        ];
        let months = summarize_by_month(&records).expect("monthly");
        assert_eq!(months.len(), 2);
    }

    #[test]
    fn summarize_by_month_is_order_independent() {
        let forward = mixed_records();
        let mut reversed = forward.clone();
        reversed.reverse();
        let mut rotated = forward.clone();
        rotated.rotate_left(2);

        let expected = summarize_by_month(&forward).expect("monthly");
        for shuffled in [reversed, rotated] {
            let got = summarize_by_month(&shuffled).expect("monthly");
            assert_eq!(got.len(), expected.len());
            for (a, b) in got.iter().zip(&expected) {
                assert_eq!(a.month, b.month);
                assert_eq!(a.trip_count, b.trip_count);
                assert_eq!(a.required_count, b.required_count);
                assert!((a.total_spent - b.total_spent).abs() < TOLERANCE);
                assert!((a.total_miles - b.total_miles).abs() < TOLERANCE);
            }
        }
    }

    #[test]
    fn malformed_records_fail_the_whole_summary() {
        let mut records = mixed_records();
        records[3].cost.total_cost = f64::NAN;
        assert!(matches!(
            summarize_all(&records),
            Err(AppError::InvalidRecord(_))
        ));
        assert!(matches!(
            summarize_by_month(&records),
            Err(AppError::InvalidRecord(_))
        ));
    }

    #[test]
    fn malformed_records_outside_the_window_still_fail() {
        let mut records = mixed_records();
        records[3].cost.price_per_gallon = -1.0;
        let feb = MonthKey::new(2024, 2).expect("month");
        assert!(matches!(
            month_comparison(&records, feb),
            Err(AppError::InvalidRecord(_))
        ));
        assert!(matches!(
            available_months(&records),
            Err(AppError::InvalidRecord(_))
        ));
    }

    #[test]
    fn available_months_are_distinct_and_descending() {
        let months = available_months(&mixed_records()).expect("months");
        let keys: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["2024-02", "2024-01", "2023-12"]);
        assert!(available_months(&[]).expect("months").is_empty());
    }

    #[test]
    fn month_comparison_returns_selected_and_previous() {
        let jan = MonthKey::new(2024, 1).expect("month");
        let months = month_comparison(&mixed_records(), jan).expect("comparison");
        let keys: Vec<String> = months.iter().map(|m| m.month.to_string()).collect();
        assert_eq!(keys, vec!["2024-01", "2023-12"]);
        assert_eq!(months[0].trip_count, 2);
        assert_eq!(months[1].trip_count, 1);
    }

    #[test]
    fn month_comparison_skips_months_without_trips() {
        let apr = MonthKey::new(2024, 4).expect("month");
        let records = vec![record(1, at(2024, 4, 1, 9), Required, 10.0, 1.5)];
        let months = month_comparison(&records, apr).expect("comparison");
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].month, apr);
    }
}
