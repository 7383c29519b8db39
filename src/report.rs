use crate::models::{CostBreakdown, MonthKey, MonthlyAggregate, OverallStats, TripInput, TripRecord};
use chrono::NaiveDateTime;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

pub fn money(amount: f64) -> String {
    format!("${amount:.2}")
}

/// `3/5/24 at 8:30 am`
pub fn format_start(ts: &NaiveDateTime) -> String {
    ts.format("%-m/%-d/%y at %-I:%M %P").to_string()
}

pub fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan).add_attribute(Attribute::Bold)),
        );
    table
}

fn num(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

pub fn breakdown_text(input: &TripInput, cost: &CostBreakdown) -> String {
    format!(
        "Blended fuel efficiency: {:.1} MPG\n\
         Gasoline needed: {:.2} gallons\n\
         Gas price in {}: ${:.3}/gallon\n\
         Total estimated cost: {}",
        cost.blended_mpg,
        cost.gallons_used,
        input.region_code,
        cost.price_per_gallon,
        money(cost.total_cost),
    )
}

pub fn trips_table(trips: &[TripRecord]) -> Table {
    let mut table = new_table(&[
        "ID", "Date", "Miles", "City MPG", "Hwy MPG", "Hwy %", "Region", "Blended MPG", "Gallons",
        "Gas Price", "Total Cost", "Type", "Reason",
    ]);
    for t in trips {
        table.add_row(vec![
            num(t.id.to_string()),
            Cell::new(format_start(&t.input.start_time)),
            num(format!("{:.1}", t.input.distance_miles)),
            num(format!("{:.1}", t.input.city_mpg)),
            num(format!("{:.1}", t.input.highway_mpg)),
            num(t.input.highway_percent.to_string()),
            Cell::new(&t.input.region_code),
            num(format!("{:.1}", t.cost.blended_mpg)),
            num(format!("{:.2}", t.cost.gallons_used)),
            num(format!("${:.3}", t.cost.price_per_gallon)),
            num(money(t.cost.total_cost)).fg(Color::Green),
            Cell::new(t.input.category.as_label()),
            Cell::new(t.input.reason.as_deref().unwrap_or("")),
        ]);
    }
    table
}

pub fn overall_table(stats: &OverallStats) -> Table {
    let mut table = new_table(&[
        "Total Drives",
        "Total Cost",
        "Avg Cost/Drive",
        "Total Miles",
        "Required Drives",
        "Recreational Drives",
        "Required Drive Cost",
        "Recreational Drive Cost",
        "Avg MPG",
        "Avg Gas Price",
    ]);
    table.add_row(vec![
        num(stats.num_drives.to_string()),
        num(money(stats.sum_costs)),
        num(money(stats.avg_cost)),
        num(format!("{:.0} miles", stats.total_miles)),
        num(stats.required_drives_count.to_string()),
        num(stats.recreational_drives_count.to_string()),
        num(money(stats.required_drives_cost)),
        num(money(stats.recreational_drives_cost)),
        num(format!("{:.1}", stats.overall_efficiency)),
        num(format!("${:.3}", stats.avg_gas_price)),
    ]);
    table
}

/// `current` is tagged in the month column.
pub fn monthly_table(months: &[MonthlyAggregate], current: Option<MonthKey>) -> Table {
    let mut table = new_table(&[
        "Month",
        "Trips",
        "Total Spent",
        "Avg Cost/Trip",
        "Total Miles",
        "Required Drives",
        "Recreational Drives",
        "Required Drive Cost",
        "Recreational Drive Cost",
    ]);
    for m in months {
        let label = if Some(m.month) == current {
            format!("{} (current)", m.month)
        } else {
            m.month.to_string()
        };
        table.add_row(vec![
            Cell::new(label),
            num(m.trip_count.to_string()),
            num(money(m.total_spent)),
            num(money(m.average_cost_per_trip)),
            num(format!("{:.0} miles", m.total_miles)),
            num(m.required_count.to_string()),
            num(m.recreational_count.to_string()),
            num(money(m.required_cost)),
            num(money(m.recreational_cost)),
        ]);
    }
    table
}

pub const CSV_HEADER: &str = "id,start_time,miles,city_mpg,highway_mpg,highway_percent,region_code,\
     category,reason,blended_mpg,gallons_used,price_per_gallon,total_cost,calculated_at";

pub fn trips_csv(trips: &[TripRecord]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for t in trips {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            t.id,
            t.input.start_time.format(crate::models::START_TIME_FORMAT),
            t.input.distance_miles,
            t.input.city_mpg,
            t.input.highway_mpg,
            t.input.highway_percent,
            csv_field(&t.input.region_code),
            t.input.category,
            csv_field(t.input.reason.as_deref().unwrap_or("")),
            t.cost.blended_mpg,
            t.cost.gallons_used,
            t.cost.price_per_gallon,
            t.cost.total_cost,
            csv_field(&t.calculated_at.to_rfc3339()),
        ));
    }
    out
}
