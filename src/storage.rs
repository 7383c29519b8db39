use crate::error::AppError;
use crate::models::{CostBreakdown, TripInput, TripRecord, START_TIME_FORMAT};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;

const TRIP_COLUMNS: &str = "id, distance_miles, city_mpg, highway_mpg, highway_percent, \
     region_code, category, reason, start_time, blended_mpg, gallons_used, price_per_gallon, \
     total_cost, calculated_at";

/// Create/read/update/delete over persisted trips.
pub trait TripStore {
    fn create_trip(
        &mut self,
        input: &TripInput,
        cost: &CostBreakdown,
        calculated_at: DateTime<Utc>,
    ) -> Result<TripRecord, AppError>;

    fn get_trip(&self, id: i64) -> Result<TripRecord, AppError>;

    /// Newest first. Aggregation must not depend on this order.
    fn list_trips(&self, limit: Option<usize>) -> Result<Vec<TripRecord>, AppError>;

    fn update_trip(
        &mut self,
        id: i64,
        input: &TripInput,
        cost: &CostBreakdown,
        calculated_at: DateTime<Utc>,
    ) -> Result<TripRecord, AppError>;

    fn delete_trip(&mut self, id: i64) -> Result<(), AppError>;
}

/// Fetched fuel prices, keyed by region and trip date.
pub trait PriceCache {
    fn cached_price(
        &self,
        region: &str,
        date: NaiveDate,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<f64>, AppError>;

    fn store_price(
        &mut self,
        region: &str,
        date: NaiveDate,
        price: f64,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

pub struct Storage {
    conn: Connection,
}

/// Fixed-width RFC 3339 so stored timestamps sort as text.
fn timestamp_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A `trips` row before its text columns are parsed.
struct TripRow {
    id: i64,
    distance_miles: f64,
    city_mpg: f64,
    highway_mpg: f64,
    highway_percent: i64,
    region_code: String,
    category: String,
    reason: Option<String>,
    start_time: Option<String>,
    blended_mpg: f64,
    gallons_used: f64,
    price_per_gallon: f64,
    total_cost: f64,
    calculated_at: String,
}

impl TripRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            distance_miles: r.get(1)?,
            city_mpg: r.get(2)?,
            highway_mpg: r.get(3)?,
            highway_percent: r.get(4)?,
            region_code: r.get(5)?,
            category: r.get(6)?,
            reason: r.get(7)?,
            start_time: r.get(8)?,
            blended_mpg: r.get(9)?,
            gallons_used: r.get(10)?,
            price_per_gallon: r.get(11)?,
            total_cost: r.get(12)?,
            calculated_at: r.get(13)?,
        })
    }
}

impl TryFrom<TripRow> for TripRecord {
    type Error = AppError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let invalid = |what: String| AppError::InvalidRecord(format!("trip {id}: {what}"));

        let raw_start = row
            .start_time
            .ok_or_else(|| invalid("missing start time".into()))?;
        let start_time = NaiveDateTime::parse_from_str(&raw_start, START_TIME_FORMAT)
            .map_err(|e| invalid(format!("bad start time '{raw_start}': {e}")))?;
        let calculated_at = DateTime::parse_from_rfc3339(&row.calculated_at)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| invalid(format!("bad calculation time '{}': {e}", row.calculated_at)))?;
        let highway_percent = u8::try_from(row.highway_percent)
            .map_err(|_| invalid(format!("highway percent {} out of range", row.highway_percent)))?;
        let category = row
            .category
            .parse()
            .map_err(|_| invalid(format!("unknown category '{}'", row.category)))?;

        Ok(TripRecord {
            id,
            input: TripInput {
                distance_miles: row.distance_miles,
                city_mpg: row.city_mpg,
                highway_mpg: row.highway_mpg,
                highway_percent,
                region_code: row.region_code,
                category,
                reason: row.reason.filter(|r| !r.is_empty()),
                start_time,
            },
            cost: CostBreakdown {
                blended_mpg: row.blended_mpg,
                gallons_used: row.gallons_used,
                price_per_gallon: row.price_per_gallon,
                total_cost: row.total_cost,
            },
            calculated_at,
        })
    }
}

impl Storage {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let conn = Connection::open(path)?;
        let this = Self { conn };
        this.init()?;
        Ok(this)
    }

    fn init(&self) -> Result<(), AppError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trips (
                id INTEGER PRIMARY KEY,
                distance_miles REAL NOT NULL,
                city_mpg REAL NOT NULL,
                highway_mpg REAL NOT NULL,
                highway_percent INTEGER NOT NULL,
                region_code TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'required',
                reason TEXT,
                start_time TEXT,
                blended_mpg REAL NOT NULL,
                gallons_used REAL NOT NULL,
                price_per_gallon REAL NOT NULL,
                total_cost REAL NOT NULL,
                calculated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fuel_prices (
                region TEXT NOT NULL,
                price_date TEXT NOT NULL,
                price REAL NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (region, price_date)
            );
            "#,
        )?;
        Ok(())
    }

    fn query_trips(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<TripRecord>, AppError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, TripRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TripRecord::try_from).collect()
    }

    pub fn export_trips_json(&self) -> Result<String, AppError> {
        let rows = self.list_trips(None)?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }
}

impl TripStore for Storage {
    fn create_trip(
        &mut self,
        input: &TripInput,
        cost: &CostBreakdown,
        calculated_at: DateTime<Utc>,
    ) -> Result<TripRecord, AppError> {
        self.conn.execute(
            "INSERT INTO trips (distance_miles, city_mpg, highway_mpg, highway_percent,
                 region_code, category, reason, start_time, blended_mpg, gallons_used,
                 price_per_gallon, total_cost, calculated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                input.distance_miles,
                input.city_mpg,
                input.highway_mpg,
                input.highway_percent,
                input.region_code,
                input.category.as_label(),
                input.reason,
                input.start_time.format(START_TIME_FORMAT).to_string(),
                cost.blended_mpg,
                cost.gallons_used,
                cost.price_per_gallon,
                cost.total_cost,
                timestamp_text(calculated_at),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, total_cost = cost.total_cost, "stored trip");
        self.get_trip(id)
    }

    fn get_trip(&self, id: i64) -> Result<TripRecord, AppError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?"),
                [id],
                TripRow::from_row,
            )
            .optional()?
            .ok_or(AppError::NotFound(id))?;
        TripRecord::try_from(row)
    }

    fn list_trips(&self, limit: Option<usize>) -> Result<Vec<TripRecord>, AppError> {
        // SQLite reads a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        self.query_trips(
            &format!(
                "SELECT {TRIP_COLUMNS} FROM trips ORDER BY calculated_at DESC, id DESC LIMIT ?"
            ),
            [limit],
        )
    }

    fn update_trip(
        &mut self,
        id: i64,
        input: &TripInput,
        cost: &CostBreakdown,
        calculated_at: DateTime<Utc>,
    ) -> Result<TripRecord, AppError> {
        let changed = self.conn.execute(
            "UPDATE trips SET
                distance_miles = ?, city_mpg = ?, highway_mpg = ?, highway_percent = ?,
                region_code = ?, category = ?, reason = ?, start_time = ?,
                blended_mpg = ?, gallons_used = ?, price_per_gallon = ?, total_cost = ?,
                calculated_at = ?
             WHERE id = ?",
            params![
                input.distance_miles,
                input.city_mpg,
                input.highway_mpg,
                input.highway_percent,
                input.region_code,
                input.category.as_label(),
                input.reason,
                input.start_time.format(START_TIME_FORMAT).to_string(),
                cost.blended_mpg,
                cost.gallons_used,
                cost.price_per_gallon,
                cost.total_cost,
                timestamp_text(calculated_at),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(id));
        }
        debug!(id, total_cost = cost.total_cost, "updated trip");
        self.get_trip(id)
    }

    fn delete_trip(&mut self, id: i64) -> Result<(), AppError> {
        let changed = self.conn.execute("DELETE FROM trips WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(AppError::NotFound(id));
        }
        debug!(id, "deleted trip");
        Ok(())
    }
}

impl PriceCache for Storage {
    fn cached_price(
        &self,
        region: &str,
        date: NaiveDate,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<f64>, AppError> {
        let cached: Option<(f64, String)> = self
            .conn
            .query_row(
                "SELECT price, fetched_at FROM fuel_prices WHERE region = ? AND price_date = ?",
                params![region, date.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let Some((price, fetched_at)) = cached else {
            return Ok(None);
        };
        // Unreadable timestamps count as stale.
        let fresh = DateTime::parse_from_rfc3339(&fetched_at)
            .map(|ts| now - ts.with_timezone(&Utc) < max_age)
            .unwrap_or(false);
        Ok(fresh.then_some(price))
    }

    fn store_price(
        &mut self,
        region: &str,
        date: NaiveDate,
        price: f64,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.conn.execute(
            "INSERT INTO fuel_prices (region, price_date, price, fetched_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (region, price_date) DO UPDATE SET
                 price = excluded.price,
                 fetched_at = excluded.fetched_at",
            params![region, date.to_string(), price, timestamp_text(fetched_at)],
        )?;
        Ok(())
    }
}
