//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The engine sees the data through the traits in `source`.

use crate::{
    calendar,
    error::{RopError, RopResult},
    record::{DemandRecord, LeadRecord, StockLevel, VendorOrder},
    source::{DemandSource, LeadSource, StockSource, VendorOrderSource},
    types::{ProductId, VendorId},
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::collections::HashMap;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    /// Open (or create) the snapshot database at `path`.
    pub fn open(path: &str) -> RopResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RopResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RopResult<()> {
        self.conn.execute_batch(include_str!("../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Demand ─────────────────────────────────────────────────

    pub fn insert_demand(&self, record: &DemandRecord) -> RopResult<()> {
        self.conn.execute(
            "INSERT INTO demand_record (variant_id, product_id, quantity, occurred_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.variant_id,
                record.product_id,
                record.quantity,
                format_datetime(record.occurred_at),
            ],
        )?;
        Ok(())
    }

    // ── Lead time ──────────────────────────────────────────────

    pub fn insert_lead(&self, record: &LeadRecord) -> RopResult<()> {
        self.conn.execute(
            "INSERT INTO lead_record (variant_id, product_id, vendor, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.variant_id,
                record.product_id,
                record.vendor,
                format_datetime(record.created_at),
                format_datetime(record.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn set_product_vendor(&self, product_id: &str, vendor: &str) -> RopResult<()> {
        self.conn.execute(
            "INSERT INTO product_vendor (product_id, vendor) VALUES (?1, ?2)
             ON CONFLICT(product_id) DO UPDATE SET vendor = excluded.vendor",
            params![product_id, vendor],
        )?;
        Ok(())
    }

    // ── Stock ──────────────────────────────────────────────────

    pub fn insert_stock(&self, date: NaiveDate, level: &StockLevel) -> RopResult<()> {
        self.conn.execute(
            "INSERT INTO stock_level (variant_id, product_id, stock, stock_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                level.variant_id,
                level.product_id,
                level.stock,
                date.format(DATE_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    // ── Vendor orders ──────────────────────────────────────────

    pub fn insert_vendor_order(&self, order: &VendorOrder) -> RopResult<()> {
        self.conn.execute(
            "INSERT INTO vendor_order (variant_id, product_id, quantity, created_at, arrived_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                order.variant_id,
                order.product_id,
                order.quantity,
                format_datetime(order.created_at),
                order.arrival_date.format(DATE_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }
}

impl DemandSource for SimStore {
    fn fetch_demand(&self) -> RopResult<Vec<DemandRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT variant_id, product_id, quantity, occurred_at
             FROM demand_record ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(variant_id, product_id, quantity, occurred_at)| {
                Ok(DemandRecord {
                    variant_id,
                    product_id,
                    quantity,
                    occurred_at: parse_datetime(&occurred_at)?,
                })
            })
            .collect()
    }
}

impl LeadSource for SimStore {
    fn fetch_lead(&self) -> RopResult<Vec<LeadRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT variant_id, product_id, vendor, created_at, updated_at
             FROM lead_record ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(variant_id, product_id, vendor, created_at, updated_at)| {
                Ok(LeadRecord::new(
                    variant_id,
                    product_id,
                    vendor,
                    parse_datetime(&created_at)?,
                    parse_datetime(&updated_at)?,
                ))
            })
            .collect()
    }

    fn fetch_product_vendors(&self) -> RopResult<HashMap<ProductId, VendorId>> {
        let mut stmt = self.conn.prepare("SELECT product_id, vendor FROM product_vendor")?;
        let map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }
}

impl StockSource for SimStore {
    fn fetch_stock(&self, date: NaiveDate) -> RopResult<Vec<StockLevel>> {
        let mut stmt = self.conn.prepare(
            "SELECT variant_id, product_id, SUM(stock)
             FROM stock_level WHERE stock_date = ?1
             GROUP BY variant_id, product_id
             ORDER BY MIN(id) ASC",
        )?;
        let levels = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                Ok(StockLevel {
                    variant_id: row.get(0)?,
                    product_id: row.get(1)?,
                    stock:      row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(levels)
    }
}

impl VendorOrderSource for SimStore {
    fn fetch_vendor_orders(&self, from: NaiveDate, to: NaiveDate) -> RopResult<Vec<VendorOrder>> {
        let mut stmt = self.conn.prepare(
            "SELECT variant_id, product_id, quantity, created_at, arrived_at
             FROM vendor_order WHERE created_at >= ?1 AND created_at < ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(
                params![
                    format_datetime(calendar::day_start(from)),
                    format_datetime(calendar::day_end_exclusive(to)),
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(variant_id, product_id, quantity, created_at, arrived_at)| {
                Ok(VendorOrder {
                    variant_id,
                    product_id,
                    quantity,
                    created_at:   parse_datetime(&created_at)?,
                    arrival_date: parse_datetime(&arrived_at)?.date(),
                })
            })
            .collect()
    }
}

fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Accepts a full timestamp or a bare date (midnight).
fn parse_datetime(raw: &str) -> RopResult<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, DATE_FORMAT).map(calendar::day_start))
        .map_err(|_| RopError::InvalidDate(raw.to_string()))
}
