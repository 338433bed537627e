//! Data-source contracts.
//!
//! RULE: every source is read exactly once per run, before the first
//! simulated date. Nothing in the engine queries a source mid-run.

use crate::{
    calendar,
    error::RopResult,
    record::{DemandRecord, LeadRecord, StockLevel, VendorOrder},
    types::{ProductId, VendorId},
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Historical sales lines (active orders only).
pub trait DemandSource {
    fn fetch_demand(&self) -> RopResult<Vec<DemandRecord>>;
}

/// Delivered vendor order lines with their lead times.
pub trait LeadSource {
    fn fetch_lead(&self) -> RopResult<Vec<LeadRecord>>;

    /// Product → main vendor. Products missing here fall back to the
    /// vendor recorded on their own lead lines.
    fn fetch_product_vendors(&self) -> RopResult<HashMap<ProductId, VendorId>>;
}

/// Net stock per variant for one calendar day.
pub trait StockSource {
    fn fetch_stock(&self, date: NaiveDate) -> RopResult<Vec<StockLevel>>;
}

/// Vendor orders created within `[from, to]`.
pub trait VendorOrderSource {
    fn fetch_vendor_orders(&self, from: NaiveDate, to: NaiveDate) -> RopResult<Vec<VendorOrder>>;
}

/// Everything a simulation run reads, fetched once.
#[derive(Debug, Clone, Default)]
pub struct SimulationInput {
    pub demand:          Vec<DemandRecord>,
    pub lead:            Vec<LeadRecord>,
    pub product_vendors: HashMap<ProductId, VendorId>,
    pub stock:           Vec<StockLevel>,
    pub vendor_orders:   Vec<VendorOrder>,
}

impl SimulationInput {
    /// Pull all collaborators for a run starting at `start`. The starting
    /// backlog covers vendor orders created in the `lookback_months` before it.
    pub fn fetch<S>(source: &S, start: NaiveDate, lookback_months: u32) -> RopResult<Self>
    where
        S: DemandSource + LeadSource + StockSource + VendorOrderSource,
    {
        let backlog_from = calendar::shift_months(start, -(lookback_months as i32))?;
        let input = Self {
            demand:          source.fetch_demand()?,
            lead:            source.fetch_lead()?,
            product_vendors: source.fetch_product_vendors()?,
            stock:           source.fetch_stock(start)?,
            vendor_orders:   source.fetch_vendor_orders(backlog_from, start)?,
        };
        log::info!(
            "fetched input for {start}: {} demand, {} lead, {} stock, {} vendor order lines",
            input.demand.len(),
            input.lead.len(),
            input.stock.len(),
            input.vendor_orders.len()
        );
        Ok(input)
    }
}
