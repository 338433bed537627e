//! Historical demand statistics per variant.
//!
//! `init` re-anchors the window; everything else reads the bucketed records.
//! The window covers the `years_window` years ending the day before the anchor.

use crate::{
    calendar,
    error::RopResult,
    record::DemandRecord,
    stats,
    types::{ProductId, VariantId},
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Average days per month, used to scale the monthly std-dev down to a daily one.
pub const DAYS_PER_MONTH: f64 = 30.42;

/// Demand figures for one variant at one anchor date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandStats {
    pub product_id:       ProductId,
    pub variant_id:       VariantId,
    pub average_per_day:  Option<f64>,
    pub std_dev_daily:    Option<f64>,
    /// Most recent month first.
    pub monthly_series:   Vec<f64>,
}

pub struct DemandStatistics {
    records:      Vec<DemandRecord>,
    as_of:        NaiveDate,
    years_window: u32,
    by_variant:   HashMap<VariantId, Vec<(NaiveDateTime, f64)>>,
}

impl DemandStatistics {
    /// Build over the full history and anchor at `as_of`.
    pub fn new(records: Vec<DemandRecord>, as_of: NaiveDate, years_window: u32) -> RopResult<Self> {
        let mut demand = Self {
            records,
            as_of,
            years_window,
            by_variant: HashMap::new(),
        };
        demand.init(as_of, years_window)?;
        Ok(demand)
    }

    /// Re-anchor: keep records from `[as_of − years_window, as_of − 1 day]`, bucketed by variant.
    pub fn init(&mut self, as_of: NaiveDate, years_window: u32) -> RopResult<()> {
        self.as_of = as_of;
        self.years_window = years_window;

        let from = calendar::day_start(calendar::shift_years(as_of, -(years_window as i32))?);
        let to = calendar::day_start(as_of);

        self.by_variant.clear();
        for record in &self.records {
            if record.occurred_at < from || record.occurred_at >= to {
                continue;
            }
            self.by_variant
                .entry(record.variant_id.clone())
                .or_default()
                .push((record.occurred_at, record.quantity as f64));
        }

        log::debug!(
            "demand anchored at {as_of}: {} variants with sales in window",
            self.by_variant.len()
        );
        Ok(())
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// The full, unfiltered history.
    pub fn records(&self) -> &[DemandRecord] {
        &self.records
    }

    pub fn get(&self, product_id: &str, variant_id: &str) -> RopResult<DemandStats> {
        let monthly_series = self.monthly_series(variant_id)?;
        Ok(DemandStats {
            product_id:      product_id.to_string(),
            variant_id:      variant_id.to_string(),
            average_per_day: self.average_per_day(variant_id),
            std_dev_daily:   std_dev_daily(&monthly_series),
            monthly_series,
        })
    }

    /// Units per day over the whole window; `None` when the variant never sold in it.
    pub fn average_per_day(&self, variant_id: &str) -> Option<f64> {
        let lines = self.by_variant.get(variant_id)?;
        if lines.is_empty() {
            return None;
        }
        let sum: f64 = lines.iter().map(|(_, qty)| qty).sum();
        Some(sum / (365.0 * f64::from(self.years_window)))
    }

    /// Calendar-month sums walking back from the day before the anchor.
    /// Month `i` covers `(anchor − 1 day − (i+1) months, anchor − 1 day − i months]`.
    pub fn monthly_series(&self, variant_id: &str) -> RopResult<Vec<f64>> {
        let months = 12 * self.years_window as usize;
        let lines = self.by_variant.get(variant_id).map(Vec::as_slice).unwrap_or(&[]);
        let last_day = self.as_of - Duration::days(1);

        let mut sums = Vec::with_capacity(months);
        for i in 0..months {
            let end = calendar::shift_months(last_day, -(i as i32))?;
            let start = calendar::shift_months(end, -1)? + Duration::days(1);
            let (from, to) = (calendar::day_start(start), calendar::day_end_exclusive(end));

            let sum: f64 = lines
                .iter()
                .filter(|(at, _)| *at >= from && *at < to)
                .map(|(_, qty)| qty)
                .sum();
            sums.push(sum);
        }
        Ok(sums)
    }

    pub fn std_dev_daily(&self, variant_id: &str) -> RopResult<Option<f64>> {
        Ok(std_dev_daily(&self.monthly_series(variant_id)?))
    }
}

/// Monthly std-dev scaled to a day. Needs at least two months with sales.
fn std_dev_daily(series: &[f64]) -> Option<f64> {
    let non_empty = series.iter().filter(|v| **v != 0.0).count();
    if non_empty < 2 {
        return None;
    }
    stats::sample_std_dev(series).map(|std| std / DAYS_PER_MONTH)
}
