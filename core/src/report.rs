//! Flat output rows: the simulation trace, the static ROP report and the
//! per-variant classification listing.
//!
//! Rows are plain `Serialize` structs with scalar fields so they can go to CSV
//! as well as JSON.

use crate::{
    config::DemandMode,
    error::RopResult,
    record::StockLevel,
    reorder::{ReorderPoint, ReorderPointEngine},
    simulation::OrderDecision,
    types::{ProductId, Quantity, VariantId},
};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

// ── Simulation trace ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRow {
    pub id:                      String,
    pub date:                    NaiveDate,
    pub arrival_date:            Option<NaiveDate>,
    pub variant_id:              VariantId,
    pub product_id:              ProductId,
    pub quantity:                Quantity,
    pub stock:                   Quantity,
    pub open_vendor_order_qty:   Quantity,
    pub accumulated_stock:       Quantity,
    pub adjusted_rop:            Option<f64>,
    pub adjusted_security_stock: f64,
    pub coefficient:             f64,
    pub group:                   String,
    pub lead_days_adjustment:    i64,
    pub lead_average_days:       Option<f64>,
    pub lead_std_dev_days:       Option<f64>,
    pub lead_record_count:       usize,
    pub lead_source_level:       String,
    pub demand_average_per_day:  Option<f64>,
    pub demand_std_dev_daily:    Option<f64>,
    /// Monthly (or weekly, in forecast mode) values joined with `|`.
    pub demand_series:           String,
    pub random_lead_days:        i64,
    pub rop:                     Option<f64>,
    pub security_stock:          f64,
}

impl SimulationRow {
    /// One row per decision. The id carries the variant's first decided quantity.
    pub fn from_trace(trace: &[OrderDecision]) -> Vec<SimulationRow> {
        let mut initial: HashMap<&str, Quantity> = HashMap::new();
        for decision in trace {
            initial.entry(decision.variant_id()).or_insert(decision.quantity);
        }

        trace
            .iter()
            .map(|d| {
                let first = initial.get(d.variant_id()).copied().unwrap_or(d.quantity);
                Self::from_decision(d, first)
            })
            .collect()
    }

    fn from_decision(decision: &OrderDecision, initial_quantity: Quantity) -> Self {
        let rop = &decision.reorder_point;
        Self {
            id: format!("{} {} {}", rop.product_id, rop.variant_id, initial_quantity),
            date: decision.date,
            arrival_date: decision.arrival_date,
            variant_id: rop.variant_id.clone(),
            product_id: rop.product_id.clone(),
            quantity: decision.quantity,
            stock: decision.stock,
            open_vendor_order_qty: decision.open_quantity,
            accumulated_stock: decision.accumulated_stock(),
            adjusted_rop: rop.adjusted_rop,
            adjusted_security_stock: rop.adjusted_security_stock,
            coefficient: rop.service_coefficient,
            group: rop.group.to_string(),
            lead_days_adjustment: rop.lead_days_adjustment,
            lead_average_days: rop.lead.average_days,
            lead_std_dev_days: rop.lead.std_dev_days,
            lead_record_count: rop.lead.record_count,
            lead_source_level: rop.lead.source_level.label().to_string(),
            demand_average_per_day: rop.demand.average_per_day,
            demand_std_dev_daily: rop.demand.std_dev_daily,
            demand_series: join_series(&rop.demand.monthly_series),
            random_lead_days: decision.random_lead_days,
            rop: rop.rop,
            security_stock: rop.security_stock,
        }
    }
}

fn join_series(series: &[f64]) -> String {
    series
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

// ── Static report ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub variant_id:             VariantId,
    pub product_id:             ProductId,
    pub stock:                  Quantity,
    pub rop:                    Option<f64>,
    pub security_stock:         f64,
    pub group:                  String,
    pub coefficient:            f64,
    pub lead_average_days:      Option<f64>,
    pub lead_std_dev_days:      Option<f64>,
    pub lead_record_count:      usize,
    pub lead_source_level:      String,
    pub demand_average_per_day: Option<f64>,
    pub demand_std_dev_daily:   Option<f64>,
    pub order:                  bool,
    pub rop_order_qty:          Quantity,
}

impl ReportRow {
    fn from_reorder_point(rop: &ReorderPoint, stock: Quantity) -> Self {
        let threshold = rop.rop.filter(|r| *r > 0.0 && *r >= stock as f64);
        let rop_order_qty = threshold.map_or(0, |r| (r - stock as f64) as Quantity);
        Self {
            variant_id: rop.variant_id.clone(),
            product_id: rop.product_id.clone(),
            stock,
            rop: rop.rop,
            security_stock: rop.security_stock,
            group: rop.group.to_string(),
            coefficient: rop.service_coefficient,
            lead_average_days: rop.lead.average_days,
            lead_std_dev_days: rop.lead.std_dev_days,
            lead_record_count: rop.lead.record_count,
            lead_source_level: rop.lead.source_level.label().to_string(),
            demand_average_per_day: rop.demand.average_per_day,
            demand_std_dev_daily: rop.demand.std_dev_daily,
            order: threshold.is_some(),
            rop_order_qty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub rows:               usize,
    pub orders:             usize,
    pub rop_order_quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReorderReport {
    pub as_of:  NaiveDate,
    pub rows:   Vec<ReportRow>,
    pub totals: ReportTotals,
}

impl ReorderReport {
    /// Reorder points for every stock item at `as_of`, with no lead-days
    /// adjustment. Items whose lead std-dev exceeds `max_lead_std_dev` are left out.
    pub fn build(
        engine: &mut ReorderPointEngine,
        items: &[StockLevel],
        as_of: NaiveDate,
        mode: DemandMode,
        max_lead_std_dev: f64,
    ) -> RopResult<Self> {
        engine.prepare(as_of, mode)?;

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            if item.variant_id.is_empty() {
                continue;
            }
            let rop = engine.calculate(&item.variant_id, &item.product_id, as_of, 0, mode)?;
            if let Some(std) = rop.lead.std_dev_days.filter(|s| *s > max_lead_std_dev) {
                log::warn!(
                    "report: skipping {} ({}), lead std-dev {std:.2} above {max_lead_std_dev}",
                    item.variant_id,
                    item.product_id
                );
                continue;
            }
            rows.push(ReportRow::from_reorder_point(&rop, item.stock));
        }

        rows.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| compare_rop(a.rop, b.rop)));

        let totals = ReportTotals {
            rows:               rows.len(),
            orders:             rows.iter().filter(|r| r.order).count(),
            rop_order_quantity: rows.iter().map(|r| r.rop_order_qty).sum(),
        };
        log::info!(
            "report at {as_of}: {} rows, {} to order, {} units",
            totals.rows,
            totals.orders,
            totals.rop_order_quantity
        );

        Ok(Self { as_of, rows, totals })
    }
}

/// Missing reorder points sort first.
fn compare_rop(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_))    => Ordering::Less,
        (Some(_), None)    => Ordering::Greater,
        (None, None)       => Ordering::Equal,
    }
}

// ── Classification listing ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRow {
    pub volume:             String,
    pub variation:          String,
    pub variant_id:         VariantId,
    pub product_id:         ProductId,
    pub avg_lead_time:      Option<f64>,
    pub lead_time_std:      Option<f64>,
    pub lead_type:          String,
    pub lead_records_count: usize,
}

impl ClassificationRow {
    /// One row per variant in the demand history, in first-seen order, with its
    /// groups and lead time at `as_of`. Lead figures are rounded to 2 places.
    pub fn collect(engine: &mut ReorderPointEngine, as_of: NaiveDate) -> RopResult<Vec<Self>> {
        engine.prepare(as_of, DemandMode::History)?;

        let variants: Vec<(VariantId, ProductId)> = {
            let mut seen = HashSet::new();
            engine
                .demand()
                .records()
                .iter()
                .filter(|r| !r.variant_id.is_empty() && seen.insert(r.variant_id.as_str()))
                .map(|r| (r.variant_id.clone(), r.product_id.clone()))
                .collect()
        };

        let rows: Vec<Self> = variants
            .into_iter()
            .map(|(variant_id, product_id)| {
                let lead = engine.resolve_lead(&product_id, &variant_id);
                let classifier = engine.classifier();
                Self {
                    volume:             classifier.volume_group(&variant_id).label().to_string(),
                    variation:          classifier.variation_group(&variant_id).label().to_string(),
                    avg_lead_time:      lead.average_days.map(round2),
                    lead_time_std:      lead.std_dev_days.map(round2),
                    lead_type:          lead.source_level.label().to_string(),
                    lead_records_count: lead.record_count,
                    variant_id,
                    product_id,
                }
            })
            .collect();

        log::info!("classification at {as_of}: {} variants listed", rows.len());
        Ok(rows)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
