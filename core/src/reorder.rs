//! Security stock and reorder point.
//!
//! ```text
//! security = z·σd·√L + z·d·σL
//! rop      = ceil(security + d·L)
//! ```
//!
//! `d`/`σd` are daily demand mean and std-dev, `L`/`σL` lead-time mean and
//! std-dev in days, `z` the service coefficient of the variant's ABC/XYZ cell.
//! The adjusted figures use `L + leadDaysAdjustment` in place of `L`.

use crate::{
    classifier::VariantClassifier,
    config::{DemandMode, RopConfig, SecurityStockRounding, ServiceTable},
    demand::{DemandStatistics, DemandStats},
    error::{RopError, RopResult},
    forecast::ForecastDemandProvider,
    lead::{LeadStats, LeadTimeStatistics},
    record::{DemandRecord, LeadRecord},
    types::{ClassificationKey, ProductId, VariantId, VendorId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderPoint {
    pub product_id:              ProductId,
    pub variant_id:              VariantId,
    pub rop:                     Option<f64>,
    pub adjusted_rop:            Option<f64>,
    pub demand:                  DemandStats,
    pub lead:                    LeadStats,
    pub security_stock:          f64,
    pub adjusted_security_stock: f64,
    pub group:                   ClassificationKey,
    pub service_coefficient:     f64,
    pub lead_days_adjustment:    i64,
}

impl ReorderPoint {
    /// Combine already-resolved demand and lead figures.
    pub fn compose(
        demand: DemandStats,
        lead: LeadStats,
        group: ClassificationKey,
        service_coefficient: f64,
        lead_days_adjustment: i64,
        rounding: SecurityStockRounding,
    ) -> Self {
        let adjustment = lead_days_adjustment as f64;
        let adjusted_lead = lead.average_days.map(|days| days + adjustment);

        let security_stock = security_stock_for(service_coefficient, &demand, &lead, lead.average_days, rounding);
        let adjusted_security_stock =
            security_stock_for(service_coefficient, &demand, &lead, adjusted_lead, rounding);

        let rop = reorder_point(security_stock, demand.average_per_day, lead.average_days);
        let adjusted_rop = reorder_point(adjusted_security_stock, demand.average_per_day, adjusted_lead);

        Self {
            product_id: demand.product_id.clone(),
            variant_id: demand.variant_id.clone(),
            rop,
            adjusted_rop,
            demand,
            lead,
            security_stock,
            adjusted_security_stock,
            group,
            service_coefficient,
            lead_days_adjustment,
        }
    }
}

/// Missing std-dev or demand terms contribute nothing; a missing lead time means no buffer.
fn security_stock_for(
    coefficient: f64,
    demand: &DemandStats,
    lead: &LeadStats,
    lead_days: Option<f64>,
    rounding: SecurityStockRounding,
) -> f64 {
    let Some(lead_days) = lead_days else { return 0.0 };

    let demand_term = coefficient * demand.std_dev_daily.unwrap_or(0.0) * lead_days.max(0.0).sqrt();
    let lead_term = coefficient * demand.average_per_day.unwrap_or(0.0) * lead.std_dev_days.unwrap_or(0.0);
    rounding.apply(demand_term + lead_term)
}

fn reorder_point(security_stock: f64, per_day: Option<f64>, lead_days: Option<f64>) -> Option<f64> {
    match (per_day, lead_days) {
        (Some(d), Some(l)) => Some((security_stock + d * l).ceil()),
        _ => None,
    }
}

pub struct ReorderPointEngine {
    years_window:  u32,
    rounding:      SecurityStockRounding,
    service_table: ServiceTable,
    classifier:    VariantClassifier,
    demand:        DemandStatistics,
    lead:          LeadTimeStatistics,
    forecast:      Option<ForecastDemandProvider>,
}

impl ReorderPointEngine {
    /// Wire all calculators over the run's data and anchor them at `as_of`.
    pub fn new(
        config: &RopConfig,
        demand: Vec<DemandRecord>,
        lead: Vec<LeadRecord>,
        product_vendors: HashMap<ProductId, VendorId>,
        forecast: Option<ForecastDemandProvider>,
        as_of: NaiveDate,
    ) -> RopResult<Self> {
        config.validate()?;
        let years = config.years_window;

        let mut engine = Self {
            years_window:  years,
            rounding:      config.reorder.security_stock_rounding,
            service_table: config.reorder.service_table(),
            classifier:    VariantClassifier::new(config.classification.clone()),
            demand:        DemandStatistics::new(demand, as_of, years)?,
            lead:          LeadTimeStatistics::new(config.lead.clone(), lead, product_vendors, as_of)?,
            forecast,
        };
        engine.classifier.calculate(engine.demand.records(), as_of, years)?;
        Ok(engine)
    }

    /// Re-anchor classification, demand windows and the lead cache at `as_of`.
    /// Must run before `calculate` for every new date.
    pub fn prepare(&mut self, as_of: NaiveDate, mode: DemandMode) -> RopResult<()> {
        if mode == DemandMode::History {
            self.demand.init(as_of, self.years_window)?;
        }
        self.classifier.calculate(self.demand.records(), as_of, self.years_window)?;
        self.lead.set_anchor(as_of)?;
        Ok(())
    }

    pub fn calculate(
        &mut self,
        variant_id: &str,
        product_id: &str,
        as_of: NaiveDate,
        lead_days_adjustment: i64,
        mode: DemandMode,
    ) -> RopResult<ReorderPoint> {
        let lead = self.resolve_lead(product_id, variant_id);

        let demand = match mode {
            DemandMode::History => self.demand.get(product_id, variant_id)?,
            DemandMode::Forecast => self
                .forecast
                .as_ref()
                .ok_or_else(|| RopError::InvalidConfig("forecast mode without a forecast document".into()))?
                .get_demand(product_id, variant_id, as_of, &lead),
        };

        let group = self.classifier.group_key(variant_id);
        let coefficient = self.service_table.coefficient(group);

        Ok(ReorderPoint::compose(
            demand,
            lead,
            group,
            coefficient,
            lead_days_adjustment,
            self.rounding,
        ))
    }

    /// Lead-time statistics for a variant, pooled over its current peer group.
    pub fn resolve_lead(&mut self, product_id: &str, variant_id: &str) -> LeadStats {
        self.lead
            .resolve(product_id, variant_id, self.classifier.peer_group(variant_id))
    }

    pub fn classifier(&self) -> &VariantClassifier {
        &self.classifier
    }

    pub fn demand(&self) -> &DemandStatistics {
        &self.demand
    }

    pub fn lead(&self) -> &LeadTimeStatistics {
        &self.lead
    }

    pub fn forecast(&self) -> Option<&ForecastDemandProvider> {
        self.forecast.as_ref()
    }

    pub fn service_table(&self) -> &ServiceTable {
        &self.service_table
    }
}
