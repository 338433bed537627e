//! Per-variant stock and vendor backlog carried from one simulated order date
//! to the next.
//!
//! Each transition takes the state by value and returns the successor, so no
//! step can hold on to a previous step's data.

use crate::{
    calendar,
    record::{DemandRecord, StockLevel, VendorOrder},
    types::{ProductId, Quantity, VariantId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub quantity:     Quantity,
    pub arrival_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantState {
    pub product_id:     ProductId,
    pub stock_level:    Quantity,
    pub pending_orders: Vec<PendingOrder>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    pub variants: BTreeMap<VariantId, VariantState>,
}

impl SimulationState {
    /// Starting state from a stock snapshot and the open vendor orders.
    pub fn from_snapshot(stock: &[StockLevel], vendor_orders: &[VendorOrder]) -> Self {
        let mut state = Self::default();
        for level in stock {
            let entry = state.entry(&level.variant_id, &level.product_id);
            entry.stock_level += level.stock;
        }
        for order in vendor_orders {
            state.entry(&order.variant_id, &order.product_id).pending_orders.push(PendingOrder {
                quantity:     order.quantity,
                arrival_date: order.arrival_date,
            });
        }
        state
    }

    fn entry(&mut self, variant_id: &str, product_id: &str) -> &mut VariantState {
        self.variants
            .entry(variant_id.to_string())
            .or_insert_with(|| VariantState {
                product_id: product_id.to_string(),
                ..VariantState::default()
            })
    }

    /// Subtract demand that occurred in `[from, to)` for the tracked variants.
    /// A variant without a stock entry starts at zero and goes negative.
    pub fn consume_demand(
        mut self,
        demand: &[DemandRecord],
        from: NaiveDate,
        to: NaiveDate,
        tracked: &HashSet<&str>,
    ) -> Self {
        let (from, to) = (calendar::day_start(from), calendar::day_start(to));
        for record in demand {
            if record.occurred_at < from || record.occurred_at >= to {
                continue;
            }
            if !tracked.contains(record.variant_id.as_str()) {
                continue;
            }
            self.entry(&record.variant_id, &record.product_id).stock_level -= record.quantity;
        }
        self
    }

    /// Book every pending order due on or before `today` into stock.
    pub fn apply_arrivals(mut self, today: NaiveDate) -> Self {
        for (variant_id, variant) in self.variants.iter_mut() {
            let (arrived, pending): (Vec<_>, Vec<_>) = variant
                .pending_orders
                .drain(..)
                .partition(|order| order.arrival_date <= today);
            let received: Quantity = arrived.iter().map(|o| o.quantity).sum();
            if received != 0 {
                log::debug!("{today}: {variant_id} received {received}");
            }
            variant.stock_level += received;
            variant.pending_orders = pending;
        }
        self
    }

    pub fn place_order(
        mut self,
        variant_id: &str,
        product_id: &str,
        quantity: Quantity,
        arrival_date: NaiveDate,
    ) -> Self {
        self.entry(variant_id, product_id)
            .pending_orders
            .push(PendingOrder { quantity, arrival_date });
        self
    }

    pub fn stock(&self, variant_id: &str) -> Quantity {
        self.variants.get(variant_id).map_or(0, |v| v.stock_level)
    }

    /// Units ordered from vendors and not yet arrived.
    pub fn open_quantity(&self, variant_id: &str) -> Quantity {
        self.variants
            .get(variant_id)
            .map_or(0, |v| v.pending_orders.iter().map(|o| o.quantity).sum())
    }
}
