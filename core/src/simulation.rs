//! Order simulator: replays ordering decisions across simulated order dates.
//!
//! STEP ORDER (fixed, never reordered):
//!   1. Consume demand since the previous order date
//!   2. Book vendor orders that have arrived
//!   3. Re-anchor classification, demand and lead statistics at today
//!   4. Decide an order quantity for every tracked variant
//!   5. Advance to the next order date (Monday ↔ Thursday)
//!
//! RULES:
//!   - Inputs are fetched once, before the first step.
//!   - Each step consumes the previous `SimulationState` and returns the next.
//!   - All randomness flows through a seeded `SimRng`.

use crate::{
    clock::OrderClock,
    config::{ArrivalLeadPolicy, DemandMode, OrderQuantityRounding, RopConfig, SimulationConfig},
    error::RopResult,
    forecast::ForecastDemandProvider,
    record::{DemandRecord, StockLevel},
    reorder::{ReorderPoint, ReorderPointEngine},
    rng::{RngStream, SimRng},
    source::SimulationInput,
    state::SimulationState,
    types::{ProductId, Quantity, VariantId},
};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TrackedVariant {
    pub variant_id: VariantId,
    pub product_id: ProductId,
}

/// One variant's decision on one order date. Zero-quantity decisions included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDecision {
    pub date:             NaiveDate,
    pub iteration:        u32,
    pub quantity:         Quantity,
    pub stock:            Quantity,
    pub open_quantity:    Quantity,
    pub arrival_date:     Option<NaiveDate>,
    pub random_lead_days: i64,
    pub reorder_point:    ReorderPoint,
}

impl OrderDecision {
    pub fn variant_id(&self) -> &str {
        &self.reorder_point.variant_id
    }

    pub fn product_id(&self) -> &str {
        &self.reorder_point.product_id
    }

    /// Stock plus what is already on its way.
    pub fn accumulated_stock(&self) -> Quantity {
        self.stock + self.open_quantity
    }
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub trace:       Vec<OrderDecision>,
    pub final_state: SimulationState,
    pub steps:       u32,
    pub last_date:   Option<NaiveDate>,
}

impl SimulationOutcome {
    pub fn orders(&self) -> impl Iterator<Item = &OrderDecision> {
        self.trace.iter().filter(|d| d.quantity > 0)
    }

    pub fn ordered_quantity(&self) -> Quantity {
        self.orders().map(|d| d.quantity).sum()
    }
}

/// Variants worth simulating: stock snapshot first, then anything that sold,
/// each once, in encounter order.
pub fn tracked_variants(
    stock: &[StockLevel],
    demand: &[DemandRecord],
    config: &SimulationConfig,
    forecast: Option<&ForecastDemandProvider>,
) -> Vec<TrackedVariant> {
    let candidates = stock
        .iter()
        .map(|s| (&s.variant_id, &s.product_id))
        .chain(demand.iter().map(|d| (&d.variant_id, &d.product_id)));

    let mut seen: HashSet<&str> = HashSet::new();
    let mut tracked = Vec::new();
    for (variant_id, product_id) in candidates {
        if variant_id.is_empty() || !seen.insert(variant_id.as_str()) {
            continue;
        }
        if config.excluded_products.contains(product_id) {
            continue;
        }
        if let Some(allowed) = &config.allowed_variants {
            if !allowed.contains(variant_id) {
                continue;
            }
        }
        if config.demand_mode == DemandMode::Forecast
            && !forecast.is_some_and(|f| f.has_demand(variant_id))
        {
            continue;
        }
        tracked.push(TrackedVariant {
            variant_id: variant_id.clone(),
            product_id: product_id.clone(),
        });
    }
    tracked
}

/// Units to order given the variant's reorder point and position. Zero unless
/// a reorder point exists and stock has fallen to it.
pub fn order_quantity(
    rop: &ReorderPoint,
    stock: Quantity,
    open_quantity: Quantity,
    rounding: OrderQuantityRounding,
) -> Quantity {
    let (Some(threshold), Some(adjusted_rop), Some(per_day), Some(lead_days)) = (
        rop.rop,
        rop.adjusted_rop,
        rop.demand.average_per_day,
        rop.lead.average_days,
    ) else {
        return 0;
    };
    if stock as f64 > threshold {
        return 0;
    }

    let adjustment = rop.lead_days_adjustment as f64;
    let raw = adjusted_rop - adjustment * per_day - stock as f64 - open_quantity as f64
        + (lead_days + adjustment) * per_day;
    rounding.apply(raw).max(0.0) as Quantity
}

/// When an order placed `today` lands. `None` without a lead time.
pub fn arrival_date(
    today: NaiveDate,
    rop: &ReorderPoint,
    policy: ArrivalLeadPolicy,
    random_lead_days: i64,
) -> Option<NaiveDate> {
    let average = rop.lead.average_days?;
    let adjustment = match policy {
        ArrivalLeadPolicy::Adjusted => rop.lead_days_adjustment as f64,
        ArrivalLeadPolicy::Average  => 0.0,
    };
    let days = (average + adjustment) as i64 + random_lead_days;
    Some(today + Duration::days(days))
}

pub struct OrderSimulator {
    config:   SimulationConfig,
    rounding: OrderQuantityRounding,
    engine:   ReorderPointEngine,
    tracked:  Vec<TrackedVariant>,
    initial:  SimulationState,
}

impl OrderSimulator {
    /// Wire the simulator over a fetched input. The engine is anchored at the
    /// configured start date.
    pub fn build(
        config: &RopConfig,
        input: SimulationInput,
        forecast: Option<ForecastDemandProvider>,
    ) -> RopResult<Self> {
        let sim = config.simulation.clone();
        let tracked = tracked_variants(&input.stock, &input.demand, &sim, forecast.as_ref());
        let initial = SimulationState::from_snapshot(&input.stock, &input.vendor_orders);

        log::info!(
            "simulator: {} tracked variants, {} open vendor orders, start {}",
            tracked.len(),
            input.vendor_orders.len(),
            sim.start_date
        );

        let engine = ReorderPointEngine::new(
            config,
            input.demand,
            input.lead,
            input.product_vendors,
            forecast,
            sim.start_date,
        )?;

        Ok(Self {
            rounding: config.reorder.order_quantity_rounding,
            config: sim,
            engine,
            tracked,
            initial,
        })
    }

    pub fn tracked(&self) -> &[TrackedVariant] {
        &self.tracked
    }

    pub fn initial_state(&self) -> &SimulationState {
        &self.initial
    }

    pub fn engine(&self) -> &ReorderPointEngine {
        &self.engine
    }

    /// Run every step from the start date. Each call starts over from the
    /// initial state with a freshly seeded RNG.
    pub fn run(&mut self) -> RopResult<SimulationOutcome> {
        let mut clock = OrderClock::new(self.config.start_date, self.config.iterations);
        let mut rng = SimRng::new(self.config.seed, RngStream::LeadJitter);
        let mut state = self.initial.clone();
        let mut trace = Vec::new();
        let mut last_date = None;

        while !clock.is_exhausted() && !self.tracked.is_empty() {
            log::debug!("step {} at {}", clock.iteration, clock.today);
            let (next, decisions) = self.step(state, &clock, &mut rng)?;
            state = next;
            trace.extend(decisions);
            last_date = Some(clock.today);
            clock.advance();
        }

        log::info!(
            "simulator: {} steps, {} decisions, {} orders",
            clock.iteration,
            trace.len(),
            trace.iter().filter(|d| d.quantity > 0).count()
        );

        Ok(SimulationOutcome {
            trace,
            final_state: state,
            steps: clock.iteration,
            last_date,
        })
    }

    /// One order date. Takes the state by value and returns its successor.
    pub fn step(
        &mut self,
        state: SimulationState,
        clock: &OrderClock,
        rng: &mut SimRng,
    ) -> RopResult<(SimulationState, Vec<OrderDecision>)> {
        let today = clock.today;
        let mode = self.config.demand_mode;
        let adjustment = self.config.lead_days_adjustment;

        let mut state = match clock.last_order_date {
            Some(last) => {
                let tracked: HashSet<&str> =
                    self.tracked.iter().map(|t| t.variant_id.as_str()).collect();
                state.consume_demand(self.engine.demand().records(), last, today, &tracked)
            }
            None => state,
        };
        state = state.apply_arrivals(today);

        self.engine.prepare(today, mode)?;

        let mut decisions = Vec::with_capacity(self.tracked.len());
        for variant in &self.tracked {
            let rop = self.engine.calculate(
                &variant.variant_id,
                &variant.product_id,
                today,
                adjustment,
                mode,
            )?;

            let stock = state.stock(&variant.variant_id);
            let open_quantity = state.open_quantity(&variant.variant_id);
            let quantity = order_quantity(&rop, stock, open_quantity, self.rounding);
            let random_lead_days = rng.jitter_days(self.config.random_lead_days);
            let arrival = arrival_date(today, &rop, self.config.arrival_policy, random_lead_days);

            if let (true, Some(arrival)) = (quantity > 0, arrival) {
                log::debug!("{today}: order {quantity} of {} arriving {arrival}", variant.variant_id);
                state = state.place_order(&variant.variant_id, &variant.product_id, quantity, arrival);
            }

            decisions.push(OrderDecision {
                date: today,
                iteration: clock.iteration,
                quantity,
                stock,
                open_quantity,
                arrival_date: arrival,
                random_lead_days,
                reorder_point: rop,
            });
        }

        Ok((state, decisions))
    }
}
