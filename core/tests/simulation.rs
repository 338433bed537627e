use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rop_core::{
    config::{DemandMode, OrderQuantityRounding, RopConfig},
    forecast::ForecastDemandProvider,
    record::{DemandRecord, LeadRecord, StockLevel, VendorOrder},
    report::SimulationRow,
    simulation::{tracked_variants, OrderSimulator},
    source::SimulationInput,
    state::SimulationState,
    types::{ClassificationKey, VariationGroup, VolumeGroup},
};
use std::collections::HashSet;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

/// 2023-01-02 is a Monday.
fn start() -> NaiveDate {
    d(2023, 1, 2)
}

/// `per_day` units on each of the 365 days before `start()`.
fn daily_sales(variant: &str, product: &str, per_day: i64) -> Vec<DemandRecord> {
    (1..=365)
        .map(|i| DemandRecord {
            variant_id:  variant.into(),
            product_id:  product.into(),
            quantity:    per_day,
            occurred_at: (start() - Duration::days(i)).and_hms_opt(11, 0, 0).expect("time"),
        })
        .collect()
}

/// 25 deliveries of exactly `days` lead time during 2022.
fn deliveries(variant: &str, product: &str, days: i64) -> Vec<LeadRecord> {
    (0..25)
        .map(|i| {
            let created = (d(2022, 6, 1) + Duration::days(i)).and_hms_opt(9, 0, 0).expect("time");
            LeadRecord::new(variant, product, "acme", created, created + Duration::days(days))
        })
        .collect()
}

/// No safety buffer anywhere, short run from the Monday start.
fn zero_service_config(iterations: u32) -> RopConfig {
    let mut config = RopConfig::default();
    for volume in VolumeGroup::ALL {
        for variation in VariationGroup::ALL {
            config
                .reorder
                .service_overrides
                .insert(ClassificationKey::new(volume, variation), 0.0);
        }
    }
    config.simulation.start_date = start();
    config.simulation.iterations = iterations;
    config
}

fn single_variant_input(stock: i64) -> SimulationInput {
    SimulationInput {
        demand: daily_sales("v1", "P1", 2),
        lead: deliveries("v1", "P1", 10),
        stock: vec![StockLevel { variant_id: "v1".into(), product_id: "P1".into(), stock }],
        ..SimulationInput::default()
    }
}

#[test]
fn first_order_arrives_after_lead_plus_adjustment() {
    let config = zero_service_config(0);
    let mut simulator = OrderSimulator::build(&config, single_variant_input(0), None).expect("build");
    let outcome = simulator.run().expect("run");

    assert_eq!(outcome.steps, 1, "iteration cap 0 still runs the first step");
    let first = &outcome.trace[0];
    assert_eq!(first.reorder_point.rop, Some(20.0));
    assert_eq!(first.reorder_point.adjusted_rop, Some(28.0));
    assert_eq!(first.quantity, 48, "28 − 4·2 − 0 − 0 + 14·2");
    assert_eq!(first.arrival_date, Some(start() + Duration::days(14)));
}

#[test]
fn order_dates_alternate_monday_and_thursday() {
    let config = zero_service_config(4);
    let mut simulator = OrderSimulator::build(&config, single_variant_input(1000), None).expect("build");
    let outcome = simulator.run().expect("run");

    let dates: Vec<NaiveDate> = outcome.trace.iter().map(|d| d.date).collect();
    assert_eq!(dates.len(), 5, "iterations 0..=4");
    assert_eq!(dates[1], start() + Duration::days(3), "Monday is followed by Thursday");
    let weekdays: Vec<Weekday> = dates.iter().map(|d| d.weekday()).collect();
    assert_eq!(
        weekdays,
        vec![Weekday::Mon, Weekday::Thu, Weekday::Mon, Weekday::Thu, Weekday::Mon]
    );
    assert_eq!(outcome.last_date, Some(d(2023, 1, 16)));
}

#[test]
fn stock_above_reorder_point_orders_nothing() {
    let config = zero_service_config(0);
    let mut simulator = OrderSimulator::build(&config, single_variant_input(21), None).expect("build");
    let outcome = simulator.run().expect("run");

    assert_eq!(outcome.trace.len(), 1, "zero-quantity decisions are still traced");
    assert_eq!(outcome.trace[0].quantity, 0);
    assert_eq!(outcome.orders().count(), 0);
}

#[test]
fn open_vendor_orders_count_against_the_next_order() {
    let config = zero_service_config(1);
    let mut simulator = OrderSimulator::build(&config, single_variant_input(0), None).expect("build");
    let outcome = simulator.run().expect("run");

    assert_eq!(outcome.trace.len(), 2);
    let thursday = &outcome.trace[1];
    assert_eq!(thursday.open_quantity, 48, "Monday's order has not arrived");
    assert_eq!(thursday.stock, 0, "no sales recorded after the start date");
    assert_eq!(thursday.quantity, 0, "the open order already covers the lead time");
    assert_eq!(thursday.accumulated_stock(), 48);
}

#[test]
fn backlog_arrivals_are_booked_into_stock() {
    let config = zero_service_config(0);
    let mut input = single_variant_input(5);
    input.vendor_orders = vec![
        VendorOrder {
            variant_id:   "v1".into(),
            product_id:   "P1".into(),
            quantity:     30,
            created_at:   d(2022, 12, 10).and_hms_opt(8, 0, 0).expect("time"),
            arrival_date: start(),
        },
        VendorOrder {
            variant_id:   "v1".into(),
            product_id:   "P1".into(),
            quantity:     7,
            created_at:   d(2022, 12, 20).and_hms_opt(8, 0, 0).expect("time"),
            arrival_date: start() + Duration::days(20),
        },
    ];
    let mut simulator = OrderSimulator::build(&config, input, None).expect("build");
    let outcome = simulator.run().expect("run");

    let first = &outcome.trace[0];
    assert_eq!(first.stock, 35, "the order due today is on the shelf");
    assert_eq!(first.open_quantity, 7);
    assert_eq!(first.quantity, 0, "35 is above the reorder point of 20");
}

#[test]
fn iteration_cap_bounds_the_run() {
    let config = zero_service_config(10);
    let mut simulator = OrderSimulator::build(&config, single_variant_input(0), None).expect("build");
    let outcome = simulator.run().expect("run");
    assert_eq!(outcome.steps, 11);
    assert_eq!(outcome.trace.len(), 11);
}

#[test]
fn empty_tracked_set_runs_no_steps() {
    let mut config = zero_service_config(10);
    config.simulation.excluded_products = vec!["P1".into()];
    let mut simulator = OrderSimulator::build(&config, single_variant_input(0), None).expect("build");
    let outcome = simulator.run().expect("run");
    assert_eq!(outcome.steps, 0);
    assert!(outcome.trace.is_empty());
}

#[test]
fn running_twice_gives_the_same_trace() {
    let mut config = zero_service_config(12);
    config.simulation.random_lead_days = 5;
    let mut simulator = OrderSimulator::build(&config, single_variant_input(0), None).expect("build");

    let first = simulator.run().expect("first run");
    let second = simulator.run().expect("second run");
    assert_eq!(first.trace, second.trace);
    assert_eq!(first.final_state, second.final_state);
    assert!(
        first.trace.iter().all(|d| (0..=5).contains(&d.random_lead_days)),
        "jitter stays within its bound"
    );
}

#[test]
fn exact_rounding_truncates_to_whole_units() {
    let mut config = zero_service_config(0);
    config.reorder.order_quantity_rounding = OrderQuantityRounding::Exact;
    let mut input = single_variant_input(0);
    // Every other day at 3 units: a fractional daily rate.
    input.demand = daily_sales("v1", "P1", 3)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 0)
        .map(|(_, r)| r)
        .collect();
    let mut simulator = OrderSimulator::build(&config, input, None).expect("build");
    let outcome = simulator.run().expect("run");

    let per_day = outcome.trace[0].reorder_point.demand.average_per_day.expect("demand");
    let adjusted = outcome.trace[0].reorder_point.adjusted_rop.expect("rop");
    let raw = adjusted - 4.0 * per_day + 14.0 * per_day;
    assert_eq!(outcome.trace[0].quantity, raw as i64);
}

#[test]
fn trace_rows_carry_the_first_quantity_in_their_id() {
    let config = zero_service_config(1);
    let mut simulator = OrderSimulator::build(&config, single_variant_input(0), None).expect("build");
    let outcome = simulator.run().expect("run");

    let rows = SimulationRow::from_trace(&outcome.trace);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.id == "P1 v1 48"), "got {:?}", rows.iter().map(|r| &r.id).collect::<Vec<_>>());
    assert_eq!(rows[0].accumulated_stock, 0);
    assert_eq!(rows[1].accumulated_stock, 48);
    assert_eq!(rows[0].lead_source_level, "variants_group_12_month");
    assert_eq!(rows[0].demand_series.split('|').count(), 12);
}

// ── Tracked variants ──────────────────────────────────────────────

#[test]
fn tracked_variants_union_dedupe_and_filters() {
    let stock = vec![
        StockLevel { variant_id: "v1".into(), product_id: "P1".into(), stock: 4 },
        StockLevel { variant_id: "svc".into(), product_id: "SER-CON".into(), stock: 1 },
        StockLevel { variant_id: "".into(), product_id: "P9".into(), stock: 1 },
    ];
    let mut demand = daily_sales("v1", "P1", 1);
    demand.extend(daily_sales("v2", "P2", 1));

    let mut config = RopConfig::default().simulation;
    config.excluded_products = vec!["SER-CON".into()];
    let ids: Vec<String> = tracked_variants(&stock, &demand, &config, None)
        .into_iter()
        .map(|t| t.variant_id)
        .collect();
    assert_eq!(ids, vec!["v1".to_string(), "v2".to_string()]);

    config.allowed_variants = Some(vec!["v2".into()]);
    let narrowed = tracked_variants(&stock, &demand, &config, None);
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].product_id, "P2");
}

#[test]
fn forecast_mode_tracks_only_forecast_variants() {
    let stock = vec![
        StockLevel { variant_id: "v1".into(), product_id: "P1".into(), stock: 4 },
        StockLevel { variant_id: "v2".into(), product_id: "P2".into(), stock: 4 },
    ];
    let forecast = ForecastDemandProvider::from_json(
        r#"{"result":[{"partNumber":"v2","demandForecast":{"consensus":[]}}]}"#,
    )
    .expect("forecast");

    let mut config = RopConfig::default().simulation;
    config.demand_mode = DemandMode::Forecast;
    let tracked = tracked_variants(&stock, &[], &config, Some(&forecast));
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].variant_id, "v2");

    assert!(tracked_variants(&stock, &[], &config, None).is_empty(), "no document, nothing to track");
}

/// `weeks` weekly points of `value` from Monday `start()`.
fn weekly_forecast(variant: &str, value: f64, weeks: i64) -> ForecastDemandProvider {
    const MONDAY_2023_01_02_MS: i64 = 1_672_617_600_000;
    const WEEK_MS: i64 = 7 * 24 * 3600 * 1000;
    let points: Vec<String> = (0..weeks)
        .map(|w| format!(r#"{{"timestamp":{{"$date":{}}},"value":{value}}}"#, MONDAY_2023_01_02_MS + w * WEEK_MS))
        .collect();
    let json = format!(
        r#"{{"result":[{{"partNumber":"{variant}","demandForecast":{{"consensus":[{}]}}}}]}}"#,
        points.join(",")
    );
    ForecastDemandProvider::from_json(&json).expect("forecast")
}

#[test]
fn forecast_run_orders_from_the_weekly_series() {
    let mut config = zero_service_config(3);
    config.simulation.demand_mode = DemandMode::Forecast;
    let forecast = weekly_forecast("v1", 3.0, 10);
    let mut simulator =
        OrderSimulator::build(&config, single_variant_input(0), Some(forecast)).expect("build");
    let outcome = simulator.run().expect("run");

    assert_eq!(outcome.steps, 4);
    let first = &outcome.trace[0];
    assert_eq!(first.reorder_point.demand.average_per_day, Some(3.0), "forecast, not the 2/day history");
    assert_eq!(first.reorder_point.demand.monthly_series, vec![3.0, 3.0], "10-day lead covers two weeks");
    assert_eq!(first.reorder_point.rop, Some(30.0));
    assert_eq!(first.reorder_point.adjusted_rop, Some(42.0));
    assert_eq!(first.quantity, 72, "42 − 4·3 − 0 − 0 + 14·3");
    assert_eq!(first.arrival_date, Some(start() + Duration::days(14)));

    assert!(outcome.trace[1..].iter().all(|d| d.quantity == 0), "the open order covers the next dates");
    assert_eq!(outcome.orders().count(), 1);
    assert_eq!(outcome.ordered_quantity(), 72);
}

// ── State transitions ─────────────────────────────────────────────

#[test]
fn demand_without_a_stock_entry_goes_negative() {
    let demand = daily_sales("v9", "P9", 2);
    let tracked: HashSet<&str> = HashSet::from(["v9"]);
    let state = SimulationState::default().consume_demand(
        &demand,
        start() - Duration::days(3),
        start(),
        &tracked,
    );
    assert_eq!(state.stock("v9"), -6, "three days of two units");
    assert_eq!(state.variants["v9"].product_id, "P9");
}

#[test]
fn untracked_variants_are_not_consumed() {
    let stock = vec![StockLevel { variant_id: "v1".into(), product_id: "P1".into(), stock: 10 }];
    let demand = daily_sales("v1", "P1", 1);
    let state = SimulationState::from_snapshot(&stock, &[]).consume_demand(
        &demand,
        start() - Duration::days(5),
        start(),
        &HashSet::new(),
    );
    assert_eq!(state.stock("v1"), 10);
}

#[test]
fn arrivals_without_a_stock_entry_create_one() {
    let order = VendorOrder {
        variant_id:   "new".into(),
        product_id:   "P7".into(),
        quantity:     12,
        created_at:   d(2022, 12, 1).and_hms_opt(8, 0, 0).expect("time"),
        arrival_date: start(),
    };
    let state = SimulationState::from_snapshot(&[], &[order]).apply_arrivals(start());
    assert_eq!(state.stock("new"), 12);
    assert_eq!(state.open_quantity("new"), 0);
}
