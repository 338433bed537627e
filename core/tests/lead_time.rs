use chrono::{Duration, NaiveDate, NaiveDateTime};
use rop_core::{
    config::LeadConfig,
    lead::{LeadSourceLevel, LeadTimeStatistics},
    record::LeadRecord,
    types::VariantId,
};
use std::collections::HashMap;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

fn at(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(9, 0, 0).expect("valid time")
}

const ANCHOR: (i32, u32, u32) = (2023, 6, 1);

fn anchor() -> NaiveDate {
    d(ANCHOR.0, ANCHOR.1, ANCHOR.2)
}

/// `count` deliveries of `days` lead time, created on consecutive days from `from`.
fn deliveries(variant: &str, product: &str, vendor: &str, from: NaiveDate, count: usize, days: i64) -> Vec<LeadRecord> {
    (0..count)
        .map(|i| {
            let created = at(from + Duration::days(i as i64));
            LeadRecord::new(variant, product, vendor, created, created + Duration::days(days))
        })
        .collect()
}

fn stats(records: Vec<LeadRecord>) -> LeadTimeStatistics {
    LeadTimeStatistics::new(LeadConfig::default(), records, HashMap::new(), anchor())
        .expect("lead statistics")
}

fn group(ids: &[&str]) -> Vec<VariantId> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn lead_record_days_are_whole_days_between_timestamps() {
    let created = d(2023, 1, 1).and_hms_opt(18, 0, 0).expect("time");
    let updated = d(2023, 1, 11).and_hms_opt(9, 0, 0).expect("time");
    assert_eq!(LeadRecord::new("v", "p", "acme", created, updated).days, 9);
}

#[test]
fn peer_group_wins_when_it_has_enough_records() {
    let records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 20, 12);
    let mut lead = stats(records);

    let result = lead.resolve("P1", "v1", &group(&["v1"]));
    assert_eq!(result.source_level, LeadSourceLevel::VariantsGroup12Month);
    assert_eq!(result.record_count, 20);
    assert_eq!(result.average_days, Some(12.0));
    assert_eq!(result.std_dev_days, Some(0.0));
}

#[test]
fn thin_peer_group_falls_back_to_product_window() {
    let mut records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 5, 10);
    records.extend(deliveries("v2", "P1", "acme", d(2023, 2, 1), 20, 20));
    let mut lead = stats(records);

    let result = lead.resolve("P1", "v1", &group(&["v1"]));
    assert_eq!(
        result.source_level,
        LeadSourceLevel::Product12Month,
        "5 peer-group records is below the threshold; 25 product records is not"
    );
    assert_eq!(result.record_count, 25);
    assert_eq!(result.average_days, Some(18.0));
}

#[test]
fn thin_product_falls_back_to_vendor_window() {
    let mut records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 3, 10);
    records.extend(deliveries("w1", "P2", "acme", d(2023, 1, 1), 30, 30));
    records.extend(deliveries("z1", "P3", "other", d(2023, 1, 1), 30, 99));
    let vendors = HashMap::from([("P1".to_string(), "acme".to_string())]);
    let mut lead = LeadTimeStatistics::new(LeadConfig::default(), records, vendors, anchor())
        .expect("lead statistics");

    let result = lead.resolve("P1", "v1", &group(&["v1"]));
    assert_eq!(result.source_level, LeadSourceLevel::Vendor12Month);
    assert_eq!(result.record_count, 33, "vendor pool holds both acme products");
}

#[test]
fn mapped_vendor_overrides_the_records_vendor() {
    let mut records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 3, 10);
    records.extend(deliveries("z1", "P3", "other", d(2023, 1, 1), 25, 40));
    let vendors = HashMap::from([("P1".to_string(), "other".to_string())]);
    let mut lead = LeadTimeStatistics::new(LeadConfig::default(), records, vendors, anchor())
        .expect("lead statistics");

    let result = lead.resolve("P1", "v1", &[]);
    assert_eq!(result.source_level, LeadSourceLevel::Vendor12Month);
    assert_eq!(result.average_days, Some(40.0));
}

#[test]
fn unmapped_product_has_no_vendor_pool() {
    let mut records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 3, 10);
    records.extend(deliveries("w1", "P2", "acme", d(2023, 1, 1), 30, 30));
    let mut lead = stats(records);

    let result = lead.resolve("P1", "v1", &[]);
    assert_eq!(
        result.source_level,
        LeadSourceLevel::ProductAllTime,
        "the vendor on P1's records is not a mapping"
    );
    assert_eq!(result.record_count, 3);
    assert_eq!(result.average_days, Some(10.0));

    let mut empty = stats(deliveries("w1", "P2", "acme", d(2023, 1, 1), 30, 30));
    let nothing = empty.resolve("P1", "v1", &[]);
    assert_eq!(nothing.source_level, LeadSourceLevel::VendorAllTime);
    assert_eq!(nothing.record_count, 0);
}

#[test]
fn stale_records_fall_back_to_all_time_pools() {
    let old = d(2021, 3, 1);
    let records = deliveries("v1", "P1", "acme", old, 4, 15);
    let mut lead = stats(records);

    let with_peers = lead.resolve("P1", "v1", &group(&["v1"]));
    assert_eq!(with_peers.source_level, LeadSourceLevel::VariantsGroupAllTime);
    assert_eq!(with_peers.record_count, 4);

    let without_peers = lead.resolve("P1", "v9", &[]);
    assert_eq!(without_peers.source_level, LeadSourceLevel::ProductAllTime);
    assert_eq!(without_peers.average_days, Some(15.0));
}

#[test]
fn no_records_anywhere_means_no_lead_time() {
    let mut lead = stats(Vec::new());
    let result = lead.resolve("P404", "v404", &[]);
    assert_eq!(result.average_days, None);
    assert_eq!(result.std_dev_days, None);
    assert_eq!(result.record_count, 0);
}

#[test]
fn records_after_the_anchor_are_never_used() {
    let mut records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 20, 10);
    records.extend(deliveries("v1", "P1", "acme", anchor() + Duration::days(1), 20, 50));
    let mut lead = stats(records);

    let result = lead.resolve("P1", "v1", &group(&["v1"]));
    assert_eq!(result.record_count, 20);
    assert_eq!(result.average_days, Some(10.0), "future deliveries must not leak in");
}

#[test]
fn deliveries_still_open_at_the_anchor_are_not_used() {
    let mut records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 20, 10);
    // Created before the anchor, delivered after it.
    records.extend(deliveries("v1", "P1", "acme", anchor() - Duration::days(5), 10, 30));
    let mut lead = stats(records);

    let result = lead.resolve("P1", "v1", &group(&["v1"]));
    assert_eq!(result.record_count, 20);
    assert_eq!(result.average_days, Some(10.0));

    // At anchor+25 only the first late delivery has landed.
    lead.set_anchor(anchor() + Duration::days(25)).expect("anchor");
    let later = lead.resolve("P1", "v1", &group(&["v1"]));
    assert_eq!(later.record_count, 21, "delivered on the anchor day counts");
}

#[test]
fn static_products_use_the_fixed_lead_time() {
    let records = deliveries("v1", "SB-2899", "acme", d(2023, 1, 1), 30, 5);
    let mut lead = stats(records);

    let result = lead.resolve("SB-2899", "v1", &group(&["v1"]));
    assert_eq!(result.source_level, LeadSourceLevel::Static);
    assert_eq!(result.average_days, Some(120.0));
    assert_eq!(result.record_count, 0);
    assert_eq!(result.source_level.label(), "static_product_lead_time_120_60");
}

#[test]
fn std_dev_is_the_sample_std_dev_of_lead_days() {
    let mut records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 10, 8);
    records.extend(deliveries("v1", "P1", "acme", d(2023, 2, 1), 10, 12));
    let mut lead = stats(records);

    let result = lead.resolve("P1", "v1", &group(&["v1"]));
    assert_eq!(result.average_days, Some(10.0));
    let std = result.std_dev_days.expect("std-dev with 20 records");
    // 20 values, ten at ±2: sum of squares 80, divided by 19.
    assert!((std - (80.0f64 / 19.0).sqrt()).abs() < 1e-12, "got {std}");
}

#[test]
fn cache_is_dropped_when_the_anchor_moves() {
    let records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 20, 10);
    let mut lead = stats(records);
    let peers = group(&["v1"]);

    let first = lead.resolve("P1", "v1", &peers);
    let again = lead.resolve("P1", "v1", &peers);
    assert_eq!(first, again);
    assert_eq!(lead.cached_entries(), 1);

    lead.set_anchor(anchor()).expect("same anchor");
    assert_eq!(lead.cached_entries(), 1, "same date keeps the cache");

    lead.set_anchor(d(2025, 1, 1)).expect("new anchor");
    assert_eq!(lead.cached_entries(), 0);
    let moved = lead.resolve("P1", "v1", &peers);
    assert_eq!(
        moved.source_level,
        LeadSourceLevel::VariantsGroupAllTime,
        "2023 deliveries are outside the trailing window at 2025-01-01"
    );
}

#[test]
fn peer_group_order_does_not_split_the_cache() {
    let mut records = deliveries("v1", "P1", "acme", d(2023, 1, 1), 10, 10);
    records.extend(deliveries("v2", "P1", "acme", d(2023, 1, 1), 10, 10));
    let mut lead = stats(records);

    lead.resolve("P1", "v1", &group(&["v1", "v2"]));
    lead.resolve("P1", "v2", &group(&["v2", "v1"]));
    assert_eq!(lead.cached_entries(), 1);
}
