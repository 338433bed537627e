//! Lead-time statistics with hierarchical fallback.
//!
//! A product's lead time is measured from the narrowest pool that has enough
//! recent records:
//!
//!   1. peer group (same product, variant in the classifier's peer group), trailing window
//!   2. product, trailing window
//!   3. vendor, trailing window
//!
//! If none reaches `min_records`, the first non-empty all-time pool wins, in
//! the same order, regardless of size.
//!
//! Only deliveries completed before the end of the anchor day count. The
//! vendor pool needs the product in the product→vendor map.
//!
//! Results are memoized per (product, peer group) for the current anchor
//! date. The cache is dropped whenever the anchor or the dataset changes.

use crate::{
    calendar,
    config::LeadConfig,
    error::RopResult,
    record::LeadRecord,
    stats,
    types::{ProductId, VariantId, VendorId},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Which pool a lead-time figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSourceLevel {
    VariantsGroup12Month,
    Product12Month,
    Vendor12Month,
    VariantsGroupAllTime,
    ProductAllTime,
    VendorAllTime,
    Static,
}

impl LeadSourceLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::VariantsGroup12Month => "variants_group_12_month",
            Self::Product12Month       => "product_12_month",
            Self::Vendor12Month        => "vendor_12_month",
            Self::VariantsGroupAllTime => "variants_group_all_time",
            Self::ProductAllTime       => "product_all_time",
            Self::VendorAllTime        => "vendor_all_time",
            Self::Static               => "static_product_lead_time_120_60",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadStats {
    pub product_id:   ProductId,
    pub variant_id:   VariantId,
    pub average_days: Option<f64>,
    pub std_dev_days: Option<f64>,
    pub source_level: LeadSourceLevel,
    pub record_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pool {
    PeerGroup,
    Product,
    Vendor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Trailing,
    AllTime,
}

/// One resolver in the fallback chain.
#[derive(Debug, Clone, Copy)]
struct Strategy {
    pool:   Pool,
    window: Window,
    level:  LeadSourceLevel,
}

/// Tried in order; the first with at least `min_records` records wins.
const PRIMARY: [Strategy; 3] = [
    Strategy { pool: Pool::PeerGroup, window: Window::Trailing, level: LeadSourceLevel::VariantsGroup12Month },
    Strategy { pool: Pool::Product,   window: Window::Trailing, level: LeadSourceLevel::Product12Month },
    Strategy { pool: Pool::Vendor,    window: Window::Trailing, level: LeadSourceLevel::Vendor12Month },
];

/// Tried in order when no primary qualifies; the first non-empty wins.
const SECONDARY: [Strategy; 3] = [
    Strategy { pool: Pool::PeerGroup, window: Window::AllTime, level: LeadSourceLevel::VariantsGroupAllTime },
    Strategy { pool: Pool::Product,   window: Window::AllTime, level: LeadSourceLevel::ProductAllTime },
    Strategy { pool: Pool::Vendor,    window: Window::AllTime, level: LeadSourceLevel::VendorAllTime },
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LeadCacheKey {
    product_id: ProductId,
    /// Hash of the sorted peer-group ids.
    peer_group: u64,
}

#[derive(Debug, Clone, Copy)]
struct Resolved {
    average_days: Option<f64>,
    std_dev_days: Option<f64>,
    level:        LeadSourceLevel,
    count:        usize,
}

pub struct LeadTimeStatistics {
    config:          LeadConfig,
    records:         Vec<LeadRecord>,
    product_vendors: HashMap<ProductId, VendorId>,
    by_product:      HashMap<ProductId, Vec<usize>>,
    by_vendor:       HashMap<VendorId, Vec<usize>>,
    anchor:          NaiveDate,
    trailing_from:   NaiveDateTime,
    until:           NaiveDateTime,
    cache:           HashMap<LeadCacheKey, Resolved>,
}

impl LeadTimeStatistics {
    pub fn new(
        config: LeadConfig,
        records: Vec<LeadRecord>,
        product_vendors: HashMap<ProductId, VendorId>,
        anchor: NaiveDate,
    ) -> RopResult<Self> {
        let mut lead = Self {
            config,
            records:         Vec::new(),
            product_vendors: HashMap::new(),
            by_product:      HashMap::new(),
            by_vendor:       HashMap::new(),
            anchor,
            trailing_from:   calendar::day_start(anchor),
            until:           calendar::day_end_exclusive(anchor),
            cache:           HashMap::new(),
        };
        lead.replace_records(records, product_vendors);
        lead.apply_anchor(anchor)?;
        Ok(lead)
    }

    /// Swap the dataset. Drops every memoized result.
    pub fn replace_records(
        &mut self,
        records: Vec<LeadRecord>,
        product_vendors: HashMap<ProductId, VendorId>,
    ) {
        self.by_product.clear();
        self.by_vendor.clear();
        for (i, record) in records.iter().enumerate() {
            self.by_product.entry(record.product_id.clone()).or_default().push(i);
            self.by_vendor.entry(record.vendor.clone()).or_default().push(i);
        }
        self.records = records;
        self.product_vendors = product_vendors;
        self.invalidate();
    }

    /// Move the anchor date. A new date drops every memoized result.
    pub fn set_anchor(&mut self, anchor: NaiveDate) -> RopResult<()> {
        if anchor == self.anchor {
            return Ok(());
        }
        self.apply_anchor(anchor)?;
        self.invalidate();
        Ok(())
    }

    fn apply_anchor(&mut self, anchor: NaiveDate) -> RopResult<()> {
        let from = calendar::shift_months(anchor, -(self.config.trailing_months as i32))?;
        self.anchor = anchor;
        self.trailing_from = calendar::day_start(from);
        self.until = calendar::day_end_exclusive(anchor);
        Ok(())
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Lead-time statistics for a variant of `product_id`, drawing on `peer_group`.
    pub fn resolve(&mut self, product_id: &str, variant_id: &str, peer_group: &[VariantId]) -> LeadStats {
        if self.config.static_product_ids.iter().any(|p| p == product_id) {
            return LeadStats {
                product_id:   product_id.to_string(),
                variant_id:   variant_id.to_string(),
                average_days: Some(self.config.static_average_days),
                std_dev_days: Some(self.config.static_std_dev_days),
                source_level: LeadSourceLevel::Static,
                record_count: 0,
            };
        }

        let key = LeadCacheKey {
            product_id: product_id.to_string(),
            peer_group: peer_group_fingerprint(peer_group),
        };
        let resolved = match self.cache.get(&key) {
            Some(hit) => *hit,
            None => {
                let fresh = self.compute(product_id, peer_group);
                self.cache.insert(key, fresh);
                fresh
            }
        };

        LeadStats {
            product_id:   product_id.to_string(),
            variant_id:   variant_id.to_string(),
            average_days: resolved.average_days,
            std_dev_days: resolved.std_dev_days,
            source_level: resolved.level,
            record_count: resolved.count,
        }
    }

    fn compute(&self, product_id: &str, peer_group: &[VariantId]) -> Resolved {
        let min = self.config.min_records;

        let chosen = PRIMARY
            .iter()
            .find_map(|s| self.apply(s, product_id, peer_group, min))
            .or_else(|| {
                SECONDARY
                    .iter()
                    .find_map(|s| self.apply(s, product_id, peer_group, 1))
            });

        let (days, level) = chosen.unwrap_or((Vec::new(), LeadSourceLevel::VendorAllTime));
        Resolved {
            average_days: stats::mean(&days),
            std_dev_days: stats::sample_std_dev(&days),
            level,
            count: days.len(),
        }
    }

    /// Run one strategy: lead days from its pool and window, sorted, if at least `min`.
    fn apply(
        &self,
        strategy: &Strategy,
        product_id: &str,
        peer_group: &[VariantId],
        min: usize,
    ) -> Option<(Vec<f64>, LeadSourceLevel)> {
        let mut days: Vec<f64> = self
            .pool(strategy.pool, product_id, peer_group)
            .filter(|r| r.created_at < self.until && r.updated_at < self.until)
            .filter(|r| strategy.window == Window::AllTime || r.created_at >= self.trailing_from)
            .map(|r| r.days as f64)
            .collect();

        if days.len() < min {
            return None;
        }
        days.sort_by(f64::total_cmp);
        Some((days, strategy.level))
    }

    fn pool<'a>(
        &'a self,
        pool: Pool,
        product_id: &str,
        peer_group: &'a [VariantId],
    ) -> Box<dyn Iterator<Item = &'a LeadRecord> + 'a> {
        match pool {
            Pool::PeerGroup => Box::new(
                self.indexed(self.by_product.get(product_id))
                    .filter(move |r| peer_group.contains(&r.variant_id)),
            ),
            Pool::Product => Box::new(self.indexed(self.by_product.get(product_id))),
            Pool::Vendor => {
                let vendor = self.vendor_of(product_id);
                Box::new(self.indexed(vendor.and_then(|v| self.by_vendor.get(v))))
            }
        }
    }

    fn indexed<'a>(&'a self, index: Option<&'a Vec<usize>>) -> impl Iterator<Item = &'a LeadRecord> + 'a {
        index
            .into_iter()
            .flatten()
            .filter_map(move |i| self.records.get(*i))
    }

    /// Unmapped products have no vendor pool.
    fn vendor_of(&self, product_id: &str) -> Option<&VendorId> {
        self.product_vendors.get(product_id)
    }
}

fn peer_group_fingerprint(peer_group: &[VariantId]) -> u64 {
    let mut sorted: Vec<&VariantId> = peer_group.iter().collect();
    sorted.sort();
    let mut hasher = DefaultHasher::new();
    sorted.hash(&mut hasher);
    hasher.finish()
}
