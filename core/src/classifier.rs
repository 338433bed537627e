//! ABC/XYZ classification of variants.
//!
//! Volume (ABC): variants sorted by sold quantity, descending, and cut by
//! cumulative share of the total. Variation (XYZ): coefficient of variation of
//! the monthly demand series. The intersection of a variant's two groups is its
//! peer group, which widens the lead-time sample pool.
//!
//! Every `calculate` call rebuilds all maps from scratch for its anchor date.

use crate::{
    calendar,
    config::ClassificationConfig,
    error::{RopError, RopResult},
    record::DemandRecord,
    stats,
    types::{ClassificationKey, VariantId, VariationGroup, VolumeGroup},
};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Peer-group sizes per (volume, variation) cell, plus totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub as_of:          NaiveDate,
    pub total_quantity: i64,
    pub variants:       usize,
    /// Rows follow `VolumeGroup::ALL`, columns `VariationGroup::ALL`.
    pub matrix:         [[usize; 3]; 4],
}

pub struct VariantClassifier {
    config:            ClassificationConfig,
    as_of:             Option<NaiveDate>,
    total_quantity:    i64,
    volume_of:         HashMap<VariantId, VolumeGroup>,
    variation_of:      HashMap<VariantId, VariationGroup>,
    volume_members:    BTreeMap<VolumeGroup, Vec<VariantId>>,
    variation_members: BTreeMap<VariationGroup, Vec<VariantId>>,
    peer_groups:       HashMap<ClassificationKey, Vec<VariantId>>,
    monthly:           HashMap<VariantId, Vec<f64>>,
}

impl VariantClassifier {
    pub fn new(config: ClassificationConfig) -> Self {
        Self {
            config,
            as_of:             None,
            total_quantity:    0,
            volume_of:         HashMap::new(),
            variation_of:      HashMap::new(),
            volume_members:    BTreeMap::new(),
            variation_members: BTreeMap::new(),
            peer_groups:       HashMap::new(),
            monthly:           HashMap::new(),
        }
    }

    /// Classify every variant that sold within `[as_of − years, as_of − 1 day]`.
    pub fn calculate(
        &mut self,
        records: &[DemandRecord],
        as_of: NaiveDate,
        years: u32,
    ) -> RopResult<()> {
        self.clear();

        let window_start = calendar::shift_years(as_of, -(years as i32))?;
        let from = calendar::day_start(window_start);
        let to = calendar::day_start(as_of);

        let months = 12 * years as usize;
        let first_month = calendar::month_start(window_start);
        let day_shift = Duration::days(i64::from(window_start.day0()));

        // Encounter order is kept: it breaks ties in the volume sort.
        let mut order: Vec<VariantId> = Vec::new();
        let mut quantities: HashMap<VariantId, i64> = HashMap::new();
        let mut monthly: HashMap<VariantId, Vec<f64>> = HashMap::new();

        for record in records {
            if record.occurred_at < from || record.occurred_at >= to {
                continue;
            }
            if record.variant_id.is_empty() {
                continue;
            }

            self.total_quantity += record.quantity;

            if !quantities.contains_key(&record.variant_id) {
                order.push(record.variant_id.clone());
            }
            *quantities.entry(record.variant_id.clone()).or_insert(0) += record.quantity;

            let month = calendar::month_start(record.occurred_at.date() - day_shift);
            let index = month_index(first_month, month);
            let bucket = match index {
                Some(i) if i < months => i,
                _ => {
                    return Err(RopError::DataInconsistency {
                        month,
                        from: window_start,
                        to:   as_of - Duration::days(1),
                    })
                }
            };
            monthly
                .entry(record.variant_id.clone())
                .or_insert_with(|| vec![0.0; months])[bucket] += record.quantity as f64;
        }

        self.assign_volume_groups(&order, &quantities);
        self.assign_variation_groups(&order, &monthly);
        self.build_peer_groups();
        self.monthly = monthly;
        self.as_of = Some(as_of);

        log::debug!(
            "classified {} variants at {as_of} (total quantity {})",
            self.volume_of.len(),
            self.total_quantity
        );
        Ok(())
    }

    fn clear(&mut self) {
        self.as_of = None;
        self.total_quantity = 0;
        self.volume_of.clear();
        self.variation_of.clear();
        self.volume_members.clear();
        self.variation_members.clear();
        self.peer_groups.clear();
        self.monthly.clear();
    }

    fn assign_volume_groups(&mut self, order: &[VariantId], quantities: &HashMap<VariantId, i64>) {
        let mut ranked: Vec<(&VariantId, i64)> = order
            .iter()
            .map(|id| (id, quantities.get(id).copied().unwrap_or(0)))
            .collect();
        // sort_by is stable: equal quantities keep encounter order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let thresholds = self.config.volume.ordered();
        let total = self.total_quantity as f64;
        let mut cumulative = 0.0;

        for (variant_id, quantity) in ranked {
            let group = if total > 0.0 {
                cumulative += quantity as f64 / total;
                thresholds
                    .iter()
                    .find(|(_, bound)| cumulative <= *bound)
                    .map(|(group, _)| *group)
                    .unwrap_or(VolumeGroup::LOWEST)
            } else {
                VolumeGroup::LOWEST
            };

            self.volume_members.entry(group).or_default().push(variant_id.clone());
            self.volume_of.insert(variant_id.clone(), group);
        }
    }

    fn assign_variation_groups(&mut self, order: &[VariantId], monthly: &HashMap<VariantId, Vec<f64>>) {
        let thresholds = self.config.variation.ordered();

        for variant_id in order {
            let Some(series) = monthly.get(variant_id) else { continue };
            let group = match coefficient_of_variation(series) {
                Some(cv) => thresholds
                    .iter()
                    .find(|(_, bound)| cv <= *bound)
                    .map(|(group, _)| *group)
                    .unwrap_or(VariationGroup::LOWEST),
                None => VariationGroup::LOWEST,
            };

            self.variation_members.entry(group).or_default().push(variant_id.clone());
            self.variation_of.insert(variant_id.clone(), group);
        }
    }

    fn build_peer_groups(&mut self) {
        for volume in VolumeGroup::ALL {
            let volume_ids = self.volume_members.get(&volume).map(Vec::as_slice).unwrap_or(&[]);
            for variation in VariationGroup::ALL {
                let variation_ids: HashSet<&VariantId> = self
                    .variation_members
                    .get(&variation)
                    .map(|ids| ids.iter().collect())
                    .unwrap_or_default();
                let members = volume_ids
                    .iter()
                    .filter(|id| variation_ids.contains(id))
                    .cloned()
                    .collect();
                self.peer_groups.insert(ClassificationKey::new(volume, variation), members);
            }
        }
    }

    /// The anchor date of the last `calculate`, if any.
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    pub fn volume_group(&self, variant_id: &str) -> VolumeGroup {
        self.volume_of.get(variant_id).copied().unwrap_or(VolumeGroup::LOWEST)
    }

    pub fn variation_group(&self, variant_id: &str) -> VariationGroup {
        self.variation_of.get(variant_id).copied().unwrap_or(VariationGroup::LOWEST)
    }

    pub fn group_key(&self, variant_id: &str) -> ClassificationKey {
        ClassificationKey::new(self.volume_group(variant_id), self.variation_group(variant_id))
    }

    /// Variants sharing both the volume and the variation group of `variant_id`,
    /// in volume-rank order. Unclassified variants get the lowest cell.
    pub fn peer_group(&self, variant_id: &str) -> &[VariantId] {
        self.peer_groups
            .get(&self.group_key(variant_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn volume_members(&self, group: VolumeGroup) -> &[VariantId] {
        self.volume_members.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn variation_members(&self, group: VariationGroup) -> &[VariantId] {
        self.variation_members.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Monthly sold quantities, oldest bucket first. Buckets start on the
    /// window's day of month. Empty for variants without sales in the window.
    pub fn monthly_series(&self, variant_id: &str) -> &[f64] {
        self.monthly.get(variant_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn classified_count(&self) -> usize {
        self.volume_of.len()
    }

    pub fn summary(&self) -> Option<ClassificationSummary> {
        let as_of = self.as_of?;
        let mut matrix = [[0usize; 3]; 4];
        for (row, volume) in VolumeGroup::ALL.into_iter().enumerate() {
            for (col, variation) in VariationGroup::ALL.into_iter().enumerate() {
                matrix[row][col] = self
                    .peer_groups
                    .get(&ClassificationKey::new(volume, variation))
                    .map_or(0, Vec::len);
            }
        }
        Some(ClassificationSummary {
            as_of,
            total_quantity: self.total_quantity,
            variants: self.classified_count(),
            matrix,
        })
    }
}

/// Months from `first` to `month`, both first-of-month dates. `None` before `first`.
fn month_index(first: NaiveDate, month: NaiveDate) -> Option<usize> {
    let diff = (month.year() - first.year()) * 12 + month.month() as i32 - first.month() as i32;
    usize::try_from(diff).ok()
}

fn coefficient_of_variation(series: &[f64]) -> Option<f64> {
    let avg = stats::mean(series)?;
    if avg == 0.0 {
        return None;
    }
    stats::sample_std_dev(series).map(|std| std / avg)
}
