//! Weekly demand from an external forecast export, used instead of history
//! when the run is in forecast mode.

use crate::{
    calendar,
    demand::DemandStats,
    error::RopResult,
    lead::LeadStats,
    stats,
    types::VariantId,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ForecastDocument {
    result: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastEntry {
    part_number:     String,
    demand_forecast: DemandForecast,
}

#[derive(Debug, Deserialize)]
struct DemandForecast {
    consensus: Vec<ForecastPoint>,
}

#[derive(Debug, Deserialize)]
struct ForecastPoint {
    timestamp: ForecastTimestamp,
    value:     f64,
}

/// Epoch milliseconds, bare or in the `{"$date": ms}` export wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ForecastTimestamp {
    Millis(i64),
    Wrapped {
        #[serde(rename = "$date")]
        date: i64,
    },
}

impl ForecastTimestamp {
    fn date(&self) -> Option<NaiveDate> {
        let millis = match self {
            Self::Millis(ms)         => *ms,
            Self::Wrapped { date }   => *date,
        };
        DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForecastDemandProvider {
    weekly: HashMap<VariantId, BTreeMap<NaiveDate, f64>>,
}

impl ForecastDemandProvider {
    pub fn from_path(path: impl AsRef<Path>) -> RopResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> RopResult<Self> {
        let document: ForecastDocument = serde_json::from_str(json)?;
        let mut weekly: HashMap<VariantId, BTreeMap<NaiveDate, f64>> = HashMap::new();

        for entry in document.result {
            // First series for a part number wins.
            if weekly.contains_key(&entry.part_number) {
                continue;
            }
            let mut series = BTreeMap::new();
            for point in entry.demand_forecast.consensus {
                match point.timestamp.date() {
                    Some(date) => {
                        series.entry(date).or_insert(point.value);
                    }
                    None => log::warn!(
                        "forecast: dropping point with out-of-range timestamp for {}",
                        entry.part_number
                    ),
                }
            }
            weekly.insert(entry.part_number, series);
        }

        log::info!("forecast: loaded series for {} variants", weekly.len());
        Ok(Self { weekly })
    }

    pub fn has_demand(&self, variant_id: &str) -> bool {
        self.weekly.contains_key(variant_id)
    }

    /// Consume `ceil(lead / 7)` consecutive weekly values starting at the
    /// Monday on or after `today`; stops at the first missing week.
    pub fn get_demand(
        &self,
        product_id: &str,
        variant_id: &str,
        today: NaiveDate,
        lead: &LeadStats,
    ) -> DemandStats {
        let weeks = lead
            .average_days
            .filter(|days| *days > 0.0)
            .map(|days| (days / 7.0).ceil() as usize)
            .unwrap_or(0);

        let mut consumed = Vec::with_capacity(weeks);
        if let Some(series) = self.weekly.get(variant_id) {
            let mut monday = calendar::monday_on_or_after(today);
            while consumed.len() < weeks {
                let Some(value) = series.get(&monday) else { break };
                consumed.push(*value);
                monday += Duration::days(7);
            }
        }

        DemandStats {
            product_id:      product_id.to_string(),
            variant_id:      variant_id.to_string(),
            average_per_day: stats::mean(&consumed),
            std_dev_daily:   stats::sample_std_dev(&consumed),
            monthly_series:  consumed,
        }
    }
}
