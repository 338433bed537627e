use crate::{
    error::{RopError, RopResult},
    types::{ClassificationKey, ProductId, VariantId, VariationGroup, VolumeGroup},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Classification ────────────────────────────────────────────────

/// Upper bounds of cumulative volume share per ABC group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeThresholds {
    pub a_plus: f64,
    pub a:      f64,
    pub b:      f64,
    pub c:      f64,
}

impl Default for VolumeThresholds {
    fn default() -> Self {
        Self { a_plus: 0.50, a: 0.75, b: 0.90, c: 1.00 }
    }
}

impl VolumeThresholds {
    /// Groups paired with their bound, in priority order.
    pub fn ordered(&self) -> [(VolumeGroup, f64); 4] {
        [
            (VolumeGroup::APlus, self.a_plus),
            (VolumeGroup::A,     self.a),
            (VolumeGroup::B,     self.b),
            (VolumeGroup::C,     self.c),
        ]
    }
}

/// Upper bounds of the coefficient of variation for X and Y. Everything above is Z.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationThresholds {
    pub x: f64,
    pub y: f64,
}

impl Default for VariationThresholds {
    fn default() -> Self {
        Self { x: 0.34, y: 1.47 }
    }
}

impl VariationThresholds {
    pub fn ordered(&self) -> [(VariationGroup, f64); 2] {
        [(VariationGroup::X, self.x), (VariationGroup::Y, self.y)]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub volume:    VolumeThresholds,
    pub variation: VariationThresholds,
}

// ── Lead time ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadConfig {
    /// Records a trailing-window level needs before it is trusted.
    pub min_records:          usize,
    pub trailing_months:      u32,
    /// Products whose lead time is fixed instead of measured.
    pub static_product_ids:   Vec<ProductId>,
    pub static_average_days:  f64,
    pub static_std_dev_days:  f64,
}

/// Products with a fixed lead time out of the box.
pub const STATIC_LEAD_PRODUCTS: [&str; 21] = [
    "DLTB-1", "LIPC3", "LIPC1", "LFNPC2", "DLAH-60", "DLFA-ED", "SB-2899",
    "PUSOLB-1", "SB-10057", "SB-10056", "LLRVC2", "LSZC2", "DLAH-1", "SB-2901",
    "DLLB-1", "SB-2908", "SB-2900", "SB-10053", "SB-10063", "LTB-1", "SB-10052",
];

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            min_records:         20,
            trailing_months:     12,
            static_product_ids:  STATIC_LEAD_PRODUCTS.iter().map(|p| p.to_string()).collect(),
            static_average_days: 120.0,        // 4 months
            static_std_dev_days: 48.989794855664,
        }
    }
}

// ── Reorder point ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityStockRounding {
    #[default]
    Floor,
    Ceil,
}

impl SecurityStockRounding {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Self::Floor => value.floor(),
            Self::Ceil  => value.ceil(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderQuantityRounding {
    #[default]
    Ceil,
    /// Keep the fractional quantity; truncated only when stored as whole units.
    Exact,
}

impl OrderQuantityRounding {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Self::Ceil  => value.ceil(),
            Self::Exact => value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTablePreset {
    /// A+ X at 97% down to C Y/Z at 0%.
    #[default]
    Standard,
    /// A+ X at 99% down to C Y/Z at 0%.
    HighService,
}

/// Service coefficient (z-score) per classification key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTable(HashMap<ClassificationKey, f64>);

impl ServiceTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (ClassificationKey, f64)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn standard() -> Self {
        use VariationGroup::*;
        use VolumeGroup::*;
        Self::from_entries([
            (ClassificationKey::new(APlus, X), 1.88), // 97%
            (ClassificationKey::new(APlus, Y), 1.64), // 95%
            (ClassificationKey::new(APlus, Z), 1.48), // 93%
            (ClassificationKey::new(A, X),     1.34), // 91%
            (ClassificationKey::new(A, Y),     1.28), // 90%
            (ClassificationKey::new(A, Z),     1.23), // 89%
            (ClassificationKey::new(B, X),     1.01), // 85%
            (ClassificationKey::new(B, Y),     0.84), // 80%
            (ClassificationKey::new(B, Z),     0.52), // 70%
            (ClassificationKey::new(C, X),     0.52), // 70%
            (ClassificationKey::new(C, Y),     0.0),
            (ClassificationKey::new(C, Z),     0.0),
        ])
    }

    pub fn high_service() -> Self {
        use VariationGroup::*;
        use VolumeGroup::*;
        Self::from_entries([
            (ClassificationKey::new(APlus, X), 2.33), // 99%
            (ClassificationKey::new(APlus, Y), 1.88), // 97%
            (ClassificationKey::new(APlus, Z), 1.48), // 93%
            (ClassificationKey::new(A, X),     1.88),
            (ClassificationKey::new(A, Y),     1.64), // 95%
            (ClassificationKey::new(A, Z),     1.48),
            (ClassificationKey::new(B, X),     1.64),
            (ClassificationKey::new(B, Y),     1.28), // 90%
            (ClassificationKey::new(B, Z),     0.84), // 80%
            (ClassificationKey::new(C, X),     0.84),
            (ClassificationKey::new(C, Y),     0.0),
            (ClassificationKey::new(C, Z),     0.0),
        ])
    }

    pub fn preset(preset: ServiceTablePreset) -> Self {
        match preset {
            ServiceTablePreset::Standard    => Self::standard(),
            ServiceTablePreset::HighService => Self::high_service(),
        }
    }

    /// Coefficient for `key`; unmapped keys get no safety buffer.
    pub fn coefficient(&self, key: ClassificationKey) -> f64 {
        self.0.get(&key).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, key: ClassificationKey, coefficient: f64) {
        self.0.insert(key, coefficient);
    }
}

impl Default for ServiceTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    pub service_table_preset:    ServiceTablePreset,
    /// Per-key overrides applied on top of the preset, e.g. `{"B Z": 0.6}`.
    pub service_overrides:       HashMap<ClassificationKey, f64>,
    pub security_stock_rounding: SecurityStockRounding,
    pub order_quantity_rounding: OrderQuantityRounding,
    /// Static report rows above this lead-time std-dev are skipped.
    pub max_lead_std_dev:        f64,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            service_table_preset:    ServiceTablePreset::Standard,
            service_overrides:       HashMap::new(),
            security_stock_rounding: SecurityStockRounding::Floor,
            order_quantity_rounding: OrderQuantityRounding::Ceil,
            max_lead_std_dev:        10.0,
        }
    }
}

impl ReorderConfig {
    pub fn service_table(&self) -> ServiceTable {
        let mut table = ServiceTable::preset(self.service_table_preset);
        for (key, coefficient) in &self.service_overrides {
            table.set(*key, *coefficient);
        }
        table
    }
}

// ── Simulation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandMode {
    /// Demand statistics from the sales history.
    #[default]
    History,
    /// Demand from the external weekly forecast document.
    Forecast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalLeadPolicy {
    /// Orders arrive after the average lead time plus the safety adjustment.
    #[default]
    Adjusted,
    /// Orders arrive after the bare average lead time.
    Average,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// First simulated order date; expected to be a Monday or Thursday.
    pub start_date:              NaiveDate,
    pub iterations:              u32,
    pub lead_days_adjustment:    i64,
    /// Upper bound of uniform jitter added to each arrival. 0 disables it.
    pub random_lead_days:        u32,
    pub seed:                    u64,
    /// How far back open vendor orders are loaded for the starting backlog.
    pub backlog_lookback_months: u32,
    pub demand_mode:             DemandMode,
    pub arrival_policy:          ArrivalLeadPolicy,
    pub excluded_products:       Vec<ProductId>,
    /// When set, only these variants are simulated.
    pub allowed_variants:        Option<Vec<VariantId>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_date:              NaiveDate::from_ymd_opt(2023, 1, 2).unwrap_or_default(),
            iterations:              144,
            lead_days_adjustment:    4,
            random_lead_days:        0,
            seed:                    42,
            backlog_lookback_months: 1,
            demand_mode:             DemandMode::History,
            arrival_policy:          ArrivalLeadPolicy::Adjusted,
            excluded_products:       Vec::new(),
            allowed_variants:        None,
        }
    }
}

// ── Root ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RopConfig {
    /// History window, in years, for demand statistics and classification.
    pub years_window:   u32,
    pub classification: ClassificationConfig,
    pub lead:           LeadConfig,
    pub reorder:        ReorderConfig,
    pub simulation:     SimulationConfig,
}

impl Default for RopConfig {
    fn default() -> Self {
        Self {
            years_window:   1,
            classification: ClassificationConfig::default(),
            lead:           LeadConfig::default(),
            reorder:        ReorderConfig::default(),
            simulation:     SimulationConfig::default(),
        }
    }
}

impl RopConfig {
    /// Load from `{data_dir}/rop_config.json`. Missing keys take defaults.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/rop_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: RopConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RopResult<()> {
        if self.years_window == 0 {
            return Err(RopError::InvalidConfig("years_window must be at least 1".into()));
        }

        let volume = self.classification.volume.ordered();
        if volume.windows(2).any(|w| w[0].1 > w[1].1) {
            return Err(RopError::InvalidConfig(
                "volume thresholds must be ascending from A+ to C".into(),
            ));
        }

        let variation = &self.classification.variation;
        if variation.x > variation.y {
            return Err(RopError::InvalidConfig(
                "variation threshold X must not exceed Y".into(),
            ));
        }

        if self.lead.trailing_months == 0 {
            return Err(RopError::InvalidConfig("lead.trailing_months must be at least 1".into()));
        }
        Ok(())
    }
}
