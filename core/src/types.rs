//! Shared primitive types used across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A sellable SKU variant identifier (the unit everything is computed for).
pub type VariantId = String;

/// The parent product of a variant. Lead-time fallback works at this level.
pub type ProductId = String;

/// Vendor (supplier) identifier.
pub type VendorId = String;

/// Whole units of stock or ordered quantity. Signed: projected stock can go negative.
pub type Quantity = i64;

/// ABC volume class. Declaration order is priority order: `APlus` is checked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VolumeGroup {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
}

impl VolumeGroup {
    pub const ALL: [VolumeGroup; 4] = [Self::APlus, Self::A, Self::B, Self::C];

    /// Where unclassified variants land.
    pub const LOWEST: VolumeGroup = Self::C;

    pub fn label(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A     => "A",
            Self::B     => "B",
            Self::C     => "C",
        }
    }
}

/// XYZ variability class, ordered from steadiest to most erratic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariationGroup {
    X,
    Y,
    Z,
}

impl VariationGroup {
    pub const ALL: [VariationGroup; 3] = [Self::X, Self::Y, Self::Z];

    pub const LOWEST: VariationGroup = Self::Z;

    pub fn label(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }
}

/// The (volume, variation) pair a variant is classified into, e.g. `A+ X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassificationKey {
    pub volume:    VolumeGroup,
    pub variation: VariationGroup,
}

impl ClassificationKey {
    pub fn new(volume: VolumeGroup, variation: VariationGroup) -> Self {
        Self { volume, variation }
    }
}

impl fmt::Display for ClassificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.volume.label(), self.variation.label())
    }
}

impl FromStr for ClassificationKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vol, var) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| format!("expected '<volume> <variation>', got '{s}'"))?;
        let volume = VolumeGroup::ALL
            .into_iter()
            .find(|g| g.label() == vol)
            .ok_or_else(|| format!("unknown volume group '{vol}'"))?;
        let variation = VariationGroup::ALL
            .into_iter()
            .find(|g| g.label() == var.trim())
            .ok_or_else(|| format!("unknown variation group '{var}'"))?;
        Ok(Self { volume, variation })
    }
}

impl TryFrom<String> for ClassificationKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClassificationKey> for String {
    fn from(key: ClassificationKey) -> Self {
        key.to_string()
    }
}
