//! Raw historical records, fetched once per run and never mutated.

use crate::types::{ProductId, Quantity, VariantId, VendorId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One sold line: `quantity` units of a variant on an order created at `occurred_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub variant_id:  VariantId,
    pub product_id:  ProductId,
    pub quantity:    Quantity,
    pub occurred_at: NaiveDateTime,
}

/// A delivered vendor order line with its observed lead time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub vendor:     VendorId,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    /// Whole days between creation and warehouse delivery.
    pub days:       i64,
}

impl LeadRecord {
    pub fn new(
        variant_id: impl Into<VariantId>,
        product_id: impl Into<ProductId>,
        vendor: impl Into<VendorId>,
        created_at: NaiveDateTime,
        updated_at: NaiveDateTime,
    ) -> Self {
        Self {
            variant_id: variant_id.into(),
            product_id: product_id.into(),
            vendor:     vendor.into(),
            created_at,
            updated_at,
            days:       (updated_at - created_at).num_days(),
        }
    }
}

/// Net stock of a variant summed over one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub stock:      Quantity,
}

/// A vendor order still in transit at the start of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorOrder {
    pub variant_id:   VariantId,
    pub product_id:   ProductId,
    pub quantity:     Quantity,
    pub created_at:   NaiveDateTime,
    pub arrival_date: NaiveDate,
}
