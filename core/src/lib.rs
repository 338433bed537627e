//! rop-core: reorder-point calculation and order simulation.
//!
//! Data flows one way: sources → statistics (classifier, demand, lead) →
//! reorder points → simulator → output rows.

pub mod calendar;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod demand;
pub mod error;
pub mod forecast;
pub mod lead;
pub mod record;
pub mod reorder;
pub mod report;
pub mod rng;
pub mod simulation;
pub mod source;
pub mod state;
pub mod stats;
pub mod store;
pub mod types;
