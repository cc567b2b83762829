//! Read-side query surface over the ledger
//!
//! Per-customer reads enforce sender-only visibility; admin reads are a
//! privileged path with richer filters (counterparty name, card number,
//! month intervals) plus per-customer monthly statistics.

pub mod engine;
pub mod statistics;

pub use engine::TransferQueryEngine;
pub use statistics::{DirectionStats, MonthlyStatistics};
