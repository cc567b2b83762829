//! Core type definitions shared across the crate.
//!
//! Identifiers are `i64` to match PostgreSQL `BIGSERIAL` columns directly.

use uuid::Uuid;

/// Customer identifier (primary key of `customers_tb`)
pub type CustomerId = i64;

/// Transfer identifier (primary key of `transfers_tb`)
pub type TransferId = i64;

/// Idempotency key attached to every payment intent
pub type IntentId = Uuid;
