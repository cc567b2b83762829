//! Ledger Store
//!
//! Durable record of customer balances and completed transfers. Two
//! implementations of the [`LedgerStore`] contract:
//! - [`PgLedgerStore`] - PostgreSQL, serializable transactions
//! - [`MemoryLedgerStore`] - single-mutex in-RAM store for tests and
//!   persistence-free local runs
//!
//! # Safety invariants
//!
//! 1. `atomic_transfer` debits, credits and records in one transaction;
//!    no intermediate state is externally observable
//! 2. Balances never go negative; the sender must hold strictly more than
//!    the transfer amount
//! 3. An intent ID settles at most once (`DuplicateIntent` on replay)

pub mod memory;
pub mod models;
pub mod pg;
pub mod schema;
pub mod store;

pub use memory::MemoryLedgerStore;
pub use models::{
    Customer, Direction, NewCustomer, Transfer, TransferDetail, TransferFilter,
};
pub use pg::PgLedgerStore;
pub use store::LedgerStore;
