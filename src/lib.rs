//! Payflow - Customer and Payment Ledger Service
//!
//! An asynchronous funds-transfer pipeline over a customer ledger: payment
//! intents are validated, published to a queue, and settled by concurrent
//! workers under serializable isolation.
//!
//! # Modules
//!
//! - [`core_types`] - Core identifier types (CustomerId, TransferId, IntentId)
//! - [`error`] - Error taxonomy with stable codes and HTTP status mapping
//! - [`config`] - YAML application configuration per environment
//! - [`logging`] - tracing subscriber setup with file rotation
//! - [`audit`] - Fire-and-forget audit event sinks
//! - [`card`] - Stored payment-instrument encryption
//! - [`customer`] - Payment-method registration
//! - [`identity`] - Token-based caller identity resolution
//! - [`ledger`] - Customer/transfer storage (in-memory and PostgreSQL)
//! - [`payment`] - Submission, intent channel, and settlement workers
//! - [`query`] - Read-side transfer queries and monthly statistics

// Core types - must be first!
pub mod core_types;

pub mod audit;
pub mod card;
pub mod config;
pub mod customer;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod payment;
pub mod query;

// Convenient re-exports at crate root
pub use audit::{AuditSink, AuditStream};
pub use card::CardCipher;
pub use core_types::{CustomerId, IntentId, TransferId};
pub use customer::CustomerRegistry;
pub use error::PaymentError;
pub use identity::{AuthPrincipal, IdentityResolver, JwtIdentityResolver};
pub use ledger::{
    Customer, Direction, LedgerStore, MemoryLedgerStore, NewCustomer, PgLedgerStore, Transfer,
    TransferDetail, TransferFilter,
};
pub use payment::{
    IntentPublisher, IntentReceiver, IntentSubmitter, PaymentIntent, ProcessOutcome,
    ProcessorWorker, SubmissionReceipt, TransferProcessor, intent_channel,
};
pub use query::{DirectionStats, MonthlyStatistics, TransferQueryEngine};
