//! Asynchronous funds-transfer pipeline
//!
//! Submission and settlement are decoupled in time:
//!
//! ```text
//! caller ──▶ IntentSubmitter ──▶ intent channel ──▶ ProcessorWorker(s)
//!               (validate,            (at-least-          (re-validate,
//!                publish,              once)               settle atomically
//!                receipt)                                  or reject)
//! ```
//!
//! # Safety invariants
//!
//! 1. An intent produces exactly one transfer or none; settlement is keyed
//!    by the intent ID so redelivery cannot double-debit
//! 2. Rejection never mutates state
//! 3. The ledger store's serializable isolation is the only correctness
//!    barrier between concurrent workers

pub mod channel;
pub mod intent;
pub mod processor;
pub mod submitter;

pub use channel::{IntentPublisher, IntentReceiver, intent_channel};
pub use intent::{PaymentIntent, SubmissionReceipt};
pub use processor::{ProcessOutcome, ProcessorWorker, TransferProcessor};
pub use submitter::IntentSubmitter;
