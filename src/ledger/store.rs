//! Ledger store contract
//!
//! The store is the only correctness barrier for contended balances: multiple
//! processor workers may settle intents touching the same customer
//! concurrently, and `atomic_transfer` must behave as if those settlements
//! executed in some serial order.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core_types::{CustomerId, IntentId, TransferId};
use crate::error::PaymentError;

use super::models::{Customer, NewCustomer, Transfer, TransferDetail, TransferFilter};

/// Durable store of customer balances and completed transfers
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // === Customers ===

    async fn create_customer(&self, new: NewCustomer) -> Result<Customer, PaymentError>;

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PaymentError>;

    async fn find_customer_by_email(&self, email: &str)
    -> Result<Option<Customer>, PaymentError>;

    async fn list_customers(&self) -> Result<Vec<Customer>, PaymentError>;

    /// Register an (already encrypted) payment instrument for a customer
    async fn set_card_number(
        &self,
        id: CustomerId,
        card_number_enc: &str,
    ) -> Result<(), PaymentError>;

    async fn get_balance(&self, id: CustomerId) -> Result<Decimal, PaymentError>;

    // === Settlement ===

    /// Atomically debit the sender, credit the receiver and record the
    /// transfer, under isolation equivalent to serializable.
    ///
    /// # Idempotency
    /// Settlement is conditional on `intent_id` not having already produced a
    /// transfer; a replay returns [`PaymentError::DuplicateIntent`] with no
    /// mutation.
    ///
    /// # Failure modes
    /// `CustomerNotFound`, `InvalidAmount`, `InsufficientBalance`,
    /// `DuplicateIntent`, `TransactionConflict` (retryable), `StorageFailure`.
    /// On any failure neither balance changes and no transfer row exists.
    async fn atomic_transfer(
        &self,
        intent_id: IntentId,
        sender_id: CustomerId,
        receiver_id: CustomerId,
        amount: Decimal,
    ) -> Result<Transfer, PaymentError>;

    // === Queries ===

    async fn find_transfer(&self, id: TransferId)
    -> Result<Option<TransferDetail>, PaymentError>;

    async fn list_transfers(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<TransferDetail>, PaymentError>;
}
