//! Data models for the ledger store

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core_types::{CustomerId, IntentId, TransferId};

/// Customer account
///
/// The balance is mutated only through [`crate::ledger::LedgerStore::atomic_transfer`];
/// it is non-negative by invariant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub balance: Decimal,
    /// AES-encrypted card number; None until a payment method is registered
    pub card_number_enc: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn has_payment_method(&self) -> bool {
        self.card_number_enc.is_some()
    }
}

/// New customer row (id and timestamp assigned by the store)
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub last_name: String,
    pub email: String,
    /// Opening balance (external deposit)
    pub balance: Decimal,
    pub card_number_enc: Option<String>,
}

/// Settled transfer record. Append-only; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub transfer_id: TransferId,
    /// Idempotency key of the intent that produced this transfer
    pub intent_id: IntentId,
    pub sender_id: CustomerId,
    pub receiver_id: CustomerId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Transfer row joined with snapshots of both parties, for the query surface
#[derive(Debug, Clone, Serialize)]
pub struct TransferDetail {
    pub transfer: Transfer,
    pub sender: Customer,
    pub receiver: Customer,
}

/// Which side of a transfer a customer is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    All,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
            Direction::All => "all",
        }
    }
}

/// Store-level transfer listing filter.
///
/// Time-window, counterparty-name and card filters are applied by the query
/// engine on top of the listed rows.
#[derive(Debug, Clone)]
pub struct TransferFilter {
    pub customer_id: Option<CustomerId>,
    pub direction: Direction,
}

impl TransferFilter {
    /// All transfers in the ledger (admin listing)
    pub fn all() -> Self {
        Self {
            customer_id: None,
            direction: Direction::All,
        }
    }

    /// Transfers where the customer is sender, receiver or either
    pub fn for_customer(customer_id: CustomerId, direction: Direction) -> Self {
        Self {
            customer_id: Some(customer_id),
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_payment_method() {
        let mut customer = Customer {
            customer_id: 1,
            name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            balance: Decimal::ZERO,
            card_number_enc: None,
            created_at: Utc::now(),
        };
        assert!(!customer.has_payment_method());

        customer.card_number_enc = Some("AAAA".into());
        assert!(customer.has_payment_method());
    }

    #[test]
    fn test_direction_as_str() {
        assert_eq!(Direction::Sent.as_str(), "sent");
        assert_eq!(Direction::Received.as_str(), "received");
        assert_eq!(Direction::All.as_str(), "all");
    }
}
