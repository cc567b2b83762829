//! In-memory ledger store
//!
//! Single-mutex store used by tests and persistence-free local runs. Holding
//! one mutex across the whole settlement makes every mutation trivially
//! serial, so the serializable-isolation contract of
//! [`LedgerStore::atomic_transfer`] holds by construction.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::core_types::{CustomerId, IntentId, TransferId};
use crate::error::PaymentError;

use super::models::{Customer, Direction, NewCustomer, Transfer, TransferDetail, TransferFilter};
use super::store::LedgerStore;

#[derive(Default)]
struct Inner {
    customers: HashMap<CustomerId, Customer>,
    transfers: Vec<Transfer>,
    /// Intent IDs that already produced a transfer (idempotency barrier)
    settled_intents: HashSet<IntentId>,
    next_customer_id: CustomerId,
    next_transfer_id: TransferId,
}

pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_customer_id: 1,
                next_transfer_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Sum of all customer balances, for conservation checks
    pub fn total_balance(&self) -> Decimal {
        let inner = self.inner.lock().unwrap();
        inner.customers.values().map(|c| c.balance).sum()
    }

    /// Rewrite a transfer's timestamp. Test scaffolding for exercising
    /// month-window queries against aged ledgers.
    #[cfg(test)]
    pub(crate) fn backdate_transfer(&self, id: TransferId, created_at: chrono::DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(t) = inner.transfers.iter_mut().find(|t| t.transfer_id == id) {
            t.created_at = created_at;
        }
    }

    fn detail(inner: &Inner, transfer: &Transfer) -> Result<TransferDetail, PaymentError> {
        let sender = inner
            .customers
            .get(&transfer.sender_id)
            .cloned()
            .ok_or(PaymentError::CustomerNotFound)?;
        let receiver = inner
            .customers
            .get(&transfer.receiver_id)
            .cloned()
            .ok_or(PaymentError::CustomerNotFound)?;
        Ok(TransferDetail {
            transfer: transfer.clone(),
            sender,
            receiver,
        })
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_customer(&self, new: NewCustomer) -> Result<Customer, PaymentError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.customers.values().any(|c| c.email == new.email) {
            return Err(PaymentError::StorageFailure(format!(
                "email already registered: {}",
                new.email
            )));
        }
        let customer_id = inner.next_customer_id;
        inner.next_customer_id += 1;

        let customer = Customer {
            customer_id,
            name: new.name,
            last_name: new.last_name,
            email: new.email,
            balance: new.balance,
            card_number_enc: new.card_number_enc,
            created_at: Utc::now(),
        };
        inner.customers.insert(customer_id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PaymentError> {
        let inner = self.inner.lock().unwrap();
        inner
            .customers
            .get(&id)
            .cloned()
            .ok_or(PaymentError::CustomerNotFound)
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.customers.values().find(|c| c.email == email).cloned())
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        let mut customers: Vec<_> = inner.customers.values().cloned().collect();
        customers.sort_by_key(|c| c.customer_id);
        Ok(customers)
    }

    async fn set_card_number(
        &self,
        id: CustomerId,
        card_number_enc: &str,
    ) -> Result<(), PaymentError> {
        let mut inner = self.inner.lock().unwrap();
        let customer = inner
            .customers
            .get_mut(&id)
            .ok_or(PaymentError::CustomerNotFound)?;
        customer.card_number_enc = Some(card_number_enc.to_string());
        Ok(())
    }

    async fn get_balance(&self, id: CustomerId) -> Result<Decimal, PaymentError> {
        let inner = self.inner.lock().unwrap();
        inner
            .customers
            .get(&id)
            .map(|c| c.balance)
            .ok_or(PaymentError::CustomerNotFound)
    }

    async fn atomic_transfer(
        &self,
        intent_id: IntentId,
        sender_id: CustomerId,
        receiver_id: CustomerId,
        amount: Decimal,
    ) -> Result<Transfer, PaymentError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.settled_intents.contains(&intent_id) {
            return Err(PaymentError::DuplicateIntent(intent_id.to_string()));
        }
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        if !inner.customers.contains_key(&receiver_id) {
            return Err(PaymentError::CustomerNotFound);
        }
        let sender_balance = inner
            .customers
            .get(&sender_id)
            .map(|c| c.balance)
            .ok_or(PaymentError::CustomerNotFound)?;

        // Strict check: settling must leave the sender strictly above zero.
        if sender_balance <= amount {
            return Err(PaymentError::InsufficientBalance);
        }

        // All checks passed - mutate both balances and append the record
        // while still holding the lock. No partial state is observable.
        inner.customers.get_mut(&sender_id).unwrap().balance -= amount;
        inner.customers.get_mut(&receiver_id).unwrap().balance += amount;

        let transfer_id = inner.next_transfer_id;
        inner.next_transfer_id += 1;

        let transfer = Transfer {
            transfer_id,
            intent_id,
            sender_id,
            receiver_id,
            amount,
            created_at: Utc::now(),
        };
        inner.transfers.push(transfer.clone());
        inner.settled_intents.insert(intent_id);

        Ok(transfer)
    }

    async fn find_transfer(
        &self,
        id: TransferId,
    ) -> Result<Option<TransferDetail>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        match inner.transfers.iter().find(|t| t.transfer_id == id) {
            Some(transfer) => Ok(Some(Self::detail(&inner, transfer)?)),
            None => Ok(None),
        }
    }

    async fn list_transfers(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        let mut result = Vec::new();
        for transfer in &inner.transfers {
            let matches = match (filter.customer_id, filter.direction) {
                (None, _) => true,
                (Some(id), Direction::Sent) => transfer.sender_id == id,
                (Some(id), Direction::Received) => transfer.receiver_id == id,
                (Some(id), Direction::All) => {
                    transfer.sender_id == id || transfer.receiver_id == id
                }
            };
            if matches {
                result.push(Self::detail(&inner, transfer)?);
            }
        }
        Ok(result)
    }
}
