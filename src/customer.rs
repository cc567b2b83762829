//! Payment-method registration
//!
//! A customer can move money only once a payment instrument is on file for
//! both parties. Registration encrypts the card number before it reaches the
//! store and hands back only the masked form; the plaintext is never
//! persisted or echoed.

use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditSink, AuditStream};
use crate::card::CardCipher;
use crate::core_types::CustomerId;
use crate::error::PaymentError;
use crate::ledger::LedgerStore;

pub struct CustomerRegistry {
    store: Arc<dyn LedgerStore>,
    cipher: CardCipher,
    audit: Arc<dyn AuditSink>,
}

impl CustomerRegistry {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cipher: CardCipher,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            cipher,
            audit,
        }
    }

    /// Register a payment instrument for a customer, returning the masked
    /// card number for display.
    pub async fn register_payment_method(
        &self,
        customer_id: CustomerId,
        card_number: &str,
    ) -> Result<String, PaymentError> {
        let encrypted = self.cipher.encrypt(card_number);
        match self.store.set_card_number(customer_id, &encrypted).await {
            Ok(()) => {
                self.audit.publish(
                    AuditStream::Payment,
                    "Payment method registered successfully".to_string(),
                );
                info!(customer_id, "Payment method registered");
                Ok(CardCipher::mask(card_number))
            }
            Err(e) => {
                self.audit.publish(
                    AuditStream::Error,
                    format!("{}: payment method registration failed: {}", e.code(), e),
                );
                warn!(customer_id, error = %e, "Payment method registration failed");
                Err(e)
            }
        }
    }
}
