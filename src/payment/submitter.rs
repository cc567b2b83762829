//! Transfer Intent Submitter
//!
//! Synchronous side of the pipeline: validates a payment intent against the
//! caller's identity and the recipient, then publishes it to the intent
//! channel and returns immediately. Settlement happens later, on the
//! consumer side; the caller only ever sees the receipt.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditSink, AuditStream};
use crate::error::PaymentError;
use crate::identity::IdentityResolver;
use crate::ledger::LedgerStore;

use super::channel::IntentPublisher;
use super::intent::{PaymentIntent, SubmissionReceipt};

pub struct IntentSubmitter {
    identity: Arc<dyn IdentityResolver>,
    store: Arc<dyn LedgerStore>,
    publisher: IntentPublisher,
    audit: Arc<dyn AuditSink>,
}

impl IntentSubmitter {
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        store: Arc<dyn LedgerStore>,
        publisher: IntentPublisher,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            identity,
            store,
            publisher,
            audit,
        }
    }

    /// Submit a payment intent.
    ///
    /// Validation here is a fast-fail layer; the processor re-validates
    /// everything against current state before settling.
    pub async fn submit(
        &self,
        token: &str,
        receiver_email: &str,
        amount: Decimal,
    ) -> Result<SubmissionReceipt, PaymentError> {
        let result = self.submit_inner(token, receiver_email, amount).await;

        match &result {
            Ok(receipt) => {
                self.audit.publish(
                    AuditStream::Payment,
                    "Payment request received successfully!".to_string(),
                );
                info!(intent_id = %receipt.intent_id, "Payment intent published");
            }
            Err(e) => {
                self.audit.publish(
                    AuditStream::Error,
                    format!("{}: payment submission failed: {}", e.code(), e),
                );
                warn!(error = %e, "Payment submission rejected");
            }
        }

        result
    }

    async fn submit_inner(
        &self,
        token: &str,
        receiver_email: &str,
        amount: Decimal,
    ) -> Result<SubmissionReceipt, PaymentError> {
        let principal = self.identity.resolve(token).await?;
        let sender = self.store.get_customer(principal.customer_id).await?;

        let receiver = self
            .store
            .find_customer_by_email(receiver_email)
            .await?
            .ok_or_else(|| PaymentError::RecipientNotFound(receiver_email.to_string()))?;

        if !sender.has_payment_method() || !receiver.has_payment_method() {
            return Err(PaymentError::PaymentNotConfigured);
        }

        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }

        let intent = PaymentIntent::new(sender.customer_id, receiver.customer_id, amount);
        self.publisher
            .publish(intent.encode())
            .await
            .map_err(PaymentError::StorageFailure)?;

        Ok(SubmissionReceipt {
            intent_id: intent.intent_id,
            message: "Payment request received successfully!".to_string(),
            accepted_at: Utc::now(),
        })
    }
}
