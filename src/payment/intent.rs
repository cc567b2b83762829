//! Payment intent wire format
//!
//! Intents travel the channel as a delimited string:
//! `"senderID/receiverID/amount/intentID"`. The fourth segment is the
//! idempotency key; a three-segment payload (legacy producers) still parses,
//! minting a fresh key, which keeps the original at-least-once behavior for
//! such messages since replays cannot be correlated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::core_types::{CustomerId, IntentId};
use crate::error::PaymentError;

/// An unsettled payment request published for asynchronous processing.
///
/// Ephemeral: it either produces exactly one transfer or none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub intent_id: IntentId,
    pub sender_id: CustomerId,
    pub receiver_id: CustomerId,
    pub amount: Decimal,
}

impl PaymentIntent {
    pub fn new(sender_id: CustomerId, receiver_id: CustomerId, amount: Decimal) -> Self {
        Self {
            intent_id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            amount,
        }
    }

    /// Encode to the wire payload
    pub fn encode(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.sender_id, self.receiver_id, self.amount, self.intent_id
        )
    }

    /// Parse a wire payload.
    ///
    /// Malformed payloads are a terminal rejection for the message; they must
    /// never be retried into a loop.
    pub fn parse(payload: &str) -> Result<Self, PaymentError> {
        let parts: Vec<&str> = payload.split('/').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(PaymentError::MalformedIntent(format!(
                "expected 3 or 4 segments, got {}",
                parts.len()
            )));
        }

        let sender_id = CustomerId::from_str(parts[0])
            .map_err(|_| PaymentError::MalformedIntent(format!("bad sender id: {}", parts[0])))?;
        let receiver_id = CustomerId::from_str(parts[1]).map_err(|_| {
            PaymentError::MalformedIntent(format!("bad receiver id: {}", parts[1]))
        })?;
        let amount = Decimal::from_str(parts[2])
            .map_err(|_| PaymentError::MalformedIntent(format!("bad amount: {}", parts[2])))?;

        let intent_id = match parts.get(3) {
            Some(raw) => Uuid::parse_str(raw)
                .map_err(|_| PaymentError::MalformedIntent(format!("bad intent id: {}", raw)))?,
            None => Uuid::new_v4(),
        };

        Ok(Self {
            intent_id,
            sender_id,
            receiver_id,
            amount,
        })
    }
}

/// Receipt returned to the submitting caller.
///
/// Submission and settlement are decoupled: the receipt only acknowledges
/// that the intent was accepted and published.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub intent_id: IntentId,
    pub message: String,
    pub accepted_at: DateTime<Utc>,
}
