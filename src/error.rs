//! Payment Error Types
//!
//! Single error taxonomy for the submission, settlement and query surfaces.
//! Validation errors surface synchronously at submission time; errors raised
//! during async settlement are only observable through audit events.

use thiserror::Error;

/// Payment error taxonomy
///
/// Error codes are stable strings intended for API responses and audit events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    // === Submission-time validation ===
    #[error("Caller credential could not be resolved")]
    IdentityError,

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Payment instrument not configured for one of the parties")]
    PaymentNotConfigured,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    // === Settlement ===
    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Intent already settled: {0}")]
    DuplicateIntent(String),

    #[error("Malformed intent payload: {0}")]
    MalformedIntent(String),

    // === Query ===
    #[error("No transfers found")]
    TransferNotFound,

    // === Store / system ===
    #[error("Transaction serialization conflict")]
    TransactionConflict,

    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl PaymentError {
    /// Get the stable error code for API responses and audit events
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::IdentityError => "IDENTITY_ERROR",
            PaymentError::RecipientNotFound(_) => "RECIPIENT_NOT_FOUND",
            PaymentError::PaymentNotConfigured => "PAYMENT_NOT_CONFIGURED",
            PaymentError::InvalidAmount => "INVALID_AMOUNT",
            PaymentError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            PaymentError::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            PaymentError::DuplicateIntent(_) => "DUPLICATE_INTENT",
            PaymentError::MalformedIntent(_) => "MALFORMED_INTENT",
            PaymentError::TransferNotFound => "TRANSFER_NOT_FOUND",
            PaymentError::TransactionConflict => "TRANSACTION_CONFLICT",
            PaymentError::StorageFailure(_) => "STORAGE_FAILURE",
        }
    }

    /// Get HTTP status code suggestion for the (out-of-scope) HTTP layer
    pub fn http_status(&self) -> u16 {
        match self {
            PaymentError::IdentityError => 401,
            PaymentError::InvalidAmount | PaymentError::MalformedIntent(_) => 400,
            PaymentError::RecipientNotFound(_)
            | PaymentError::CustomerNotFound
            | PaymentError::TransferNotFound => 404,
            PaymentError::PaymentNotConfigured
            | PaymentError::InsufficientBalance
            | PaymentError::DuplicateIntent(_) => 422,
            PaymentError::TransactionConflict | PaymentError::StorageFailure(_) => 500,
        }
    }

    /// Whether a store-level failure is worth retrying in-process.
    ///
    /// Only serialization conflicts qualify; everything else is either a
    /// terminal rejection or fatal for the current attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::TransactionConflict)
    }
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        // SQLSTATE 40001: serialization_failure under SERIALIZABLE isolation.
        if let sqlx::Error::Database(db) = &e
            && db.code().as_deref() == Some("40001")
        {
            return PaymentError::TransactionConflict;
        }
        PaymentError::StorageFailure(e.to_string())
    }
}
