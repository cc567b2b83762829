//! Identity Resolver
//!
//! Maps an opaque bearer credential to a customer identity. The core never
//! depends on a framework principal type: resolution produces an
//! [`AuthPrincipal`] capability, separate from the [`crate::ledger::Customer`]
//! entity.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core_types::CustomerId;
use crate::error::PaymentError;
use crate::ledger::LedgerStore;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (customer email)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

/// Resolved caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPrincipal {
    pub customer_id: CustomerId,
    pub email: String,
}

/// Caller-credential resolution contract
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a bearer token to a customer identity.
    ///
    /// Fails with [`PaymentError::IdentityError`] for any unresolvable
    /// credential - expired, malformed, or referencing no known customer.
    async fn resolve(&self, bearer_token: &str) -> Result<AuthPrincipal, PaymentError>;
}

/// JWT-backed resolver (HS256, email-keyed subject)
///
/// Token issuance lives outside this service; this side only verifies the
/// signature and maps the subject email to a ledger customer.
pub struct JwtIdentityResolver {
    secret: String,
    store: Arc<dyn LedgerStore>,
}

impl JwtIdentityResolver {
    pub fn new(secret: String, store: Arc<dyn LedgerStore>) -> Self {
        Self { secret, store }
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, bearer_token: &str) -> Result<AuthPrincipal, PaymentError> {
        let token = bearer_token
            .strip_prefix("Bearer ")
            .unwrap_or(bearer_token);

        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|_| PaymentError::IdentityError)?;

        let customer = self
            .store
            .find_customer_by_email(&token_data.claims.sub)
            .await?
            .ok_or(PaymentError::IdentityError)?;

        Ok(AuthPrincipal {
            customer_id: customer.customer_id,
            email: customer.email,
        })
    }
}

/// Table-backed resolver for tests and local tooling
#[derive(Default)]
pub struct StaticIdentityResolver {
    principals: HashMap<String, AuthPrincipal>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, principal: AuthPrincipal) -> Self {
        self.principals.insert(token.to_string(), principal);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, bearer_token: &str) -> Result<AuthPrincipal, PaymentError> {
        let token = bearer_token
            .strip_prefix("Bearer ")
            .unwrap_or(bearer_token);
        self.principals
            .get(token)
            .cloned()
            .ok_or(PaymentError::IdentityError)
    }
}
