//! PostgreSQL ledger store
//!
//! Settlement runs inside a `SERIALIZABLE` transaction: balances are re-read
//! inside the transaction scope, both mutations and the transfer insert
//! commit together or not at all, and serialization failures (SQLSTATE 40001)
//! surface as [`PaymentError::TransactionConflict`] for the processor's
//! bounded retry loop.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

use crate::core_types::{CustomerId, IntentId, TransferId};
use crate::error::PaymentError;

use super::models::{Customer, Direction, NewCustomer, Transfer, TransferDetail, TransferFilter};
use super::store::LedgerStore;

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool and wrap it as a store
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// The underlying pool, for schema initialization at startup
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    const DETAIL_COLUMNS: &'static str = r#"
        t.transfer_id, t.intent_id, t.sender_id, t.receiver_id, t.amount, t.created_at,
        s.customer_id   AS s_customer_id,
        s.name          AS s_name,
        s.last_name     AS s_last_name,
        s.email         AS s_email,
        s.balance       AS s_balance,
        s.card_number_enc AS s_card_number_enc,
        s.created_at    AS s_created_at,
        r.customer_id   AS r_customer_id,
        r.name          AS r_name,
        r.last_name     AS r_last_name,
        r.email         AS r_email,
        r.balance       AS r_balance,
        r.card_number_enc AS r_card_number_enc,
        r.created_at    AS r_created_at
    "#;

    const DETAIL_JOINS: &'static str = r#"
        FROM transfers_tb t
        JOIN customers_tb s ON s.customer_id = t.sender_id
        JOIN customers_tb r ON r.customer_id = t.receiver_id
    "#;

    fn row_to_detail(row: &PgRow) -> TransferDetail {
        TransferDetail {
            transfer: Transfer {
                transfer_id: row.get("transfer_id"),
                intent_id: row.get("intent_id"),
                sender_id: row.get("sender_id"),
                receiver_id: row.get("receiver_id"),
                amount: row.get("amount"),
                created_at: row.get("created_at"),
            },
            sender: Customer {
                customer_id: row.get("s_customer_id"),
                name: row.get("s_name"),
                last_name: row.get("s_last_name"),
                email: row.get("s_email"),
                balance: row.get("s_balance"),
                card_number_enc: row.get("s_card_number_enc"),
                created_at: row.get("s_created_at"),
            },
            receiver: Customer {
                customer_id: row.get("r_customer_id"),
                name: row.get("r_name"),
                last_name: row.get("r_last_name"),
                email: row.get("r_email"),
                balance: row.get("r_balance"),
                card_number_enc: row.get("r_card_number_enc"),
                created_at: row.get("r_created_at"),
            },
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_customer(&self, new: NewCustomer) -> Result<Customer, PaymentError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers_tb (name, last_name, email, balance, card_number_enc)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING customer_id, name, last_name, email, balance, card_number_enc, created_at
            "#,
        )
        .bind(&new.name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(new.balance)
        .bind(&new.card_number_enc)
        .fetch_one(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PaymentError> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, last_name, email, balance, card_number_enc, created_at
            FROM customers_tb
            WHERE customer_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PaymentError::CustomerNotFound)
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, PaymentError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, last_name, email, balance, card_number_enc, created_at
            FROM customers_tb
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, PaymentError> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, last_name, email, balance, card_number_enc, created_at
            FROM customers_tb
            ORDER BY customer_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    async fn set_card_number(
        &self,
        id: CustomerId,
        card_number_enc: &str,
    ) -> Result<(), PaymentError> {
        let result = sqlx::query(
            "UPDATE customers_tb SET card_number_enc = $1 WHERE customer_id = $2",
        )
        .bind(card_number_enc)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PaymentError::CustomerNotFound);
        }
        Ok(())
    }

    async fn get_balance(&self, id: CustomerId) -> Result<Decimal, PaymentError> {
        sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM customers_tb WHERE customer_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PaymentError::CustomerNotFound)
    }

    async fn atomic_transfer(
        &self,
        intent_id: IntentId,
        sender_id: CustomerId,
        receiver_id: CustomerId,
        amount: Decimal,
    ) -> Result<Transfer, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // Idempotency barrier: an intent settles at most once.
        let already_settled = sqlx::query_scalar::<_, TransferId>(
            "SELECT transfer_id FROM transfers_tb WHERE intent_id = $1",
        )
        .bind(intent_id)
        .fetch_optional(&mut *tx)
        .await?;
        if already_settled.is_some() {
            return Err(PaymentError::DuplicateIntent(intent_id.to_string()));
        }

        // Re-read balances inside the transaction scope; reads taken before
        // BEGIN would be stale under concurrent settlement.
        let sender_balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM customers_tb WHERE customer_id = $1",
        )
        .bind(sender_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(PaymentError::CustomerNotFound)?;

        let receiver_exists = sqlx::query_scalar::<_, CustomerId>(
            "SELECT customer_id FROM customers_tb WHERE customer_id = $1",
        )
        .bind(receiver_id)
        .fetch_optional(&mut *tx)
        .await?;
        if receiver_exists.is_none() {
            return Err(PaymentError::CustomerNotFound);
        }

        // Strict check: the sender balance must exceed the amount.
        // Dropping the transaction on the error path rolls everything back.
        if sender_balance <= amount {
            return Err(PaymentError::InsufficientBalance);
        }

        sqlx::query("UPDATE customers_tb SET balance = balance - $1 WHERE customer_id = $2")
            .bind(amount)
            .bind(sender_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE customers_tb SET balance = balance + $1 WHERE customer_id = $2")
            .bind(amount)
            .bind(receiver_id)
            .execute(&mut *tx)
            .await?;

        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers_tb (intent_id, sender_id, receiver_id, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING transfer_id, intent_id, sender_id, receiver_id, amount, created_at
            "#,
        )
        .bind(intent_id)
        .bind(sender_id)
        .bind(receiver_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(transfer)
    }

    async fn find_transfer(
        &self,
        id: TransferId,
    ) -> Result<Option<TransferDetail>, PaymentError> {
        let sql = format!(
            "SELECT {} {} WHERE t.transfer_id = $1",
            Self::DETAIL_COLUMNS,
            Self::DETAIL_JOINS
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(Self::row_to_detail))
    }

    async fn list_transfers(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let rows = match (filter.customer_id, filter.direction) {
            (None, _) => {
                let sql = format!(
                    "SELECT {} {} ORDER BY t.transfer_id",
                    Self::DETAIL_COLUMNS,
                    Self::DETAIL_JOINS
                );
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
            (Some(id), Direction::Sent) => {
                let sql = format!(
                    "SELECT {} {} WHERE t.sender_id = $1 ORDER BY t.transfer_id",
                    Self::DETAIL_COLUMNS,
                    Self::DETAIL_JOINS
                );
                sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?
            }
            (Some(id), Direction::Received) => {
                let sql = format!(
                    "SELECT {} {} WHERE t.receiver_id = $1 ORDER BY t.transfer_id",
                    Self::DETAIL_COLUMNS,
                    Self::DETAIL_JOINS
                );
                sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?
            }
            (Some(id), Direction::All) => {
                let sql = format!(
                    "SELECT {} {} WHERE t.sender_id = $1 OR t.receiver_id = $1 ORDER BY t.transfer_id",
                    Self::DETAIL_COLUMNS,
                    Self::DETAIL_JOINS
                );
                sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?
            }
        };

        Ok(rows.iter().map(Self::row_to_detail).collect())
    }
}
