//! PostgreSQL schema for the ledger

use sqlx::PgPool;

pub const CREATE_CUSTOMERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS customers_tb (
    customer_id     BIGSERIAL PRIMARY KEY,
    name            TEXT NOT NULL,
    last_name       TEXT NOT NULL,
    email           TEXT NOT NULL UNIQUE,
    balance         NUMERIC(20, 6) NOT NULL DEFAULT 0 CHECK (balance >= 0),
    card_number_enc TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers_tb (
    transfer_id BIGSERIAL PRIMARY KEY,
    intent_id   UUID NOT NULL UNIQUE,
    sender_id   BIGINT NOT NULL REFERENCES customers_tb(customer_id),
    receiver_id BIGINT NOT NULL REFERENCES customers_tb(customer_id),
    amount      NUMERIC(20, 6) NOT NULL CHECK (amount > 0),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSFERS_SENDER_IDX: &str =
    "CREATE INDEX IF NOT EXISTS transfers_sender_idx ON transfers_tb (sender_id, created_at)";

pub const CREATE_TRANSFERS_RECEIVER_IDX: &str =
    "CREATE INDEX IF NOT EXISTS transfers_receiver_idx ON transfers_tb (receiver_id, created_at)";

/// Initialize the ledger schema (idempotent)
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing ledger schema...");

    sqlx::query(CREATE_CUSTOMERS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_TRANSFERS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_TRANSFERS_SENDER_IDX).execute(pool).await?;
    sqlx::query(CREATE_TRANSFERS_RECEIVER_IDX)
        .execute(pool)
        .await?;

    tracing::info!("Ledger schema initialized");
    Ok(())
}
