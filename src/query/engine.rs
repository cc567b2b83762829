//! Transfer Query Engine
//!
//! Read side of the ledger. Per-customer operations are parameterized by the
//! resolved caller identity; admin operations are a privileged path with no
//! caller check. Time windows are expressed as "months ago" integers, never
//! calendar dates.
//!
//! An empty filtered result is the explicit `TransferNotFound` condition,
//! distinguishing "nothing matched" from a successful zero-row call.

use chrono::{DateTime, Months, Utc};
use std::sync::Arc;

use crate::audit::{AuditSink, AuditStream};
use crate::card::CardCipher;
use crate::core_types::{CustomerId, TransferId};
use crate::error::PaymentError;
use crate::ledger::{Direction, LedgerStore, TransferDetail, TransferFilter};

use super::statistics::{DirectionStats, MonthlyStatistics};

/// Reference instant for a months-ago window
fn months_ago(offset: u32) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_months(Months::new(offset))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub struct TransferQueryEngine {
    store: Arc<dyn LedgerStore>,
    cipher: CardCipher,
    audit: Arc<dyn AuditSink>,
}

impl TransferQueryEngine {
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

    // === Per-customer reads ===

    /// Fetch a single transfer on behalf of a customer.
    ///
    /// Only the sender may read a transfer by ID; the receiver gets
    /// `CustomerNotFound`.
    pub async fn get_for_customer(
        &self,
        caller: CustomerId,
        id: TransferId,
    ) -> Result<TransferDetail, PaymentError> {
        let detail = match self.store.find_transfer(id).await? {
            Some(detail) => detail,
            None => return Err(self.not_found()),
        };

        if detail.transfer.sender_id != caller {
            self.audit.publish(
                AuditStream::Error,
                format!(
                    "CUSTOMER_NOT_FOUND: customer {} may not read transfer {}",
                    caller, id
                ),
            );
            return Err(PaymentError::CustomerNotFound);
        }

        self.audit
            .publish(AuditStream::Payment, "Transfer read successfully".to_string());
        Ok(detail)
    }

    /// List a customer's transfers by direction
    pub async fn list_for_customer(
        &self,
        caller: CustomerId,
        direction: Direction,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let list = self
            .store
            .list_transfers(&TransferFilter::for_customer(caller, direction))
            .await?;
        self.non_empty(list)
    }

    /// List a customer's transfers by direction, newer than `month_offset`
    /// months ago
    pub async fn list_for_customer_since(
        &self,
        caller: CustomerId,
        direction: Direction,
        month_offset: u32,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let reference = months_ago(month_offset);
        let list = self
            .store
            .list_transfers(&TransferFilter::for_customer(caller, direction))
            .await?
            .into_iter()
            .filter(|d| d.transfer.created_at > reference)
            .collect();
        self.non_empty(list)
    }

    // === Admin reads (privileged path, no caller-identity check) ===

    pub async fn get_for_admin(&self, id: TransferId) -> Result<TransferDetail, PaymentError> {
        match self.store.find_transfer(id).await? {
            Some(detail) => {
                self.audit
                    .publish(AuditStream::Payment, "Transfer read successfully".to_string());
                Ok(detail)
            }
            None => Err(self.not_found()),
        }
    }

    pub async fn list_for_admin(&self) -> Result<Vec<TransferDetail>, PaymentError> {
        let list = self.store.list_transfers(&TransferFilter::all()).await?;
        self.non_empty(list)
    }

    pub async fn list_for_admin_since(
        &self,
        month_offset: u32,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let reference = months_ago(month_offset);
        let list = self
            .store
            .list_transfers(&TransferFilter::all())
            .await?
            .into_iter()
            .filter(|d| d.transfer.created_at > reference)
            .collect();
        self.non_empty(list)
    }

    pub async fn list_for_admin_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let list = self
            .store
            .list_transfers(&TransferFilter::for_customer(customer_id, Direction::All))
            .await?;
        self.non_empty(list)
    }

    /// Filter by counterparty first name, on either side of the transfer
    pub async fn list_for_admin_by_name(
        &self,
        name: &str,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let list = self
            .store
            .list_transfers(&TransferFilter::all())
            .await?
            .into_iter()
            .filter(|d| d.sender.name == name || d.receiver.name == name)
            .collect();
        self.non_empty(list)
    }

    /// Filter by card number, decrypting each party's stored instrument for
    /// comparison. Rows with no or unreadable instruments never match.
    pub async fn list_for_admin_by_card(
        &self,
        card_number: &str,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let matches_card = |enc: &Option<String>| {
            enc.as_deref()
                .and_then(|enc| self.cipher.decrypt(enc))
                .is_some_and(|plain| plain == card_number)
        };

        let list = self
            .store
            .list_transfers(&TransferFilter::all())
            .await?
            .into_iter()
            .filter(|d| {
                matches_card(&d.sender.card_number_enc) || matches_card(&d.receiver.card_number_enc)
            })
            .collect();
        self.non_empty(list)
    }

    /// Filter to the `[start_months_ago, end_months_ago]` interval:
    /// strictly after `now - start` and strictly before `now - end`
    pub async fn list_for_admin_between(
        &self,
        start_months_ago: u32,
        end_months_ago: u32,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        let start = months_ago(start_months_ago);
        let end = months_ago(end_months_ago);
        let list = self
            .store
            .list_transfers(&TransferFilter::all())
            .await?
            .into_iter()
            .filter(|d| d.transfer.created_at > start && d.transfer.created_at < end)
            .collect();
        self.non_empty(list)
    }

    // === Statistics ===

    /// Monthly statistics for a customer, both directions computed
    /// independently over `timestamp > now - month_offset months`.
    /// Zero-matching directions report all-zero statistics.
    pub async fn monthly_statistics(
        &self,
        customer_id: CustomerId,
        month_offset: u32,
    ) -> Result<MonthlyStatistics, PaymentError> {
        // Existence check first: statistics for an unknown customer is an
        // error, unlike an empty window.
        self.store.get_customer(customer_id).await?;

        let reference = months_ago(month_offset);

        let received: Vec<_> = self
            .store
            .list_transfers(&TransferFilter::for_customer(
                customer_id,
                Direction::Received,
            ))
            .await?
            .into_iter()
            .filter(|d| d.transfer.created_at > reference)
            .map(|d| d.transfer.amount)
            .collect();

        let sent: Vec<_> = self
            .store
            .list_transfers(&TransferFilter::for_customer(customer_id, Direction::Sent))
            .await?
            .into_iter()
            .filter(|d| d.transfer.created_at > reference)
            .map(|d| d.transfer.amount)
            .collect();

        Ok(MonthlyStatistics::from_directions(
            DirectionStats::from_amounts(&received),
            DirectionStats::from_amounts(&sent),
        ))
    }

    // === Helpers ===

    fn non_empty(
        &self,
        list: Vec<TransferDetail>,
    ) -> Result<Vec<TransferDetail>, PaymentError> {
        if list.is_empty() {
            return Err(self.not_found());
        }
        self.audit.publish(
            AuditStream::Payment,
            "Transfers listed successfully".to_string(),
        );
        Ok(list)
    }

    fn not_found(&self) -> PaymentError {
        self.audit.publish(
            AuditStream::Error,
            "TRANSFER_NOT_FOUND: no transfer matched the query".to_string(),
        );
        PaymentError::TransferNotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::CapturingAuditSink;
    use crate::ledger::{MemoryLedgerStore, NewCustomer};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    struct Fixture {
        engine: TransferQueryEngine,
        store: Arc<MemoryLedgerStore>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let cipher = CardCipher::new("0123456789abcdef").unwrap();

        for (name, email, card) in [
            ("Ada", "ada@example.com", "4111111111111111"),
            ("Alan", "alan@example.com", "5500005555555559"),
            ("Grace", "grace@example.com", "340000000000009"),
        ] {
            store
                .create_customer(NewCustomer {
                    name: name.into(),
                    last_name: "Test".into(),
                    email: email.into(),
                    balance: Decimal::from(1000),
                    card_number_enc: Some(cipher.encrypt(card)),
                })
                .await
                .unwrap();
        }

        let engine = TransferQueryEngine::new(
            store.clone(),
            cipher,
            Arc::new(CapturingAuditSink::new()),
        );
        Fixture { engine, store }
    }

    async fn settle(f: &Fixture, sender: i64, receiver: i64, amount: i64) -> i64 {
        f.store
            .atomic_transfer(
                Uuid::new_v4(),
                sender,
                receiver,
                Decimal::from(amount),
            )
            .await
            .unwrap()
            .transfer_id
    }

    #[tokio::test]
    async fn test_get_visibility_asymmetry() {
        let f = fixture().await;
        let id = settle(&f, 1, 2, 100).await;

        // Sender can read.
        let detail = f.engine.get_for_customer(1, id).await.unwrap();
        assert_eq!(detail.transfer.amount, Decimal::from(100));

        // Receiver cannot.
        assert_eq!(
            f.engine.get_for_customer(2, id).await.unwrap_err(),
            PaymentError::CustomerNotFound
        );

        // Admin path has no caller check.
        assert!(f.engine.get_for_admin(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_unknown_transfer() {
        let f = fixture().await;
        assert_eq!(
            f.engine.get_for_customer(1, 999).await.unwrap_err(),
            PaymentError::TransferNotFound
        );
        assert_eq!(
            f.engine.get_for_admin(999).await.unwrap_err(),
            PaymentError::TransferNotFound
        );
    }

    #[tokio::test]
    async fn test_list_directions_and_empty_condition() {
        let f = fixture().await;
        settle(&f, 1, 2, 10).await;
        settle(&f, 2, 1, 20).await;
        settle(&f, 1, 3, 30).await;

        let sent = f.engine.list_for_customer(1, Direction::Sent).await.unwrap();
        assert_eq!(sent.len(), 2);

        let received = f
            .engine
            .list_for_customer(1, Direction::Received)
            .await
            .unwrap();
        assert_eq!(received.len(), 1);

        let all = f.engine.list_for_customer(1, Direction::All).await.unwrap();
        assert_eq!(all.len(), 3);

        // Customer 3 never sent anything: explicit condition, not empty-ok.
        assert_eq!(
            f.engine
                .list_for_customer(3, Direction::Sent)
                .await
                .unwrap_err(),
            PaymentError::TransferNotFound
        );
    }

    #[tokio::test]
    async fn test_month_window_filters() {
        let f = fixture().await;
        let recent = settle(&f, 1, 2, 100).await;
        let old = settle(&f, 1, 2, 50).await;
        f.store
            .backdate_transfer(old, Utc::now() - Duration::days(95));

        let windowed = f
            .engine
            .list_for_customer_since(1, Direction::Sent, 2)
            .await
            .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].transfer.transfer_id, recent);

        // A wide-enough window sees both.
        let wide = f
            .engine
            .list_for_customer_since(1, Direction::Sent, 12)
            .await
            .unwrap();
        assert_eq!(wide.len(), 2);
    }

    #[tokio::test]
    async fn test_admin_filters() {
        let f = fixture().await;
        settle(&f, 1, 2, 10).await;
        settle(&f, 2, 3, 20).await;

        let by_customer = f.engine.list_for_admin_by_customer(1).await.unwrap();
        assert_eq!(by_customer.len(), 1);

        let by_name = f.engine.list_for_admin_by_name("Grace").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].transfer.amount, Decimal::from(20));

        assert_eq!(
            f.engine
                .list_for_admin_by_name("Nobody")
                .await
                .unwrap_err(),
            PaymentError::TransferNotFound
        );
    }

    #[tokio::test]
    async fn test_admin_card_filter_decrypts() {
        let f = fixture().await;
        settle(&f, 1, 2, 10).await;
        settle(&f, 2, 3, 20).await;

        // Ada's card appears only on the first transfer (as sender).
        let hits = f
            .engine
            .list_for_admin_by_card("4111111111111111")
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sender.name, "Ada");

        // Alan is on both sides across the two transfers.
        let hits = f
            .engine
            .list_for_admin_by_card("5500005555555559")
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        assert_eq!(
            f.engine
                .list_for_admin_by_card("0000000000000000")
                .await
                .unwrap_err(),
            PaymentError::TransferNotFound
        );
    }

    #[tokio::test]
    async fn test_admin_interval_filter() {
        let f = fixture().await;
        let mid = settle(&f, 1, 2, 10).await;
        f.store
            .backdate_transfer(mid, Utc::now() - Duration::days(75));
        let fresh = settle(&f, 1, 2, 20).await;

        // Between 4 months ago and 1 month ago: only the backdated row.
        let hits = f.engine.list_for_admin_between(4, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].transfer.transfer_id, mid);

        // Between 1 month ago and now-ish (end offset 0 excludes nothing
        // recent enough): the fresh row only.
        let hits = f.engine.list_for_admin_between(1, 0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].transfer.transfer_id, fresh);
    }

    #[tokio::test]
    async fn test_monthly_statistics_example() {
        // Sent transfers of 100 (1 month ago) and 50 (3 months ago),
        // window of 2 months: only the recent one counts.
        let f = fixture().await;
        let recent = settle(&f, 1, 2, 100).await;
        f.store
            .backdate_transfer(recent, Utc::now() - Duration::days(30));
        let old = settle(&f, 1, 2, 50).await;
        f.store
            .backdate_transfer(old, Utc::now() - Duration::days(90));

        let stats = f.engine.monthly_statistics(1, 2).await.unwrap();
        assert_eq!(stats.sent_count, 1);
        assert_eq!(stats.monthly_sent_amount, Decimal::from(100));
        assert_eq!(stats.highest_amount_sent, Decimal::from(100));
        assert_eq!(stats.lowest_amount_sent, Decimal::from(100));
        assert_eq!(
            stats.average_amount_sent,
            Decimal::from_str("100.00").unwrap()
        );

        // Nothing received in the window: all-zero, not an error.
        assert_eq!(stats.received_count, 0);
        assert_eq!(stats.monthly_received_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_monthly_statistics_unknown_customer() {
        let f = fixture().await;
        assert_eq!(
            f.engine.monthly_statistics(999, 2).await.unwrap_err(),
            PaymentError::CustomerNotFound
        );
    }
}
