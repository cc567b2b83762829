//! Transfer Processor
//!
//! Consumer side of the pipeline. Each delivered payload runs the intent
//! state machine:
//!
//! ```text
//! RECEIVED → VALIDATED → SETTLED      (terminal success)
//! RECEIVED → REJECTED                 (terminal failure, no mutation)
//! ```
//!
//! The channel delivers at-least-once, so the processor must tolerate
//! redelivery: settlement is keyed by the intent ID and a replay of an
//! already-settled intent acks without touching any balance. Serialization
//! conflicts are retried transparently with a bounded attempt count; beyond
//! that the attempt is transient and redelivery takes over.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditSink, AuditStream};
use crate::config::ProcessorConfig;
use crate::error::PaymentError;
use crate::ledger::{LedgerStore, Transfer};

use super::channel::{IntentPublisher, IntentReceiver};
use super::intent::PaymentIntent;

/// Terminal disposition of one delivered payload
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Settled: both balances mutated, transfer recorded
    Settled(Transfer),
    /// Rejected: invalid or unsatisfiable intent, nothing mutated, not retried
    Rejected(PaymentError),
    /// Idempotent replay of an already-settled intent
    Duplicate,
}

pub struct TransferProcessor {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
    config: ProcessorConfig,
}

impl TransferProcessor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        audit: Arc<dyn AuditSink>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    /// Process one delivered payload.
    ///
    /// `Ok` dispositions are terminal for the message. `Err` means the
    /// attempt failed transiently and the payload should be redelivered.
    pub async fn process_payload(&self, payload: &str) -> Result<ProcessOutcome, PaymentError> {
        // 1. Parse. A malformed message is dropped, never retried into a loop.
        let intent = match PaymentIntent::parse(payload) {
            Ok(intent) => intent,
            Err(e) => {
                self.audit.publish(
                    AuditStream::Error,
                    format!("{}: dropping malformed intent: {}", e.code(), e),
                );
                warn!(payload = %payload, error = %e, "Dropping malformed intent payload");
                return Ok(ProcessOutcome::Rejected(e));
            }
        };

        // 2. Re-validate independently of the submitter's checks.
        if intent.amount <= rust_decimal::Decimal::ZERO {
            return Ok(self.reject(&intent, PaymentError::InvalidAmount));
        }

        // 3-5. Settle under serializable isolation, retrying conflicts.
        let mut attempt = 0;
        loop {
            match self
                .store
                .atomic_transfer(
                    intent.intent_id,
                    intent.sender_id,
                    intent.receiver_id,
                    intent.amount,
                )
                .await
            {
                Ok(transfer) => {
                    self.audit.publish(
                        AuditStream::Payment,
                        "Payment processed successfully!".to_string(),
                    );
                    info!(
                        intent_id = %intent.intent_id,
                        transfer_id = transfer.transfer_id,
                        sender_id = intent.sender_id,
                        receiver_id = intent.receiver_id,
                        amount = %intent.amount,
                        "Transfer settled"
                    );
                    return Ok(ProcessOutcome::Settled(transfer));
                }
                Err(PaymentError::DuplicateIntent(_)) => {
                    debug!(intent_id = %intent.intent_id, "Intent already settled (redelivery)");
                    return Ok(ProcessOutcome::Duplicate);
                }
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    if attempt > self.config.max_conflict_retries {
                        // Bounded retries exhausted: transient for this
                        // delivery, redelivery will try again.
                        warn!(
                            intent_id = %intent.intent_id,
                            attempts = attempt,
                            "Serialization conflict retries exhausted"
                        );
                        return Err(PaymentError::StorageFailure(
                            "serialization conflict retries exhausted".to_string(),
                        ));
                    }
                    debug!(
                        intent_id = %intent.intent_id,
                        attempt = attempt,
                        "Serialization conflict, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.conflict_backoff_ms))
                        .await;
                }
                Err(
                    e @ (PaymentError::InsufficientBalance
                    | PaymentError::CustomerNotFound
                    | PaymentError::InvalidAmount),
                ) => {
                    // 6. Unsatisfiable against current state: terminal
                    // rejection, transaction already rolled back.
                    return Ok(self.reject(&intent, e));
                }
                Err(e) => {
                    // 7. Unexpected store failure: transient, surfaced for
                    // redelivery.
                    self.audit.publish(
                        AuditStream::Error,
                        format!("{}: settlement attempt failed: {}", e.code(), e),
                    );
                    error!(intent_id = %intent.intent_id, error = %e, "Settlement attempt failed");
                    return Err(e);
                }
            }
        }
    }

    fn reject(&self, intent: &PaymentIntent, e: PaymentError) -> ProcessOutcome {
        self.audit.publish(
            AuditStream::Error,
            format!("PaymentFailed: {}: {}", e.code(), e),
        );
        warn!(
            intent_id = %intent.intent_id,
            sender_id = intent.sender_id,
            receiver_id = intent.receiver_id,
            amount = %intent.amount,
            error = %e,
            "Payment rejected"
        );
        ProcessOutcome::Rejected(e)
    }
}

/// Consumer worker: pulls payloads from the channel until it closes.
///
/// Transiently-failed payloads are re-published after a backoff, standing in
/// for broker redelivery. Several workers may run concurrently; the ledger
/// store's isolation discipline is the only correctness barrier between them.
pub struct ProcessorWorker {
    processor: Arc<TransferProcessor>,
    redelivery: IntentPublisher,
    worker_id: usize,
}

impl ProcessorWorker {
    pub fn new(
        processor: Arc<TransferProcessor>,
        redelivery: IntentPublisher,
        worker_id: usize,
    ) -> Self {
        Self {
            processor,
            redelivery,
            worker_id,
        }
    }

    pub async fn run(self, receiver: IntentReceiver) {
        info!(worker_id = self.worker_id, "Transfer processor worker started");

        while let Some(payload) = receiver.recv().await {
            match self.processor.process_payload(&payload).await {
                Ok(outcome) => {
                    debug!(worker_id = self.worker_id, ?outcome, "Payload processed");
                }
                Err(e) => {
                    warn!(
                        worker_id = self.worker_id,
                        error = %e,
                        "Transient processing failure, re-publishing payload"
                    );
                    tokio::time::sleep(Duration::from_millis(
                        self.processor.config.redelivery_backoff_ms,
                    ))
                    .await;
                    // Never suspend on the re-publish: with the queue full
                    // and every worker blocked here, nobody drains it again.
                    if let Err(reason) = self.redelivery.try_publish(payload) {
                        error!(
                            worker_id = self.worker_id,
                            reason = %reason,
                            "Redelivery failed, dropping payload"
                        );
                    }
                }
            }
        }

        info!(worker_id = self.worker_id, "Transfer processor worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::CapturingAuditSink;
    use crate::core_types::{CustomerId, IntentId, TransferId};
    use crate::ledger::{
        Customer, MemoryLedgerStore, NewCustomer, TransferDetail, TransferFilter,
    };
    use crate::payment::channel::intent_channel;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose `atomic_transfer` fails with a scripted sequence of errors
    /// before delegating to the real in-memory store. With `repeat_last` the
    /// final scripted error repeats forever.
    struct ScriptedStore {
        inner: MemoryLedgerStore,
        script: Mutex<VecDeque<PaymentError>>,
        repeat_last: bool,
        attempts: AtomicUsize,
    }

    impl ScriptedStore {
        fn new(inner: MemoryLedgerStore, script: Vec<PaymentError>, repeat_last: bool) -> Self {
            Self {
                inner,
                script: Mutex::new(script.into()),
                repeat_last,
                attempts: AtomicUsize::new(0),
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LedgerStore for ScriptedStore {
        async fn create_customer(&self, new: NewCustomer) -> Result<Customer, PaymentError> {
            self.inner.create_customer(new).await
        }

        async fn get_customer(&self, id: CustomerId) -> Result<Customer, PaymentError> {
            self.inner.get_customer(id).await
        }

        async fn find_customer_by_email(
            &self,
            email: &str,
        ) -> Result<Option<Customer>, PaymentError> {
            self.inner.find_customer_by_email(email).await
        }

        async fn list_customers(&self) -> Result<Vec<Customer>, PaymentError> {
            self.inner.list_customers().await
        }

        async fn set_card_number(
            &self,
            id: CustomerId,
            card_number_enc: &str,
        ) -> Result<(), PaymentError> {
            self.inner.set_card_number(id, card_number_enc).await
        }

        async fn get_balance(&self, id: CustomerId) -> Result<Decimal, PaymentError> {
            self.inner.get_balance(id).await
        }

        async fn atomic_transfer(
            &self,
            intent_id: IntentId,
            sender_id: CustomerId,
            receiver_id: CustomerId,
            amount: Decimal,
        ) -> Result<Transfer, PaymentError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if self.repeat_last && script.len() == 1 {
                    script.front().cloned()
                } else {
                    script.pop_front()
                }
            };
            match next {
                Some(e) => Err(e),
                None => {
                    self.inner
                        .atomic_transfer(intent_id, sender_id, receiver_id, amount)
                        .await
                }
            }
        }

        async fn find_transfer(
            &self,
            id: TransferId,
        ) -> Result<Option<TransferDetail>, PaymentError> {
            self.inner.find_transfer(id).await
        }

        async fn list_transfers(
            &self,
            filter: &TransferFilter,
        ) -> Result<Vec<TransferDetail>, PaymentError> {
            self.inner.list_transfers(filter).await
        }
    }

    async fn seeded_memory_store(balances: &[(&str, i64)]) -> MemoryLedgerStore {
        let store = MemoryLedgerStore::new();
        for (email, balance) in balances {
            store
                .create_customer(NewCustomer {
                    name: "Test".into(),
                    last_name: "Customer".into(),
                    email: (*email).into(),
                    balance: Decimal::from(*balance),
                    card_number_enc: Some("enc".into()),
                })
                .await
                .unwrap();
        }
        store
    }

    fn fast_config() -> ProcessorConfig {
        ProcessorConfig {
            max_conflict_retries: 3,
            conflict_backoff_ms: 1,
            redelivery_backoff_ms: 1,
        }
    }

    async fn setup(balances: &[(&str, i64)]) -> (TransferProcessor, Arc<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::new());
        for (email, balance) in balances {
            store
                .create_customer(NewCustomer {
                    name: "Test".into(),
                    last_name: "Customer".into(),
                    email: (*email).into(),
                    balance: Decimal::from(*balance),
                    card_number_enc: Some("enc".into()),
                })
                .await
                .unwrap();
        }
        let processor = TransferProcessor::new(
            store.clone(),
            Arc::new(CapturingAuditSink::new()),
            ProcessorConfig::default(),
        );
        (processor, store)
    }

    #[tokio::test]
    async fn test_settles_valid_intent() {
        let (processor, store) = setup(&[("a@x.com", 200), ("b@x.com", 0)]).await;

        let intent = PaymentIntent::new(1, 2, Decimal::from(100));
        let outcome = processor.process_payload(&intent.encode()).await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::Settled(_)));
        assert_eq!(store.get_balance(1).await.unwrap(), Decimal::from(100));
        assert_eq!(store.get_balance(2).await.unwrap(), Decimal::from(100));
    }

    #[tokio::test]
    async fn test_rejects_insufficient_balance() {
        let (processor, store) = setup(&[("a@x.com", 50), ("b@x.com", 0)]).await;

        let intent = PaymentIntent::new(1, 2, Decimal::from(100));
        let outcome = processor.process_payload(&intent.encode()).await.unwrap();

        assert!(matches!(
            outcome,
            ProcessOutcome::Rejected(PaymentError::InsufficientBalance)
        ));
        assert_eq!(store.get_balance(1).await.unwrap(), Decimal::from(50));
        assert!(
            store
                .list_transfers(&TransferFilter::all())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_rejects_unknown_customer() {
        let (processor, _store) = setup(&[("a@x.com", 200)]).await;

        let intent = PaymentIntent::new(1, 99, Decimal::from(10));
        let outcome = processor.process_payload(&intent.encode()).await.unwrap();
        assert!(matches!(
            outcome,
            ProcessOutcome::Rejected(PaymentError::CustomerNotFound)
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let (processor, _store) = setup(&[("a@x.com", 200), ("b@x.com", 0)]).await;

        let outcome = processor.process_payload("1/2/-5").await.unwrap();
        assert!(matches!(
            outcome,
            ProcessOutcome::Rejected(PaymentError::InvalidAmount)
        ));
    }

    #[tokio::test]
    async fn test_drops_malformed_payload() {
        let (processor, _store) = setup(&[]).await;

        let outcome = processor.process_payload("not a payload").await.unwrap();
        assert!(matches!(
            outcome,
            ProcessOutcome::Rejected(PaymentError::MalformedIntent(_))
        ));
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let (processor, store) = setup(&[("a@x.com", 200), ("b@x.com", 0)]).await;

        let payload = PaymentIntent::new(1, 2, Decimal::from(100)).encode();
        let first = processor.process_payload(&payload).await.unwrap();
        assert!(matches!(first, ProcessOutcome::Settled(_)));

        // Redelivery of the same payload: no double debit.
        let second = processor.process_payload(&payload).await.unwrap();
        assert!(matches!(second, ProcessOutcome::Duplicate));

        assert_eq!(store.get_balance(1).await.unwrap(), Decimal::from(100));
        assert_eq!(store.get_balance(2).await.unwrap(), Decimal::from(100));
        assert_eq!(
            store
                .list_transfers(&TransferFilter::all())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_retries_serialization_conflicts_until_settled() {
        let inner = seeded_memory_store(&[("a@x.com", 200), ("b@x.com", 0)]).await;
        let store = Arc::new(ScriptedStore::new(
            inner,
            vec![
                PaymentError::TransactionConflict,
                PaymentError::TransactionConflict,
                PaymentError::TransactionConflict,
            ],
            false,
        ));
        let processor = TransferProcessor::new(
            store.clone(),
            Arc::new(CapturingAuditSink::new()),
            fast_config(),
        );

        let intent = PaymentIntent::new(1, 2, Decimal::from(100));
        let outcome = processor.process_payload(&intent.encode()).await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::Settled(_)));
        // Three conflicted attempts plus the one that committed.
        assert_eq!(store.attempts(), 4);
        assert_eq!(store.get_balance(1).await.unwrap(), Decimal::from(100));
        assert_eq!(store.get_balance(2).await.unwrap(), Decimal::from(100));
    }

    #[tokio::test]
    async fn test_conflict_retries_exhausted_surface_as_transient() {
        let inner = seeded_memory_store(&[("a@x.com", 200), ("b@x.com", 0)]).await;
        let store = Arc::new(ScriptedStore::new(
            inner,
            vec![PaymentError::TransactionConflict],
            true,
        ));
        let processor = TransferProcessor::new(
            store.clone(),
            Arc::new(CapturingAuditSink::new()),
            fast_config(),
        );

        let intent = PaymentIntent::new(1, 2, Decimal::from(100));
        let result = processor.process_payload(&intent.encode()).await;

        // Err means redelivery, not rejection: the intent is still viable.
        assert!(matches!(result, Err(PaymentError::StorageFailure(_))));
        // Initial attempt plus max_conflict_retries.
        assert_eq!(store.attempts(), 4);
        assert_eq!(store.get_balance(1).await.unwrap(), Decimal::from(200));
        assert!(
            store
                .list_transfers(&TransferFilter::all())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_worker_keeps_draining_when_redelivery_queue_is_full() {
        // A store outage with a backlog: every attempt fails transiently and
        // the capacity-1 channel is always full when the worker re-publishes.
        // The worker must drop the redelivery rather than suspend on it, or
        // the queue is never drained again.
        let inner = seeded_memory_store(&[("a@x.com", 200), ("b@x.com", 0)]).await;
        let store = Arc::new(ScriptedStore::new(
            inner,
            vec![PaymentError::StorageFailure("store down".into())],
            true,
        ));
        let processor = Arc::new(TransferProcessor::new(
            store.clone(),
            Arc::new(CapturingAuditSink::new()),
            fast_config(),
        ));

        let (publisher, receiver) = intent_channel(1);
        let worker = ProcessorWorker::new(processor, publisher.clone(), 0);
        let handle = tokio::spawn(worker.run(receiver));

        publisher
            .publish(PaymentIntent::new(1, 2, Decimal::from(10)).encode())
            .await
            .unwrap();
        publisher
            .publish(PaymentIntent::new(1, 2, Decimal::from(20)).encode())
            .await
            .unwrap();

        // Both payloads must reach the store; a worker stuck publishing
        // into the full channel would stop after the first.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while store.attempts() < 2 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "worker stopped draining after {} attempts",
                store.attempts()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        handle.abort();
    }
}
