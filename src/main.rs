//! Payflow service entry point
//!
//! Wires the pipeline together:
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Submitter │───▶│ Intent chan  │───▶│ Workers  │
//! │  (YAML)  │    │(validate) │    │(at-least-once)│   │ (settle) │
//! └──────────┘    └───────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! The ledger store is PostgreSQL when `postgres_url` is configured,
//! otherwise the in-memory store (local runs).

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use payflow::audit::TracingAuditSink;
use payflow::config::AppConfig;
use payflow::identity::JwtIdentityResolver;
use payflow::ledger::{LedgerStore, MemoryLedgerStore, PgLedgerStore, schema};
use payflow::payment::{IntentSubmitter, ProcessorWorker, TransferProcessor, intent_channel};
use payflow::customer::CustomerRegistry;
use payflow::query::TransferQueryEngine;
use payflow::CardCipher;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = payflow::logging::init_logging(&config);

    info!(
        env = %env,
        git_hash = env!("GIT_HASH"),
        "Starting payflow service"
    );

    let store: Arc<dyn LedgerStore> = match &config.postgres_url {
        Some(url) => {
            let pg = PgLedgerStore::connect(url).await?;
            schema::init_schema(pg.pool()).await?;
            info!("Connected to PostgreSQL ledger store");
            Arc::new(pg)
        }
        None => {
            info!("No postgres_url configured, using in-memory ledger store");
            Arc::new(MemoryLedgerStore::new())
        }
    };

    let audit = Arc::new(TracingAuditSink);
    let cipher = CardCipher::new(&config.security.card_key)
        .map_err(|e| anyhow::anyhow!("invalid card cipher key: {}", e))?;

    let (publisher, receiver) = intent_channel(config.channel.queue_size);

    let processor = Arc::new(TransferProcessor::new(
        store.clone(),
        audit.clone(),
        config.processor.clone(),
    ));

    let mut worker_handles = Vec::with_capacity(config.channel.workers);
    for worker_id in 0..config.channel.workers {
        let worker = ProcessorWorker::new(processor.clone(), publisher.clone(), worker_id);
        let rx = receiver.clone();
        worker_handles.push(tokio::spawn(async move {
            worker.run(rx).await;
        }));
    }
    info!(workers = config.channel.workers, "Transfer processors started");

    // Call surface for an embedding server; kept alive so the channel stays
    // open until shutdown.
    let identity = Arc::new(JwtIdentityResolver::new(
        config.security.jwt_secret.clone(),
        store.clone(),
    ));
    let _submitter = IntentSubmitter::new(identity, store.clone(), publisher.clone(), audit.clone());
    let _registry = CustomerRegistry::new(store.clone(), cipher.clone(), audit.clone());
    let _queries = TransferQueryEngine::new(store, cipher, audit);

    info!("Payflow pipeline ready, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, closing intent channel");

    // Dropping every publisher closes the channel; workers drain and exit.
    drop(publisher);
    drop(_submitter);
    for handle in worker_handles {
        let _ = handle.await;
    }

    info!("Payflow service stopped");
    Ok(())
}
