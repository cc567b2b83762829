//! Audit/Log Sink
//!
//! Fire-and-forget event publication. Every submission, settlement and query
//! outcome emits a free-text event onto one of two streams (payment log,
//! error log). Delivery failure must never fail the primary operation, so
//! `publish` is infallible and non-async.

use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Which stream an audit event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStream {
    Payment,
    Error,
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub stream: AuditStream,
    pub message: String,
}

/// Audit sink consumed by the submitter, processor and query engine
pub trait AuditSink: Send + Sync {
    fn publish(&self, stream: AuditStream, message: String);
}

/// Sink that forwards audit events to the tracing subscriber
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, stream: AuditStream, message: String) {
        match stream {
            AuditStream::Payment => info!(target: "audit", "{}", message),
            AuditStream::Error => warn!(target: "audit", "{}", message),
        }
    }
}

/// Sink backed by a bounded channel, drained by an external log shipper.
///
/// Uses `try_send` so a slow or dead consumer drops events instead of
/// blocking the payment path.
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn publish(&self, stream: AuditStream, message: String) {
        if let Err(e) = self.tx.try_send(AuditEvent { stream, message }) {
            debug!(error = %e, "Audit event dropped");
        }
    }
}

/// Sink that records events in memory, for assertions in tests
#[derive(Default)]
pub struct CapturingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl CapturingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn error_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.stream == AuditStream::Error)
            .count()
    }
}

impl AuditSink for CapturingAuditSink {
    fn publish(&self, stream: AuditStream, message: String) {
        self.events
            .lock()
            .unwrap()
            .push(AuditEvent { stream, message });
    }
}
