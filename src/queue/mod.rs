//! Orchestrator queue protocol
//!
//! This module handles:
//! - Wire types for the lease/ack/fail/enqueue, dataset, and event calls
//! - The [`QueueService`] trait the crawl loop drives
//! - An HTTP client speaking JSON to the internal run API

mod client;
mod types;

pub use client::{HttpQueueClient, QueueConfig};
pub use types::{
    AckOutcome, Bootstrap, ConcurrencySpec, EnqueueItem, FailOutcome, LeaseItem, RunDescriptor,
    RunEvent,
};
pub use types::{
    EVENT_ENGINE_FALLBACK, EVENT_PROXY_APPLIED, EVENT_REQUEST_FAILED, EVENT_REQUEST_SUCCEEDED,
    EVENT_RUNTIME_CRASHED, EVENT_RUNTIME_FINISHED, EVENT_RUNTIME_INPUT_INVALID,
    EVENT_RUNTIME_STARTED, LEVEL_ERROR, LEVEL_INFO, LEVEL_WARNING, STAGE_PROXY, STAGE_REQUEST,
    STAGE_RUNTIME,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::QueueError;

/// Queue operations the crawl loop performs.
///
/// The production implementation is [`HttpQueueClient`]; tests drive the
/// loop with in-memory fakes.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Lease up to `limit` pending requests for this worker.
    async fn lease(
        &self,
        worker_id: &str,
        limit: u32,
        lease_seconds: u64,
    ) -> Result<Vec<LeaseItem>, QueueError>;

    /// Report a successfully processed item.
    async fn ack(&self, outcome: &AckOutcome) -> Result<(), QueueError>;

    /// Report a failed item with its classification.
    async fn fail(&self, outcome: &FailOutcome) -> Result<(), QueueError>;

    /// Hand discovered links back to the queue. Empty batches are skipped.
    async fn enqueue(&self, items: &[EnqueueItem]) -> Result<(), QueueError>;

    /// Push output records to the dataset sink. Empty batches are skipped.
    async fn push_records(&self, records: &[Value]) -> Result<(), QueueError>;

    /// Emit a structured run event.
    async fn emit_event(&self, event: &RunEvent) -> Result<(), QueueError>;
}
