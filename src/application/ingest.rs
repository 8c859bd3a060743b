//! Ingestion pipeline: raw payload -> decode -> validate -> persist.
//!
//! Messages are handled one at a time. Every failure is logged with its cause
//! and the message is dropped; nothing is retried here. Redelivered messages are
//! safe because creates are idempotent.

use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::application::repos::{CreateOutcome, OrdersRepo};
use crate::domain::entities::Order;
use crate::domain::error::DomainError;
use crate::domain::validation::validate;

pub(crate) const METRIC_INGEST_MESSAGES: &str = "ordervault_ingest_messages_total";

/// Default upper bound for a single payload.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Failure reading from a message source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read from message source: {0}")]
    Io(#[from] std::io::Error),
    #[error("message of {size} bytes exceeds the {limit}-byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// Stream of raw payloads. Ends when the source is exhausted.
pub type MessageStream<'a> = BoxStream<'a, Result<Bytes, SourceError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Decode,
    Validation,
    Persistence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Persisted,
    /// The identifier was already stored; the payload was not written again.
    Duplicate,
    Rejected(RejectReason),
}

impl IngestOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestOutcome::Persisted => "persisted",
            IngestOutcome::Duplicate => "duplicate",
            IngestOutcome::Rejected(RejectReason::Decode) => "rejected_decode",
            IngestOutcome::Rejected(RejectReason::Validation) => "rejected_validation",
            IngestOutcome::Rejected(RejectReason::Persistence) => "rejected_persistence",
        }
    }
}

/// Per-run totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub persisted: u64,
    pub duplicates: u64,
    pub rejected_decode: u64,
    pub rejected_validation: u64,
    pub rejected_persistence: u64,
    pub source_errors: u64,
}

impl IngestStats {
    fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Persisted => self.persisted += 1,
            IngestOutcome::Duplicate => self.duplicates += 1,
            IngestOutcome::Rejected(RejectReason::Decode) => self.rejected_decode += 1,
            IngestOutcome::Rejected(RejectReason::Validation) => self.rejected_validation += 1,
            IngestOutcome::Rejected(RejectReason::Persistence) => self.rejected_persistence += 1,
        }
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_decode + self.rejected_validation + self.rejected_persistence
    }

    pub fn processed(&self) -> u64 {
        self.persisted + self.duplicates + self.rejected()
    }
}

#[derive(Clone)]
pub struct IngestPipeline {
    orders: Arc<dyn OrdersRepo>,
    max_message_bytes: usize,
}

impl IngestPipeline {
    pub fn new(orders: Arc<dyn OrdersRepo>, max_message_bytes: usize) -> Self {
        Self {
            orders,
            max_message_bytes,
        }
    }

    /// Drives the pipeline until `messages` ends.
    pub async fn run(&self, mut messages: MessageStream<'_>) -> IngestStats {
        let mut stats = IngestStats::default();

        while let Some(message) = messages.next().await {
            match message {
                Ok(payload) => stats.record(self.handle(&payload).await),
                Err(SourceError::TooLarge { size, limit }) => {
                    warn!(
                        size,
                        limit,
                        outcome = "rejected_decode",
                        "Dropping oversized message"
                    );
                    stats.record(count(IngestOutcome::Rejected(RejectReason::Decode)));
                }
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable message");
                    stats.source_errors += 1;
                }
            }
        }

        info!(
            persisted = stats.persisted,
            duplicates = stats.duplicates,
            rejected = stats.rejected(),
            source_errors = stats.source_errors,
            "Ingestion stream ended"
        );
        stats
    }

    /// Processes one payload to a terminal outcome. Never fails.
    pub async fn handle(&self, payload: &[u8]) -> IngestOutcome {
        let order = match self.parse(payload) {
            Ok(order) => order,
            Err(DomainError::Decode { message }) => {
                warn!(
                    bytes = payload.len(),
                    outcome = "rejected_decode",
                    error = %message,
                    "Dropping undecodable message"
                );
                return count(IngestOutcome::Rejected(RejectReason::Decode));
            }
            Err(DomainError::Validation(errors)) => {
                let order_uid = order_uid_hint(payload);
                warn!(
                    order_uid = %order_uid,
                    violations = errors.len(),
                    fields = ?errors.fields().collect::<Vec<_>>(),
                    outcome = "rejected_validation",
                    error = %errors,
                    "Dropping invalid order"
                );
                return count(IngestOutcome::Rejected(RejectReason::Validation));
            }
        };

        match self.orders.create_order(&order).await {
            Ok(CreateOutcome::Created) => {
                info!(
                    order_uid = %order.order_uid,
                    items = order.items.len(),
                    outcome = "persisted",
                    "Order persisted"
                );
                count(IngestOutcome::Persisted)
            }
            Ok(CreateOutcome::AlreadyExists) => {
                info!(
                    order_uid = %order.order_uid,
                    outcome = "duplicate",
                    "Order already stored; skipping redelivery"
                );
                count(IngestOutcome::Duplicate)
            }
            Err(err) => {
                error!(
                    order_uid = %order.order_uid,
                    outcome = "rejected_persistence",
                    error = %err,
                    "Failed to persist order"
                );
                count(IngestOutcome::Rejected(RejectReason::Persistence))
            }
        }
    }

    fn parse(&self, payload: &[u8]) -> Result<Order, DomainError> {
        if payload.len() > self.max_message_bytes {
            return Err(DomainError::decode(format!(
                "message of {} bytes exceeds the {}-byte limit",
                payload.len(),
                self.max_message_bytes
            )));
        }

        let mut order: Order =
            serde_json::from_slice(payload).map_err(|err| DomainError::decode(err.to_string()))?;
        order.date_created = truncate_to_micros(order.date_created);
        validate(&order)?;
        Ok(order)
    }
}

/// The store keeps microseconds; the cached copy must match what a reload returns.
fn truncate_to_micros(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_nanosecond(at.nanosecond() / 1_000 * 1_000).unwrap_or(at)
}

fn count(outcome: IngestOutcome) -> IngestOutcome {
    counter!(METRIC_INGEST_MESSAGES, "outcome" => outcome.as_str()).increment(1);
    outcome
}

/// Best-effort identifier for log lines about payloads that decoded but failed validation.
fn order_uid_hint(payload: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|value| {
            value
                .get("order_uid")
                .and_then(|uid| uid.as_str())
                .map(str::to_string)
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use time::macros::datetime;

    use super::*;
    use crate::application::repos::RepoError;
    use crate::domain::sample::{corrupt, sample_order};

    #[derive(Default)]
    struct RecordingRepo {
        created: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl OrdersRepo for RecordingRepo {
        async fn create_order(&self, order: &Order) -> Result<CreateOutcome, RepoError> {
            if self.fail {
                return Err(RepoError::integrity("copied 0 item rows"));
            }
            let mut created = self.created.lock().expect("created lock");
            if created.contains(&order.order_uid) {
                return Ok(CreateOutcome::AlreadyExists);
            }
            created.push(order.order_uid.clone());
            Ok(CreateOutcome::Created)
        }

        async fn get_order(&self, _order_uid: &str) -> Result<Order, RepoError> {
            unreachable!("not used in these tests")
        }

        async fn list_orders(&self) -> Result<Vec<Order>, RepoError> {
            unreachable!("not used in these tests")
        }
    }

    fn payload(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).expect("encode order")
    }

    #[tokio::test]
    async fn valid_payload_is_persisted_once() {
        let repo = Arc::new(RecordingRepo::default());
        let pipeline = IngestPipeline::new(repo.clone(), DEFAULT_MAX_MESSAGE_BYTES);
        let bytes = payload(&sample_order("ingest-1"));

        assert_eq!(pipeline.handle(&bytes).await, IngestOutcome::Persisted);
        assert_eq!(pipeline.handle(&bytes).await, IngestOutcome::Duplicate);
        assert_eq!(*repo.created.lock().expect("lock"), vec!["ingest-1"]);
    }

    #[test]
    fn decoded_timestamps_keep_store_precision() {
        let pipeline =
            IngestPipeline::new(Arc::new(RecordingRepo::default()), DEFAULT_MAX_MESSAGE_BYTES);
        let mut order = sample_order("ingest-nanos");
        order.date_created = datetime!(2021-11-26 06:22:19.123456789 UTC);

        let decoded = pipeline.parse(&payload(&order)).expect("valid order");
        assert_eq!(
            decoded.date_created,
            datetime!(2021-11-26 06:22:19.123456 UTC)
        );
    }

    #[tokio::test]
    async fn invalid_order_never_reaches_the_store() {
        let repo = Arc::new(RecordingRepo::default());
        let pipeline = IngestPipeline::new(repo.clone(), DEFAULT_MAX_MESSAGE_BYTES);
        let mut order = sample_order("ingest-318");
        corrupt(&mut order);

        assert_eq!(
            pipeline.handle(&payload(&order)).await,
            IngestOutcome::Rejected(RejectReason::Validation)
        );
        assert!(repo.created.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn malformed_and_oversized_payloads_are_decode_rejections() {
        let pipeline = IngestPipeline::new(Arc::new(RecordingRepo::default()), 64);

        assert_eq!(
            pipeline.handle(b"{not json").await,
            IngestOutcome::Rejected(RejectReason::Decode)
        );
        assert_eq!(
            pipeline.handle(&payload(&sample_order("too-big"))).await,
            IngestOutcome::Rejected(RejectReason::Decode)
        );
    }

    #[tokio::test]
    async fn store_failure_is_a_persistence_rejection() {
        let repo = Arc::new(RecordingRepo {
            fail: true,
            ..Default::default()
        });
        let pipeline = IngestPipeline::new(repo, DEFAULT_MAX_MESSAGE_BYTES);

        assert_eq!(
            pipeline.handle(&payload(&sample_order("ingest-fail"))).await,
            IngestOutcome::Rejected(RejectReason::Persistence)
        );
    }

    #[tokio::test]
    async fn run_skips_bad_messages_and_continues() {
        let repo = Arc::new(RecordingRepo::default());
        let pipeline = IngestPipeline::new(repo.clone(), DEFAULT_MAX_MESSAGE_BYTES);
        let mut invalid = sample_order("bad");
        corrupt(&mut invalid);

        let messages: Vec<Result<Bytes, SourceError>> = vec![
            Ok(Bytes::from_static(b"garbage")),
            Err(SourceError::Io(std::io::Error::other("broken pipe"))),
            Ok(Bytes::from(payload(&invalid))),
            Err(SourceError::TooLarge {
                size: 11,
                limit: 10,
            }),
            Ok(Bytes::from(payload(&sample_order("good")))),
            Ok(Bytes::from(payload(&sample_order("good")))),
        ];

        let stats = pipeline.run(stream::iter(messages).boxed()).await;
        assert_eq!(
            stats,
            IngestStats {
                persisted: 1,
                duplicates: 1,
                rejected_decode: 2,
                rejected_validation: 1,
                rejected_persistence: 0,
                source_errors: 1,
            }
        );
        assert_eq!(stats.processed(), 5);
    }

    #[test]
    fn order_uid_hint_tolerates_any_payload() {
        assert_eq!(order_uid_hint(br#"{"order_uid":"abc"}"#), "abc");
        assert_eq!(order_uid_hint(b"[]"), "");
        assert_eq!(order_uid_hint(b"nope"), "");
    }
}
