use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use dentflow_core::{AggregateId, ExpectedVersion, TenantId};

/// An event ready to be appended to a stream, before the store has assigned
/// it a sequence number. Build one with [`UncommittedEvent::from_typed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Wrap a typed domain event with stream metadata, serializing the
    /// payload so infra stays decoupled from the domain crates.
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: dentflow_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A persisted event with its assigned, stream-scoped sequence number.
///
/// Sequence numbers start at 1 and increase by one per event within a
/// `(tenant_id, aggregate_id)` stream; they drive both optimistic concurrency
/// and projection idempotency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Convert a stored event into a tenant-scoped event envelope for publication.
    pub fn to_envelope(&self) -> dentflow_events::EventEnvelope<JsonValue> {
        dentflow_events::EventEnvelope::new(
            self.event_id,
            self.tenant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Infrastructure-level store failure, distinct from domain errors.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Append-only, tenant-scoped event store.
///
/// One stream per aggregate instance, keyed by `(tenant_id, aggregate_id)`.
/// Implementations must enforce tenant isolation, check `ExpectedVersion`
/// before appending, assign gapless sequence numbers starting at
/// `current_version + 1`, and persist each batch atomically.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for a tenant + aggregate, in sequence order.
    /// An unknown stream is an empty vector, not an error.
    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentflow_events::Event;

    #[derive(Debug, Clone, Serialize)]
    struct ProbeEvent {
        at: DateTime<Utc>,
        label: String,
    }

    impl Event for ProbeEvent {
        fn event_type(&self) -> &'static str {
            "probe.recorded"
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn from_typed_captures_metadata_and_payload() {
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let event = ProbeEvent {
            at: Utc::now(),
            label: "first".to_string(),
        };

        let uncommitted = UncommittedEvent::from_typed(
            tenant_id,
            aggregate_id,
            "probe",
            Uuid::now_v7(),
            &event,
        )
        .unwrap();

        assert_eq!(uncommitted.tenant_id, tenant_id);
        assert_eq!(uncommitted.event_type, "probe.recorded");
        assert_eq!(uncommitted.event_version, 1);
        assert_eq!(uncommitted.occurred_at, event.at);
        assert_eq!(uncommitted.payload["label"], "first");
    }

    #[test]
    fn to_envelope_preserves_the_stream_coordinates() {
        let stored = StoredEvent {
            event_id: Uuid::now_v7(),
            tenant_id: TenantId::new(),
            aggregate_id: AggregateId::new(),
            aggregate_type: "probe".to_string(),
            sequence_number: 3,
            event_type: "probe.recorded".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({"label": "first"}),
        };

        let envelope = stored.to_envelope();
        assert_eq!(envelope.event_id(), stored.event_id);
        assert_eq!(envelope.tenant_id(), stored.tenant_id);
        assert_eq!(envelope.aggregate_id(), stored.aggregate_id);
        assert_eq!(envelope.aggregate_type(), "probe");
        assert_eq!(envelope.sequence_number(), 3);
        assert_eq!(envelope.payload(), &stored.payload);
    }
}
