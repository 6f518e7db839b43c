//! Tenant-scoped carrier for committed events.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dentflow_core::{AggregateId, TenantId};

/// One committed event plus the coordinates needed to route and order it.
///
/// This is what the store hands to subscribers after an append. The
/// coordinates carry three guarantees:
/// - `tenant_id` scopes the event; consumers must never mix tenants.
/// - `(aggregate_id, sequence_number)` orders the stream; sequence numbers
///   start at 1 and increase without gaps within one aggregate.
/// - `event_id` is unique per envelope and stable across redelivery, so
///   at-least-once consumers can dedupe on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,

    aggregate_id: AggregateId,
    aggregate_type: String,

    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// Position in the aggregate stream, 1-based.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<serde_json::Value> {
    /// Decode the raw JSON payload into a concrete domain event.
    ///
    /// The store keeps payloads as JSON so one stream can mix event types;
    /// consumers pick the type to decode into by `aggregate_type`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Noted {
        note: String,
    }

    #[test]
    fn decode_reads_the_payload_and_rejects_mismatched_shapes() {
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            TenantId::new(),
            AggregateId::new(),
            "cases.case",
            1,
            serde_json::json!({"note": "rework"}),
        );

        let decoded: Noted = envelope.decode().unwrap();
        assert_eq!(decoded.note, "rework");

        assert!(envelope.decode::<Vec<u64>>().is_err());
    }
}
