//! Per-stream sequence cursors shared by every projection.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use dentflow_core::{AggregateId, TenantId};
use dentflow_events::EventEnvelope;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// In-memory `(tenant, aggregate) -> last applied sequence` map.
///
/// `admit` is the idempotency gate: replays return `false`, gaps are an
/// error, fresh events return `true` and must be followed by `advance`.
#[derive(Debug, Default)]
pub struct CursorMap {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl CursorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        match self.inner.read() {
            Ok(map) => *map.get(&(tenant_id, aggregate_id)).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, aggregate_id), sequence_number);
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _), _| *t != tenant_id);
        }
    }

    /// Decide whether an envelope should be applied.
    pub fn admit(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let seq = envelope.sequence_number();
        let last = self.get(envelope.tenant_id(), envelope.aggregate_id());

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Already applied (at-least-once delivery).
            return Ok(false);
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }
}

/// Decode an envelope payload into a typed domain event.
pub fn decode<E: DeserializeOwned>(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<E, ProjectionError> {
    envelope
        .decode()
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))
}

/// Sort envelopes into deterministic rebuild order and collect the distinct
/// tenants they touch.
pub fn rebuild_order(
    envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
) -> (Vec<TenantId>, Vec<EventEnvelope<JsonValue>>) {
    let mut envs: Vec<_> = envelopes.into_iter().collect();

    let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
    tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
    tenants.dedup();

    envs.sort_by_key(|e| {
        (
            *e.tenant_id().as_uuid().as_bytes(),
            *e.aggregate_id().as_uuid().as_bytes(),
            e.sequence_number(),
        )
    });

    (tenants, envs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            "cases.case".to_string(),
            seq,
            serde_json::json!({}),
        )
    }

    #[test]
    fn admit_accepts_next_and_rejects_replays_and_gaps() {
        let cursors = CursorMap::new();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();

        assert!(cursors.admit(&envelope(tenant_id, aggregate_id, 1)).unwrap());
        cursors.advance(tenant_id, aggregate_id, 1);

        // replay
        assert!(!cursors.admit(&envelope(tenant_id, aggregate_id, 1)).unwrap());
        // gap
        assert!(cursors.admit(&envelope(tenant_id, aggregate_id, 3)).is_err());
        // next
        assert!(cursors.admit(&envelope(tenant_id, aggregate_id, 2)).unwrap());
    }
}
