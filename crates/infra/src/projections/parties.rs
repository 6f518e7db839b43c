//! Doctor and supplier directory read model.

use serde_json::Value as JsonValue;

use dentflow_core::TenantId;
use dentflow_events::EventEnvelope;
use dentflow_parties::{ContactInfo, PartyEvent, PartyId, PartyKind, PartyStatus};

use crate::projections::cursor::{self, CursorMap, ProjectionError};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyReadModel {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub status: PartyStatus,
}

#[derive(Debug)]
pub struct PartiesProjection<S>
where
    S: TenantStore<PartyId, PartyReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> PartiesProjection<S>
where
    S: TenantStore<PartyId, PartyReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, party_id: &PartyId) -> Option<PartyReadModel> {
        self.store.get(tenant_id, party_id)
    }

    pub fn list(&self, tenant_id: TenantId, kind: PartyKind) -> Vec<PartyReadModel> {
        let mut matching: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.kind == kind)
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        matching
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "parties.party" {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let ev: PartyEvent = cursor::decode(envelope)?;

        let (event_tenant, party_id) = match &ev {
            PartyEvent::PartyRegistered(e) => (e.tenant_id, e.party_id),
            PartyEvent::PartyUpdated(e) => (e.tenant_id, e.party_id),
            PartyEvent::PartySuspended(e) => (e.tenant_id, e.party_id),
            PartyEvent::PartyReactivated(e) => (e.tenant_id, e.party_id),
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if party_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::TenantIsolation(
                "event party_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            PartyEvent::PartyRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.party_id,
                    PartyReadModel {
                        party_id: e.party_id,
                        kind: e.kind,
                        name: e.name,
                        contact: e.contact,
                        status: PartyStatus::Active,
                    },
                );
            }
            PartyEvent::PartyUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.party_id) {
                    rm.name = e.name;
                    rm.contact = e.contact;
                    self.store.upsert(tenant_id, e.party_id, rm);
                }
            }
            PartyEvent::PartySuspended(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.party_id) {
                    rm.status = PartyStatus::Suspended;
                    self.store.upsert(tenant_id, e.party_id, rm);
                }
            }
            PartyEvent::PartyReactivated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.party_id) {
                    rm.status = PartyStatus::Active;
                    self.store.upsert(tenant_id, e.party_id, rm);
                }
            }
        }

        self.cursors
            .advance(tenant_id, envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let (tenants, envs) = cursor::rebuild_order(envelopes);
        for t in tenants {
            self.store.clear_tenant(t);
            self.cursors.clear_tenant(t);
        }
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryTenantStore;
    use chrono::Utc;
    use dentflow_core::AggregateId;
    use dentflow_parties::{PartyReactivated, PartyRegistered, PartySuspended};
    use uuid::Uuid;

    fn envelope(ev: &PartyEvent, party_id: PartyId, tenant_id: TenantId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            party_id.0,
            "parties.party".to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn projection() -> PartiesProjection<InMemoryTenantStore<PartyId, PartyReadModel>> {
        PartiesProjection::new(InMemoryTenantStore::new())
    }

    #[test]
    fn lists_are_kind_scoped() {
        let p = projection();
        let tenant_id = TenantId::new();
        let doctor_id = PartyId::new(AggregateId::new());
        let supplier_id = PartyId::new(AggregateId::new());

        let doctor = PartyEvent::PartyRegistered(PartyRegistered {
            tenant_id,
            party_id: doctor_id,
            kind: PartyKind::Doctor,
            name: "Dr. Ahmed Hassan".to_string(),
            contact: ContactInfo::default(),
            occurred_at: Utc::now(),
        });
        let supplier = PartyEvent::PartyRegistered(PartyRegistered {
            tenant_id,
            party_id: supplier_id,
            kind: PartyKind::Supplier,
            name: "Nile Dental Supplies".to_string(),
            contact: ContactInfo::default(),
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&doctor, doctor_id, tenant_id, 1)).unwrap();
        p.apply_envelope(&envelope(&supplier, supplier_id, tenant_id, 1)).unwrap();

        assert_eq!(p.list(tenant_id, PartyKind::Doctor).len(), 1);
        assert_eq!(p.list(tenant_id, PartyKind::Supplier).len(), 1);
    }

    #[test]
    fn suspension_flips_the_status() {
        let p = projection();
        let tenant_id = TenantId::new();
        let party_id = PartyId::new(AggregateId::new());

        let registered = PartyEvent::PartyRegistered(PartyRegistered {
            tenant_id,
            party_id,
            kind: PartyKind::Doctor,
            name: "Dr. Mona Khalil".to_string(),
            contact: ContactInfo::default(),
            occurred_at: Utc::now(),
        });
        let suspended = PartyEvent::PartySuspended(PartySuspended {
            tenant_id,
            party_id,
            reason: Some("unsettled balance".to_string()),
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&registered, party_id, tenant_id, 1)).unwrap();
        p.apply_envelope(&envelope(&suspended, party_id, tenant_id, 2)).unwrap();

        assert_eq!(p.get(tenant_id, &party_id).unwrap().status, PartyStatus::Suspended);

        let reactivated = PartyEvent::PartyReactivated(PartyReactivated {
            tenant_id,
            party_id,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&reactivated, party_id, tenant_id, 3)).unwrap();

        assert_eq!(p.get(tenant_id, &party_id).unwrap().status, PartyStatus::Active);
    }
}
