//! Case read model: current workflow position plus the full audit trail.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use dentflow_cases::{
    department_of, CaseEvent, CaseId, CaseStatus, Department, QcResult, WorkflowStep,
};
use dentflow_core::{AggregateId, TenantId};
use dentflow_events::EventEnvelope;
use dentflow_parties::PartyId;
use dentflow_pricing::{Priority, WorkType};

use crate::projections::cursor::{self, CursorMap, ProjectionError};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReadModel {
    pub case_id: CaseId,
    pub case_number: String,
    pub doctor_id: PartyId,
    pub work_type: WorkType,
    pub teeth: String,
    pub priority: Priority,
    pub status: CaseStatus,
    pub department: Department,
    pub qc_result: Option<QcResult>,
    pub invoice_id: Option<AggregateId>,
    pub history: Vec<WorkflowStep>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CasesProjection<S>
where
    S: TenantStore<CaseId, CaseReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> CasesProjection<S>
where
    S: TenantStore<CaseId, CaseReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, case_id: &CaseId) -> Option<CaseReadModel> {
        self.store.get(tenant_id, case_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<CaseReadModel> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| a.case_number.cmp(&b.case_number));
        all
    }

    pub fn list_by_status(&self, tenant_id: TenantId, status: CaseStatus) -> Vec<CaseReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.status == status)
            .collect()
    }

    pub fn list_by_department(
        &self,
        tenant_id: TenantId,
        department: Department,
    ) -> Vec<CaseReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.department == department)
            .collect()
    }

    pub fn list_by_doctor(&self, tenant_id: TenantId, doctor_id: PartyId) -> Vec<CaseReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.doctor_id == doctor_id)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "cases.case" {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let ev: CaseEvent = cursor::decode(envelope)?;

        let (event_tenant, case_id) = match &ev {
            CaseEvent::CaseRegistered(e) => (e.tenant_id, e.case_id),
            CaseEvent::CaseTransferred(e) => (e.tenant_id, e.case_id),
            CaseEvent::QcRecorded(e) => (e.tenant_id, e.case_id),
            CaseEvent::InvoiceLinked(e) => (e.tenant_id, e.case_id),
            CaseEvent::InvoiceUnlinked(e) => (e.tenant_id, e.case_id),
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if case_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::TenantIsolation(
                "event case_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            CaseEvent::CaseRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.case_id,
                    CaseReadModel {
                        case_id: e.case_id,
                        case_number: e.case_number,
                        doctor_id: e.doctor_id,
                        work_type: e.work_type,
                        teeth: e.teeth,
                        priority: e.priority,
                        status: CaseStatus::Reception,
                        department: department_of(CaseStatus::Reception),
                        qc_result: None,
                        invoice_id: None,
                        history: vec![],
                        registered_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            CaseEvent::CaseTransferred(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.case_id) {
                    rm.status = e.to_status;
                    rm.department = e.department;
                    rm.updated_at = e.occurred_at;
                    rm.history.push(WorkflowStep {
                        from_status: e.from_status,
                        to_status: e.to_status,
                        department: e.department,
                        occurred_at: e.occurred_at,
                        notes: e.notes,
                        rejection_reason: e.rejection_reason,
                    });
                    self.store.upsert(tenant_id, e.case_id, rm);
                }
            }
            CaseEvent::QcRecorded(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.case_id) {
                    rm.qc_result = Some(e.result);
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.case_id, rm);
                }
            }
            CaseEvent::InvoiceLinked(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.case_id) {
                    rm.invoice_id = Some(e.invoice_id);
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.case_id, rm);
                }
            }
            CaseEvent::InvoiceUnlinked(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.case_id) {
                    rm.invoice_id = None;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.case_id, rm);
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
    use dentflow_cases::{CaseRegistered, CaseTransferred};
    use uuid::Uuid;

    fn envelope(ev: &CaseEvent, case_id: CaseId, tenant_id: TenantId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            case_id.0,
            "cases.case".to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn projection() -> CasesProjection<InMemoryTenantStore<CaseId, CaseReadModel>> {
        CasesProjection::new(InMemoryTenantStore::new())
    }

    fn registered(tenant_id: TenantId, case_id: CaseId) -> CaseEvent {
        CaseEvent::CaseRegistered(CaseRegistered {
            tenant_id,
            case_id,
            case_number: "C-000001".to_string(),
            doctor_id: PartyId::new(AggregateId::new()),
            work_type: WorkType::Bridge,
            teeth: "24,25,26".to_string(),
            priority: Priority::Rush,
            notes: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn registration_lands_in_reception() {
        let p = projection();
        let tenant_id = TenantId::new();
        let case_id = CaseId::new(AggregateId::new());

        p.apply_envelope(&envelope(&registered(tenant_id, case_id), case_id, tenant_id, 1))
            .unwrap();

        let rm = p.get(tenant_id, &case_id).unwrap();
        assert_eq!(rm.status, CaseStatus::Reception);
        assert_eq!(rm.department, Department::Reception);
        assert!(rm.history.is_empty());
    }

    #[test]
    fn transfers_accumulate_in_the_audit_trail() {
        let p = projection();
        let tenant_id = TenantId::new();
        let case_id = CaseId::new(AggregateId::new());

        p.apply_envelope(&envelope(&registered(tenant_id, case_id), case_id, tenant_id, 1))
            .unwrap();

        let transfer = CaseEvent::CaseTransferred(CaseTransferred {
            tenant_id,
            case_id,
            from_status: CaseStatus::Reception,
            to_status: CaseStatus::CadDesign,
            department: department_of(CaseStatus::CadDesign),
            notes: Some("scan received".to_string()),
            rejection_reason: None,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&transfer, case_id, tenant_id, 2)).unwrap();

        let rm = p.get(tenant_id, &case_id).unwrap();
        assert_eq!(rm.status, CaseStatus::CadDesign);
        assert_eq!(rm.department, Department::CadDesign);
        assert_eq!(rm.history.len(), 1);
        assert_eq!(rm.history[0].from_status, CaseStatus::Reception);

        assert_eq!(p.list_by_department(tenant_id, Department::CadDesign).len(), 1);
        assert!(p.list_by_status(tenant_id, CaseStatus::Reception).is_empty());
    }

    #[test]
    fn foreign_aggregate_types_are_ignored() {
        let p = projection();
        let tenant_id = TenantId::new();

        let env = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            AggregateId::new(),
            "invoicing.invoice".to_string(),
            1,
            serde_json::json!({}),
        );
        p.apply_envelope(&env).unwrap();
        assert!(p.list(tenant_id).is_empty());
    }
}
