//! Per-doctor receivables summary.
//!
//! Debt never goes below zero; a payment that would overshoot (possible only
//! through replay anomalies, the ledger rejects overpayments) clamps instead.

use serde_json::Value as JsonValue;

use dentflow_core::TenantId;
use dentflow_events::EventEnvelope;
use dentflow_invoicing::InvoiceEvent;
use dentflow_parties::PartyId;

use crate::projections::cursor::{self, CursorMap, ProjectionError};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorBalance {
    pub doctor_id: PartyId,
    pub total_invoiced: u64,
    pub total_paid: u64,
    pub total_debt: u64,
    pub open_invoice_count: u64,
}

impl DoctorBalance {
    fn zero(doctor_id: PartyId) -> Self {
        Self {
            doctor_id,
            total_invoiced: 0,
            total_paid: 0,
            total_debt: 0,
            open_invoice_count: 0,
        }
    }
}

#[derive(Debug)]
pub struct DoctorBalancesProjection<S>
where
    S: TenantStore<PartyId, DoctorBalance>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> DoctorBalancesProjection<S>
where
    S: TenantStore<PartyId, DoctorBalance>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, doctor_id: &PartyId) -> Option<DoctorBalance> {
        self.store.get(tenant_id, doctor_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<DoctorBalance> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| b.total_debt.cmp(&a.total_debt));
        all
    }

    fn update(&self, tenant_id: TenantId, doctor_id: PartyId, f: impl FnOnce(&mut DoctorBalance)) {
        let mut balance = self
            .store
            .get(tenant_id, &doctor_id)
            .unwrap_or_else(|| DoctorBalance::zero(doctor_id));
        f(&mut balance);
        self.store.upsert(tenant_id, doctor_id, balance);
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "invoicing.invoice" {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let ev: InvoiceEvent = cursor::decode(envelope)?;

        let event_tenant = match &ev {
            InvoiceEvent::InvoiceIssued(e) => e.tenant_id,
            InvoiceEvent::PaymentRecorded(e) => e.tenant_id,
            InvoiceEvent::InvoiceCancelled(e) => e.tenant_id,
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.update(tenant_id, e.doctor_id, |b| {
                    b.total_invoiced = b.total_invoiced.saturating_add(e.total_amount);
                    b.total_debt = b.total_debt.saturating_add(e.total_amount);
                    b.open_invoice_count += 1;
                });
            }
            InvoiceEvent::PaymentRecorded(e) => {
                self.update(tenant_id, e.doctor_id, |b| {
                    b.total_paid = b.total_paid.saturating_add(e.amount);
                    b.total_debt = b.total_debt.saturating_sub(e.amount);
                    if e.remaining == 0 {
                        b.open_invoice_count = b.open_invoice_count.saturating_sub(1);
                    }
                });
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                // Cancellation is only legal before any payment, so the whole
                // invoice amount is still outstanding.
                self.update(tenant_id, e.doctor_id, |b| {
                    b.total_invoiced = b.total_invoiced.saturating_sub(e.total_amount);
                    b.total_debt = b.total_debt.saturating_sub(e.total_amount);
                    b.open_invoice_count = b.open_invoice_count.saturating_sub(1);
                });
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
    use dentflow_cases::CaseId;
    use dentflow_core::AggregateId;
    use dentflow_invoicing::{
        InvoiceCancelled, InvoiceId, InvoiceIssued, PaymentMethod, PaymentRecorded,
    };
    use dentflow_pricing::{calculate, PriceOverrides, PricingRule, Priority, WorkType};
    use uuid::Uuid;

    fn envelope(ev: &InvoiceEvent, invoice_id: InvoiceId, tenant_id: TenantId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            invoice_id.0,
            "invoicing.invoice".to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn projection() -> DoctorBalancesProjection<InMemoryTenantStore<PartyId, DoctorBalance>> {
        DoctorBalancesProjection::new(InMemoryTenantStore::new())
    }

    fn issued(tenant_id: TenantId, invoice_id: InvoiceId, doctor_id: PartyId, total: u64) -> InvoiceEvent {
        let rule = PricingRule::default_for(WorkType::Crown);
        let breakdown = calculate(WorkType::Crown, "11", Priority::Normal, &rule, &PriceOverrides::default()).unwrap();
        InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id,
            invoice_id,
            invoice_number: "INV-000001".to_string(),
            case_id: CaseId::new(AggregateId::new()),
            doctor_id,
            breakdown,
            subtotal: total,
            discount: 0,
            tax: 0,
            total_amount: total,
            due_date: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn debt_accumulates_and_settles() {
        let p = projection();
        let tenant_id = TenantId::new();
        let doctor_id = PartyId::new(AggregateId::new());
        let invoice_id = InvoiceId::new(AggregateId::new());

        p.apply_envelope(&envelope(
            &issued(tenant_id, invoice_id, doctor_id, 210_000),
            invoice_id,
            tenant_id,
            1,
        ))
        .unwrap();

        let b = p.get(tenant_id, &doctor_id).unwrap();
        assert_eq!(b.total_debt, 210_000);
        assert_eq!(b.open_invoice_count, 1);

        let pay = InvoiceEvent::PaymentRecorded(PaymentRecorded {
            tenant_id,
            invoice_id,
            doctor_id,
            amount: 210_000,
            method: PaymentMethod::BankTransfer,
            reference: Some("TRX-4412".to_string()),
            total_paid: 210_000,
            remaining: 0,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&pay, invoice_id, tenant_id, 2)).unwrap();

        let b = p.get(tenant_id, &doctor_id).unwrap();
        assert_eq!(b.total_debt, 0);
        assert_eq!(b.total_paid, 210_000);
        assert_eq!(b.open_invoice_count, 0);
    }

    #[test]
    fn cancellation_releases_the_outstanding_amount() {
        let p = projection();
        let tenant_id = TenantId::new();
        let doctor_id = PartyId::new(AggregateId::new());
        let invoice_id = InvoiceId::new(AggregateId::new());

        p.apply_envelope(&envelope(
            &issued(tenant_id, invoice_id, doctor_id, 150_000),
            invoice_id,
            tenant_id,
            1,
        ))
        .unwrap();

        let cancel = InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            tenant_id,
            invoice_id,
            case_id: CaseId::new(AggregateId::new()),
            doctor_id,
            total_amount: 150_000,
            reason: None,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&cancel, invoice_id, tenant_id, 2)).unwrap();

        let b = p.get(tenant_id, &doctor_id).unwrap();
        assert_eq!(b.total_debt, 0);
        assert_eq!(b.total_invoiced, 0);
        assert_eq!(b.open_invoice_count, 0);
    }
}
