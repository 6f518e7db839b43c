//! Invoice read model: header, derived status, payment history.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use dentflow_accounting::{InvoiceRow, PaymentRow};
use dentflow_cases::CaseId;
use dentflow_core::TenantId;
use dentflow_events::EventEnvelope;
use dentflow_invoicing::{InvoiceEvent, InvoiceId, PaymentMethod, PaymentStatus};
use dentflow_parties::PartyId;
use dentflow_pricing::WorkType;

use crate::projections::cursor::{self, CursorMap, ProjectionError};
use crate::read_model::TenantStore;

/// One settled payment as shown on the invoice detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoicePaymentRow {
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub case_id: CaseId,
    pub doctor_id: PartyId,
    pub work_type: WorkType,
    pub subtotal: u64,
    pub discount: u64,
    pub tax: u64,
    pub total_amount: u64,
    pub materials_cost: u64,
    pub labor_cost: u64,
    pub total_paid: u64,
    pub status: PaymentStatus,
    pub cancelled: bool,
    pub issued_on: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub payments: Vec<InvoicePaymentRow>,
}

impl InvoiceReadModel {
    pub fn remaining(&self) -> u64 {
        self.total_amount.saturating_sub(self.total_paid)
    }

    /// Flatten into the fact row consumed by the financial reports.
    pub fn to_report_row(&self) -> InvoiceRow {
        InvoiceRow {
            invoice_number: self.invoice_number.clone(),
            work_type: self.work_type,
            total_amount: self.total_amount,
            total_paid: self.total_paid,
            materials_cost: self.materials_cost,
            labor_cost: self.labor_cost,
            cancelled: self.cancelled,
            issued_on: self.issued_on,
            due_date: self.due_date,
            payments: self
                .payments
                .iter()
                .map(|p| PaymentRow {
                    date: p.date,
                    amount: p.amount,
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(tenant_id, invoice_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| a.invoice_number.cmp(&b.invoice_number));
        all
    }

    pub fn find_by_case(&self, tenant_id: TenantId, case_id: CaseId) -> Option<InvoiceReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|rm| rm.case_id == case_id)
    }

    /// Fact rows for the accounting reports (includes cancelled invoices;
    /// the report functions decide what to skip).
    pub fn report_rows(&self, tenant_id: TenantId) -> Vec<InvoiceRow> {
        self.list(tenant_id)
            .iter()
            .map(InvoiceReadModel::to_report_row)
            .collect()
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

        let (event_tenant, invoice_id) = match &ev {
            InvoiceEvent::InvoiceIssued(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::PaymentRecorded(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::InvoiceCancelled(e) => (e.tenant_id, e.invoice_id),
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if invoice_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::TenantIsolation(
                "event invoice_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    tenant_id,
                    e.invoice_id,
                    InvoiceReadModel {
                        invoice_id: e.invoice_id,
                        invoice_number: e.invoice_number,
                        case_id: e.case_id,
                        doctor_id: e.doctor_id,
                        work_type: e.breakdown.work_type,
                        subtotal: e.subtotal,
                        discount: e.discount,
                        tax: e.tax,
                        total_amount: e.total_amount,
                        materials_cost: e.breakdown.materials_cost,
                        labor_cost: e.breakdown.labor_cost,
                        total_paid: 0,
                        status: PaymentStatus::Unpaid,
                        cancelled: false,
                        issued_on: e.occurred_at.date_naive(),
                        due_date: e.due_date,
                        payments: vec![],
                    },
                );
            }
            InvoiceEvent::PaymentRecorded(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.total_paid = e.total_paid;
                    rm.status = if rm.total_paid >= rm.total_amount {
                        PaymentStatus::Paid
                    } else {
                        PaymentStatus::Partial
                    };
                    rm.payments.push(InvoicePaymentRow {
                        amount: e.amount,
                        method: e.method,
                        reference: e.reference,
                        date: e.occurred_at.date_naive(),
                    });
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
            InvoiceEvent::InvoiceCancelled(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.cancelled = true;
                    rm.status = PaymentStatus::Cancelled;
                    self.store.upsert(tenant_id, e.invoice_id, rm);
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
