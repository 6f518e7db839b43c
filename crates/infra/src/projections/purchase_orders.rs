//! Purchase order read model: header, lines, lifecycle position, payments.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use dentflow_accounting::PurchaseRow;
use dentflow_core::TenantId;
use dentflow_events::EventEnvelope;
use dentflow_parties::PartyId;
use dentflow_purchasing::{OrderLine, PaymentMethod, PoStatus, PurchaseOrderEvent, PurchaseOrderId};

use crate::projections::cursor::{self, CursorMap, ProjectionError};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierPaymentRow {
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderReadModel {
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub supplier_id: PartyId,
    pub lines: Vec<OrderLine>,
    pub subtotal: u64,
    pub discount: u64,
    pub tax: u64,
    pub total_amount: u64,
    pub total_paid: u64,
    pub status: PoStatus,
    pub expected_delivery: Option<NaiveDate>,
    pub created_on: NaiveDate,
    pub payments: Vec<SupplierPaymentRow>,
}

impl PurchaseOrderReadModel {
    pub fn remaining(&self) -> u64 {
        self.total_amount.saturating_sub(self.total_paid)
    }

    pub fn to_report_row(&self) -> PurchaseRow {
        PurchaseRow {
            po_number: self.po_number.clone(),
            total_amount: self.total_amount,
            total_paid: self.total_paid,
            cancelled: self.status == PoStatus::Cancelled,
            created_on: self.created_on,
        }
    }
}

#[derive(Debug)]
pub struct PurchaseOrdersProjection<S>
where
    S: TenantStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> PurchaseOrdersProjection<S>
where
    S: TenantStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, order_id: &PurchaseOrderId) -> Option<PurchaseOrderReadModel> {
        self.store.get(tenant_id, order_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<PurchaseOrderReadModel> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| a.po_number.cmp(&b.po_number));
        all
    }

    pub fn list_by_supplier(&self, tenant_id: TenantId, supplier_id: PartyId) -> Vec<PurchaseOrderReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.supplier_id == supplier_id)
            .collect()
    }

    pub fn report_rows(&self, tenant_id: TenantId) -> Vec<PurchaseRow> {
        self.list(tenant_id)
            .iter()
            .map(PurchaseOrderReadModel::to_report_row)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "purchasing.order" {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let ev: PurchaseOrderEvent = cursor::decode(envelope)?;

        let (event_tenant, order_id) = match &ev {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => (e.tenant_id, e.order_id),
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => (e.tenant_id, e.order_id),
            PurchaseOrderEvent::SupplierPaymentRecorded(e) => (e.tenant_id, e.order_id),
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if order_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::TenantIsolation(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.order_id,
                    PurchaseOrderReadModel {
                        order_id: e.order_id,
                        po_number: e.po_number,
                        supplier_id: e.supplier_id,
                        lines: e.lines,
                        subtotal: e.subtotal,
                        discount: e.discount,
                        tax: e.tax,
                        total_amount: e.total_amount,
                        total_paid: 0,
                        status: PoStatus::Draft,
                        expected_delivery: e.expected_delivery,
                        created_on: e.occurred_at.date_naive(),
                        payments: vec![],
                    },
                );
            }
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.order_id) {
                    rm.status = e.to_status;
                    self.store.upsert(tenant_id, e.order_id, rm);
                }
            }
            PurchaseOrderEvent::SupplierPaymentRecorded(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.order_id) {
                    rm.total_paid = e.total_paid;
                    rm.payments.push(SupplierPaymentRow {
                        amount: e.amount,
                        method: e.method,
                        reference: e.reference,
                        date: e.occurred_at.date_naive(),
                    });
                    self.store.upsert(tenant_id, e.order_id, rm);
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
    use dentflow_purchasing::{PurchaseOrderCreated, PurchaseOrderStatusChanged, SupplierPaymentRecorded};
    use uuid::Uuid;

    fn envelope(ev: &PurchaseOrderEvent, order_id: PurchaseOrderId, tenant_id: TenantId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            order_id.0,
            "purchasing.order".to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn projection() -> PurchaseOrdersProjection<InMemoryTenantStore<PurchaseOrderId, PurchaseOrderReadModel>> {
        PurchaseOrdersProjection::new(InMemoryTenantStore::new())
    }

    fn created(tenant_id: TenantId, order_id: PurchaseOrderId, supplier_id: PartyId) -> PurchaseOrderEvent {
        PurchaseOrderEvent::PurchaseOrderCreated(PurchaseOrderCreated {
            tenant_id,
            order_id,
            po_number: "PO-000001".to_string(),
            supplier_id,
            lines: vec![OrderLine {
                description: "zirconia discs".to_string(),
                quantity: 4,
                unit_price: 20_000,
                total: 80_000,
            }],
            subtotal: 80_000,
            discount: 0,
            tax: 0,
            total_amount: 80_000,
            expected_delivery: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn lifecycle_and_payments_are_tracked() {
        let p = projection();
        let tenant_id = TenantId::new();
        let order_id = PurchaseOrderId::new(AggregateId::new());
        let supplier_id = PartyId::new(AggregateId::new());

        p.apply_envelope(&envelope(&created(tenant_id, order_id, supplier_id), order_id, tenant_id, 1))
            .unwrap();
        assert_eq!(p.get(tenant_id, &order_id).unwrap().status, PoStatus::Draft);

        let sent = PurchaseOrderEvent::PurchaseOrderStatusChanged(PurchaseOrderStatusChanged {
            tenant_id,
            order_id,
            po_number: "PO-000001".to_string(),
            from_status: PoStatus::Draft,
            to_status: PoStatus::Sent,
            total_amount: 80_000,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&sent, order_id, tenant_id, 2)).unwrap();

        let pay = PurchaseOrderEvent::SupplierPaymentRecorded(SupplierPaymentRecorded {
            tenant_id,
            order_id,
            supplier_id,
            amount: 30_000,
            method: PaymentMethod::Cash,
            reference: None,
            total_paid: 30_000,
            remaining: 50_000,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&pay, order_id, tenant_id, 3)).unwrap();

        let rm = p.get(tenant_id, &order_id).unwrap();
        assert_eq!(rm.status, PoStatus::Sent);
        assert_eq!(rm.total_paid, 30_000);
        assert_eq!(rm.remaining(), 50_000);
        assert_eq!(rm.payments.len(), 1);
        assert_eq!(p.list_by_supplier(tenant_id, supplier_id).len(), 1);
    }
}
