//! Expense read model.
//!
//! Also answers "is there already an expense for this purchase order?", the
//! guard the service layer consults before auto-recording a goods-received
//! expense.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use dentflow_accounting::{ExpenseCategory, ExpenseEvent, ExpenseId, ExpenseRow, ExpenseSource};
use dentflow_core::TenantId;
use dentflow_events::EventEnvelope;
use dentflow_purchasing::PurchaseOrderId;

use crate::projections::cursor::{self, CursorMap, ProjectionError};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseReadModel {
    pub expense_id: ExpenseId,
    pub category: ExpenseCategory,
    pub amount: u64,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub source: ExpenseSource,
}

impl ExpenseReadModel {
    pub fn to_report_row(&self) -> ExpenseRow {
        ExpenseRow {
            category: self.category,
            amount: self.amount,
            date: self.date,
        }
    }
}

#[derive(Debug)]
pub struct ExpensesProjection<S>
where
    S: TenantStore<ExpenseId, ExpenseReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> ExpensesProjection<S>
where
    S: TenantStore<ExpenseId, ExpenseReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, expense_id: &ExpenseId) -> Option<ExpenseReadModel> {
        self.store.get(tenant_id, expense_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ExpenseReadModel> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| a.date.cmp(&b.date));
        all
    }

    pub fn list_by_category(&self, tenant_id: TenantId, category: ExpenseCategory) -> Vec<ExpenseReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|rm| rm.category == category)
            .collect()
    }

    /// Duplicate guard for purchase-order-sourced expenses.
    pub fn find_by_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Option<ExpenseReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|rm| rm.purchase_order_id == Some(order_id))
    }

    pub fn report_rows(&self, tenant_id: TenantId) -> Vec<ExpenseRow> {
        self.list(tenant_id)
            .iter()
            .map(ExpenseReadModel::to_report_row)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "accounting.expense" {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let ExpenseEvent::ExpenseRecorded(e) = cursor::decode(envelope)?;

        if e.tenant_id != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if e.expense_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::TenantIsolation(
                "event expense_id does not match envelope aggregate_id".to_string(),
            ));
        }

        self.store.upsert(
            tenant_id,
            e.expense_id,
            ExpenseReadModel {
                expense_id: e.expense_id,
                category: e.category,
                amount: e.amount,
                date: e.date,
                reference: e.reference,
                purchase_order_id: e.purchase_order_id,
                source: e.source,
            },
        );

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
    use dentflow_accounting::ExpenseRecorded;
    use dentflow_core::AggregateId;
    use uuid::Uuid;

    fn envelope(ev: &ExpenseEvent, expense_id: ExpenseId, tenant_id: TenantId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            expense_id.0,
            "accounting.expense".to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn projection() -> ExpensesProjection<InMemoryTenantStore<ExpenseId, ExpenseReadModel>> {
        ExpensesProjection::new(InMemoryTenantStore::new())
    }

    #[test]
    fn records_and_finds_by_purchase_order() {
        let p = projection();
        let tenant_id = TenantId::new();
        let expense_id = ExpenseId::new(AggregateId::new());
        let order_id = PurchaseOrderId::new(AggregateId::new());

        let ev = ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
            tenant_id,
            expense_id,
            category: ExpenseCategory::Materials,
            amount: 80_000,
            date: Utc::now().date_naive(),
            reference: Some("PO-000001".to_string()),
            purchase_order_id: Some(order_id),
            source: ExpenseSource::PurchaseOrder,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(&ev, expense_id, tenant_id, 1)).unwrap();

        assert!(p.find_by_purchase_order(tenant_id, order_id).is_some());
        assert!(p
            .find_by_purchase_order(tenant_id, PurchaseOrderId::new(AggregateId::new()))
            .is_none());
        assert_eq!(p.list_by_category(tenant_id, ExpenseCategory::Materials).len(), 1);
        assert_eq!(p.report_rows(tenant_id).len(), 1);
    }
}
