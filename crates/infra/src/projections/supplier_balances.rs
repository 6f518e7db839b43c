//! Per-supplier payables summary.

use serde_json::Value as JsonValue;

use dentflow_core::TenantId;
use dentflow_events::EventEnvelope;
use dentflow_parties::PartyId;
use dentflow_purchasing::{PoStatus, PurchaseOrderEvent, PurchaseOrderId};

use crate::projections::cursor::{self, CursorMap, ProjectionError};
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierBalance {
    pub supplier_id: PartyId,
    pub total_purchases: u64,
    pub total_paid: u64,
    /// Unpaid portion of all non-cancelled orders.
    pub balance: u64,
    pub order_count: u64,
}

impl SupplierBalance {
    fn zero(supplier_id: PartyId) -> Self {
        Self {
            supplier_id,
            total_purchases: 0,
            total_paid: 0,
            balance: 0,
            order_count: 0,
        }
    }
}

#[derive(Debug)]
pub struct SupplierBalancesProjection<S>
where
    S: TenantStore<PartyId, SupplierBalance>,
{
    store: S,
    cursors: CursorMap,
    /// `order -> (supplier, remaining)` so a cancellation can release the
    /// unpaid remainder without reloading the order stream.
    orders: InMemoryTenantStore<PurchaseOrderId, (PartyId, u64)>,
}

impl<S> SupplierBalancesProjection<S>
where
    S: TenantStore<PartyId, SupplierBalance>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
            orders: InMemoryTenantStore::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, supplier_id: &PartyId) -> Option<SupplierBalance> {
        self.store.get(tenant_id, supplier_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<SupplierBalance> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| b.balance.cmp(&a.balance));
        all
    }

    fn update(&self, tenant_id: TenantId, supplier_id: PartyId, f: impl FnOnce(&mut SupplierBalance)) {
        let mut balance = self
            .store
            .get(tenant_id, &supplier_id)
            .unwrap_or_else(|| SupplierBalance::zero(supplier_id));
        f(&mut balance);
        self.store.upsert(tenant_id, supplier_id, balance);
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

        let event_tenant = match &ev {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.tenant_id,
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => e.tenant_id,
            PurchaseOrderEvent::SupplierPaymentRecorded(e) => e.tenant_id,
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }

        match ev {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.update(tenant_id, e.supplier_id, |b| {
                    b.total_purchases = b.total_purchases.saturating_add(e.total_amount);
                    b.balance = b.balance.saturating_add(e.total_amount);
                    b.order_count += 1;
                });
                self.orders
                    .upsert(tenant_id, e.order_id, (e.supplier_id, e.total_amount));
            }
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => {
                if e.to_status == PoStatus::Cancelled {
                    if let Some((supplier_id, remaining)) = self.orders.get(tenant_id, &e.order_id) {
                        self.update(tenant_id, supplier_id, |b| {
                            b.total_purchases = b.total_purchases.saturating_sub(remaining);
                            b.balance = b.balance.saturating_sub(remaining);
                        });
                        self.orders.remove(tenant_id, &e.order_id);
                    }
                }
            }
            PurchaseOrderEvent::SupplierPaymentRecorded(e) => {
                self.update(tenant_id, e.supplier_id, |b| {
                    b.total_paid = b.total_paid.saturating_add(e.amount);
                    b.balance = b.balance.saturating_sub(e.amount);
                });
                if let Some((supplier_id, _)) = self.orders.get(tenant_id, &e.order_id) {
                    self.orders
                        .upsert(tenant_id, e.order_id, (supplier_id, e.remaining));
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
            self.orders.clear_tenant(t);
            self.cursors.clear_tenant(t);
        }
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
