use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use dentflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, TransitionTable};
use dentflow_events::Event;
use dentflow_parties::PartyId;

/// Purchase order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoStatus {
    Draft,
    Sent,
    Partial,
    Received,
    Cancelled,
}

/// The order lifecycle graph. Same discipline as the case workflow: every
/// status change is edge-checked, `received` and `cancelled` are terminal.
pub static PO_LIFECYCLE: TransitionTable<PoStatus> = TransitionTable::new(&[
    (PoStatus::Draft, &[PoStatus::Sent, PoStatus::Cancelled]),
    (
        PoStatus::Sent,
        &[PoStatus::Partial, PoStatus::Received, PoStatus::Cancelled],
    ),
    (
        PoStatus::Partial,
        &[PoStatus::Received, PoStatus::Cancelled],
    ),
    (PoStatus::Received, &[]),
    (PoStatus::Cancelled, &[]),
]);

/// How a supplier payment was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Cheque,
}

/// Caller-supplied order line. Totals are derived, never trusted from input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub description: String,
    pub quantity: u32,
    /// Price in minor units.
    pub unit_price: u64,
}

/// Stored order line with its derived total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: u64,
    pub total: u64,
}

/// One settled payment to the supplier. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierPayment {
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
}

/// Aggregate root: PurchaseOrder. Amounts are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    po_number: String,
    supplier_id: Option<PartyId>,
    lines: Vec<OrderLine>,
    subtotal: u64,
    discount: u64,
    tax: u64,
    total_amount: u64,
    total_paid: u64,
    payments: Vec<SupplierPayment>,
    status: PoStatus,
    expected_delivery: Option<NaiveDate>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            po_number: String::new(),
            supplier_id: None,
            lines: Vec::new(),
            subtotal: 0,
            discount: 0,
            tax: 0,
            total_amount: 0,
            total_paid: 0,
            payments: Vec::new(),
            status: PoStatus::Draft,
            expected_delivery: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn po_number(&self) -> &str {
        &self.po_number
    }

    pub fn supplier_id(&self) -> Option<PartyId> {
        self.supplier_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> u64 {
        self.subtotal
    }

    pub fn discount(&self) -> u64 {
        self.discount
    }

    pub fn tax(&self) -> u64 {
        self.tax
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn total_paid(&self) -> u64 {
        self.total_paid
    }

    pub fn payments(&self) -> &[SupplierPayment] {
        &self.payments
    }

    pub fn status(&self) -> PoStatus {
        self.status
    }

    pub fn expected_delivery(&self) -> Option<NaiveDate> {
        self.expected_delivery
    }

    /// Amount still owed. Guarded: `total_paid` can never exceed `total_amount`.
    pub fn remaining(&self) -> u64 {
        self.total_amount - self.total_paid
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub supplier_id: PartyId,
    pub lines: Vec<OrderLineInput>,
    pub discount: u64,
    pub tax: u64,
    pub expected_delivery: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus (edge-checked against [`PO_LIFECYCLE`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub to_status: PoStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordSupplierPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSupplierPayment {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    ChangeStatus(ChangeStatus),
    RecordSupplierPayment(RecordSupplierPayment),
}

/// Event: PurchaseOrderCreated. Carries derived amounts for projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub supplier_id: PartyId,
    pub lines: Vec<OrderLine>,
    pub subtotal: u64,
    pub discount: u64,
    pub tax: u64,
    pub total_amount: u64,
    pub expected_delivery: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderStatusChanged. The expense projection watches for the
/// edge into `received`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderStatusChanged {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub from_status: PoStatus,
    pub to_status: PoStatus,
    pub total_amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierPaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierPaymentRecorded {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub supplier_id: PartyId,
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub total_paid: u64,
    pub remaining: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderStatusChanged(PurchaseOrderStatusChanged),
    SupplierPaymentRecorded(SupplierPaymentRecorded),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderStatusChanged(_) => "purchasing.order.status_changed",
            PurchaseOrderEvent::SupplierPaymentRecorded(_) => "purchasing.order.payment_recorded",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => e.occurred_at,
            PurchaseOrderEvent::SupplierPaymentRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.po_number = e.po_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.lines = e.lines.clone();
                self.subtotal = e.subtotal;
                self.discount = e.discount;
                self.tax = e.tax;
                self.total_amount = e.total_amount;
                self.total_paid = 0;
                self.payments.clear();
                self.status = PoStatus::Draft;
                self.expected_delivery = e.expected_delivery;
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => {
                self.status = e.to_status;
            }
            PurchaseOrderEvent::SupplierPaymentRecorded(e) => {
                self.total_paid = e.total_paid;
                self.payments.push(SupplierPayment {
                    amount: e.amount,
                    method: e.method,
                    reference: e.reference.clone(),
                    paid_at: e.occurred_at,
                });
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            PurchaseOrderCommand::RecordSupplierPayment(cmd) => self.handle_payment(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.po_number.is_empty() {
            return Err(DomainError::validation("po_number must not be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("purchase order needs at least one line"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut subtotal: u64 = 0;
        for line in &cmd.lines {
            if line.quantity == 0 {
                return Err(DomainError::validation("line quantity must be positive"));
            }
            let total = u64::from(line.quantity)
                .checked_mul(line.unit_price)
                .ok_or_else(|| DomainError::invariant("line total overflow"))?;
            subtotal = subtotal
                .checked_add(total)
                .ok_or_else(|| DomainError::invariant("subtotal overflow"))?;
            lines.push(OrderLine {
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total,
            });
        }

        let gross = subtotal
            .checked_add(cmd.tax)
            .ok_or_else(|| DomainError::invariant("order total overflow"))?;
        let total_amount = gross.checked_sub(cmd.discount).ok_or_else(|| {
            DomainError::validation("discount cannot exceed subtotal plus tax")
        })?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(PurchaseOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            po_number: cmd.po_number.clone(),
            supplier_id: cmd.supplier_id,
            lines,
            subtotal,
            discount: cmd.discount,
            tax: cmd.tax,
            total_amount,
            expected_delivery: cmd.expected_delivery,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        PO_LIFECYCLE.check(self.status, cmd.to_status)?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderStatusChanged(
            PurchaseOrderStatusChanged {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                po_number: self.po_number.clone(),
                from_status: self.status,
                to_status: cmd.to_status,
                total_amount: self.total_amount,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_payment(&self, cmd: &RecordSupplierPayment) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status == PoStatus::Cancelled {
            return Err(DomainError::conflict("purchase order is cancelled"));
        }
        if cmd.amount == 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        let remaining = self.remaining();
        if cmd.amount > remaining {
            return Err(DomainError::insufficient_remaining(format!(
                "payment of {} exceeds remaining balance of {}",
                cmd.amount, remaining
            )));
        }

        // Guarded above, so this cannot exceed total_amount.
        let total_paid = self.total_paid + cmd.amount;

        let supplier_id = self
            .supplier_id
            .ok_or_else(|| DomainError::invariant("created order has no supplier"))?;

        Ok(vec![PurchaseOrderEvent::SupplierPaymentRecorded(
            SupplierPaymentRecorded {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                supplier_id,
                amount: cmd.amount,
                method: cmd.method,
                reference: cmd.reference.clone(),
                total_paid,
                remaining: self.total_amount - total_paid,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_order_id() -> PurchaseOrderId {
        PurchaseOrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created(tenant_id: TenantId, order_id: PurchaseOrderId) -> PurchaseOrder {
        let mut order = PurchaseOrder::empty(order_id);
        let cmd = CreatePurchaseOrder {
            tenant_id,
            order_id,
            po_number: "PO-000001".to_string(),
            supplier_id: PartyId::new(AggregateId::new()),
            lines: vec![
                OrderLineInput {
                    description: "zirconia blocks".to_string(),
                    quantity: 10,
                    unit_price: 8_000,
                },
                OrderLineInput {
                    description: "milling burs".to_string(),
                    quantity: 4,
                    unit_price: 5_000,
                },
            ],
            discount: 10_000,
            tax: 10_000,
            expected_delivery: None,
            occurred_at: test_time(),
        };
        let events = order.handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd)).unwrap();
        order.apply(&events[0]);
        order
    }

    fn change(order: &mut PurchaseOrder, tenant_id: TenantId, to: PoStatus) -> Result<(), DomainError> {
        let cmd = ChangeStatus {
            tenant_id,
            order_id: order.id_typed(),
            to_status: to,
            occurred_at: test_time(),
        };
        let events = order.handle(&PurchaseOrderCommand::ChangeStatus(cmd))?;
        order.apply(&events[0]);
        Ok(())
    }

    fn pay(order: &mut PurchaseOrder, tenant_id: TenantId, amount: u64) -> Result<(), DomainError> {
        let cmd = RecordSupplierPayment {
            tenant_id,
            order_id: order.id_typed(),
            amount,
            method: PaymentMethod::BankTransfer,
            reference: None,
            occurred_at: test_time(),
        };
        let events = order.handle(&PurchaseOrderCommand::RecordSupplierPayment(cmd))?;
        order.apply(&events[0]);
        Ok(())
    }

    #[test]
    fn create_derives_line_totals_and_order_total() {
        let order = created(test_tenant_id(), test_order_id());

        assert_eq!(order.lines()[0].total, 80_000);
        assert_eq!(order.lines()[1].total, 20_000);
        assert_eq!(order.subtotal(), 100_000);
        // total = subtotal + tax - discount
        assert_eq!(order.total_amount(), 100_000);
        assert_eq!(order.status(), PoStatus::Draft);
    }

    #[test]
    fn create_rejects_empty_lines_and_zero_quantity() {
        let order = PurchaseOrder::empty(test_order_id());
        let mut cmd = CreatePurchaseOrder {
            tenant_id: test_tenant_id(),
            order_id: order.id_typed(),
            po_number: "PO-000002".to_string(),
            supplier_id: PartyId::new(AggregateId::new()),
            lines: vec![],
            discount: 0,
            tax: 0,
            expected_delivery: None,
            occurred_at: test_time(),
        };

        let err = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        cmd.lines = vec![OrderLineInput {
            description: "plaster".to_string(),
            quantity: 0,
            unit_price: 100,
        }];
        let err = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lifecycle_follows_the_graph() {
        let tenant_id = test_tenant_id();
        let mut order = created(tenant_id, test_order_id());

        change(&mut order, tenant_id, PoStatus::Sent).unwrap();
        change(&mut order, tenant_id, PoStatus::Partial).unwrap();
        change(&mut order, tenant_id, PoStatus::Received).unwrap();
        assert_eq!(order.status(), PoStatus::Received);
    }

    #[test]
    fn illegal_edges_are_rejected() {
        let tenant_id = test_tenant_id();
        let mut order = created(tenant_id, test_order_id());

        // draft cannot jump straight to received
        let err = change(&mut order, tenant_id, PoStatus::Received).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        change(&mut order, tenant_id, PoStatus::Sent).unwrap();
        change(&mut order, tenant_id, PoStatus::Received).unwrap();

        // received is terminal: even received -> received is a no-edge
        let err = change(&mut order, tenant_id, PoStatus::Received).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert!(PO_LIFECYCLE.is_terminal(PoStatus::Received));
        assert!(PO_LIFECYCLE.is_terminal(PoStatus::Cancelled));
    }

    #[test]
    fn overpayment_is_rejected_and_state_unchanged() {
        let tenant_id = test_tenant_id();
        let mut order = created(tenant_id, test_order_id());

        pay(&mut order, tenant_id, 60_000).unwrap();
        let err = pay(&mut order, tenant_id, 40_001).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientRemaining(_)));
        assert_eq!(order.total_paid(), 60_000);
        assert_eq!(order.remaining(), 40_000);

        pay(&mut order, tenant_id, 40_000).unwrap();
        assert_eq!(order.remaining(), 0);
        assert_eq!(order.payments().len(), 2);
    }

    #[test]
    fn cancelled_order_rejects_payments() {
        let tenant_id = test_tenant_id();
        let mut order = created(tenant_id, test_order_id());
        change(&mut order, tenant_id, PoStatus::Cancelled).unwrap();

        let err = pay(&mut order, tenant_id, 1_000).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    proptest! {
        // Ledger arithmetic: remaining always equals total minus paid.
        #[test]
        fn payment_arithmetic_holds(amounts in prop::collection::vec(1u64..30_000, 1..10)) {
            let tenant_id = test_tenant_id();
            let mut order = created(tenant_id, test_order_id());

            for amount in amounts {
                let _ = pay(&mut order, tenant_id, amount);
                prop_assert!(order.total_paid() <= order.total_amount());
                prop_assert_eq!(order.remaining(), order.total_amount() - order.total_paid());
                let sum: u64 = order.payments().iter().map(|p| p.amount).sum();
                prop_assert_eq!(sum, order.total_paid());
            }
        }
    }
}
