use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use dentflow_cases::CaseId;
use dentflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use dentflow_events::Event;
use dentflow_parties::PartyId;
use dentflow_pricing::CostBreakdown;

/// Invoice identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How a payment was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Cheque,
}

/// Derived settlement state. Never stored; always a function of the amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Cancelled,
}

/// One settled payment against an invoice. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
}

/// Aggregate root: Invoice.
///
/// Amounts are in minor currency units. The issued totals never change after
/// issuance; only payments and cancellation mutate the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    invoice_number: String,
    case_id: Option<CaseId>,
    doctor_id: Option<PartyId>,
    breakdown: Option<CostBreakdown>,
    subtotal: u64,
    discount: u64,
    tax: u64,
    total_amount: u64,
    total_paid: u64,
    payments: Vec<Payment>,
    due_date: Option<NaiveDate>,
    issued_at: Option<DateTime<Utc>>,
    cancelled: bool,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            invoice_number: String::new(),
            case_id: None,
            doctor_id: None,
            breakdown: None,
            subtotal: 0,
            discount: 0,
            tax: 0,
            total_amount: 0,
            total_paid: 0,
            payments: Vec::new(),
            due_date: None,
            issued_at: None,
            cancelled: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn case_id(&self) -> Option<CaseId> {
        self.case_id
    }

    pub fn doctor_id(&self) -> Option<PartyId> {
        self.doctor_id
    }

    pub fn breakdown(&self) -> Option<&CostBreakdown> {
        self.breakdown.as_ref()
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

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Amount still owed. Guarded: `total_paid` can never exceed `total_amount`.
    pub fn remaining(&self) -> u64 {
        self.total_amount - self.total_paid
    }

    /// Settlement state derived from the amounts, never stored.
    pub fn payment_status(&self) -> PaymentStatus {
        if self.cancelled {
            PaymentStatus::Cancelled
        } else if self.total_paid == 0 {
            PaymentStatus::Unpaid
        } else if self.total_paid < self.total_amount {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Paid
        }
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice. The breakdown arrives pre-computed by the pricing
/// engine; discount and tax are applied here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub case_id: CaseId,
    pub doctor_id: PartyId,
    pub breakdown: CostBreakdown,
    pub discount: u64,
    pub tax: u64,
    pub due_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    RecordPayment(RecordPayment),
    CancelInvoice(CancelInvoice),
}

/// Event: InvoiceIssued. Carries the full derived amounts so projections
/// never recompute pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub case_id: CaseId,
    pub doctor_id: PartyId,
    pub breakdown: CostBreakdown,
    pub subtotal: u64,
    pub discount: u64,
    pub tax: u64,
    pub total_amount: u64,
    pub due_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub doctor_id: PartyId,
    pub amount: u64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub total_paid: u64,
    pub remaining: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub case_id: CaseId,
    pub doctor_id: PartyId,
    pub total_amount: u64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    PaymentRecorded(PaymentRecorded),
    InvoiceCancelled(InvoiceCancelled),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::PaymentRecorded(_) => "invoicing.invoice.payment_recorded",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::PaymentRecorded(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.invoice_number = e.invoice_number.clone();
                self.case_id = Some(e.case_id);
                self.doctor_id = Some(e.doctor_id);
                self.breakdown = Some(e.breakdown.clone());
                self.subtotal = e.subtotal;
                self.discount = e.discount;
                self.tax = e.tax;
                self.total_amount = e.total_amount;
                self.total_paid = 0;
                self.payments.clear();
                self.due_date = e.due_date;
                self.issued_at = Some(e.occurred_at);
                self.cancelled = false;
                self.created = true;
            }
            InvoiceEvent::PaymentRecorded(e) => {
                self.total_paid = e.total_paid;
                self.payments.push(Payment {
                    amount: e.amount,
                    method: e.method,
                    reference: e.reference.clone(),
                    paid_at: e.occurred_at,
                });
            }
            InvoiceEvent::InvoiceCancelled(_) => {
                self.cancelled = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::RecordPayment(cmd) => self.handle_payment(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Invoice {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if cmd.invoice_number.is_empty() {
            return Err(DomainError::validation("invoice_number must not be empty"));
        }

        let subtotal = cmd.breakdown.subtotal;
        let gross = subtotal
            .checked_add(cmd.tax)
            .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
        let total_amount = gross.checked_sub(cmd.discount).ok_or_else(|| {
            DomainError::validation("discount cannot exceed subtotal plus tax")
        })?;

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            invoice_number: cmd.invoice_number.clone(),
            case_id: cmd.case_id,
            doctor_id: cmd.doctor_id,
            breakdown: cmd.breakdown.clone(),
            subtotal,
            discount: cmd.discount,
            tax: cmd.tax,
            total_amount,
            due_date: cmd.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_payment(&self, cmd: &RecordPayment) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.cancelled {
            return Err(DomainError::conflict("invoice is cancelled"));
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

        let doctor_id = self
            .doctor_id
            .ok_or_else(|| DomainError::invariant("issued invoice has no doctor"))?;

        Ok(vec![InvoiceEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            doctor_id,
            amount: cmd.amount,
            method: cmd.method,
            reference: cmd.reference.clone(),
            total_paid,
            remaining: self.total_amount - total_paid,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.cancelled {
            return Err(DomainError::conflict("invoice is already cancelled"));
        }
        if self.total_paid > 0 {
            return Err(DomainError::conflict(
                "cannot cancel an invoice with recorded payments",
            ));
        }

        let case_id = self
            .case_id
            .ok_or_else(|| DomainError::invariant("issued invoice has no case"))?;
        let doctor_id = self
            .doctor_id
            .ok_or_else(|| DomainError::invariant("issued invoice has no doctor"))?;

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            case_id,
            doctor_id,
            total_amount: self.total_amount,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentflow_pricing::{
        calculate, PriceOverrides, PricingRule, Priority, WorkType,
    };
    use proptest::prelude::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn standard_breakdown() -> CostBreakdown {
        calculate(
            WorkType::Crown,
            "11,12,13",
            Priority::Normal,
            &PricingRule::default(),
            &PriceOverrides::default(),
        )
        .unwrap()
    }

    fn issue(tenant_id: TenantId, invoice_id: InvoiceId, discount: u64, tax: u64) -> Invoice {
        let mut invoice = Invoice::empty(invoice_id);
        let cmd = IssueInvoice {
            tenant_id,
            invoice_id,
            invoice_number: "INV-000001".to_string(),
            case_id: CaseId::new(AggregateId::new()),
            doctor_id: PartyId::new(AggregateId::new()),
            breakdown: standard_breakdown(),
            discount,
            tax,
            due_date: None,
            occurred_at: test_time(),
        };
        let events = invoice.handle(&InvoiceCommand::IssueInvoice(cmd)).unwrap();
        invoice.apply(&events[0]);
        invoice
    }

    fn pay(invoice: &mut Invoice, tenant_id: TenantId, amount: u64) -> Result<(), DomainError> {
        let cmd = RecordPayment {
            tenant_id,
            invoice_id: invoice.id_typed(),
            amount,
            method: PaymentMethod::Cash,
            reference: None,
            occurred_at: test_time(),
        };
        let events = invoice.handle(&InvoiceCommand::RecordPayment(cmd))?;
        invoice.apply(&events[0]);
        Ok(())
    }

    #[test]
    fn issue_computes_total_from_breakdown_discount_and_tax() {
        let invoice = issue(test_tenant_id(), test_invoice_id(), 25_000, 10_000);

        assert_eq!(invoice.subtotal(), 225_000);
        assert_eq!(invoice.total_amount(), 210_000);
        assert_eq!(invoice.remaining(), 210_000);
        assert_eq!(invoice.payment_status(), PaymentStatus::Unpaid);
    }

    #[test]
    fn discount_exceeding_subtotal_plus_tax_is_rejected() {
        let invoice = Invoice::empty(test_invoice_id());
        let cmd = IssueInvoice {
            tenant_id: test_tenant_id(),
            invoice_id: invoice.id_typed(),
            invoice_number: "INV-000002".to_string(),
            case_id: CaseId::new(AggregateId::new()),
            doctor_id: PartyId::new(AggregateId::new()),
            breakdown: standard_breakdown(),
            discount: 300_000,
            tax: 0,
            due_date: None,
            occurred_at: test_time(),
        };

        let err = invoice.handle(&InvoiceCommand::IssueInvoice(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn partial_payment_moves_status_to_partial() {
        let tenant_id = test_tenant_id();
        let mut invoice = issue(tenant_id, test_invoice_id(), 0, 0);

        pay(&mut invoice, tenant_id, 100_000).unwrap();

        assert_eq!(invoice.total_paid(), 100_000);
        assert_eq!(invoice.remaining(), 125_000);
        assert_eq!(invoice.payment_status(), PaymentStatus::Partial);
        assert_eq!(invoice.payments().len(), 1);
    }

    #[test]
    fn paying_to_full_flips_status_to_paid() {
        let tenant_id = test_tenant_id();
        let mut invoice = issue(tenant_id, test_invoice_id(), 0, 0);

        pay(&mut invoice, tenant_id, 100_000).unwrap();
        pay(&mut invoice, tenant_id, 125_000).unwrap();

        assert_eq!(invoice.remaining(), 0);
        assert_eq!(invoice.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn overpayment_is_rejected_and_state_unchanged() {
        let tenant_id = test_tenant_id();
        let mut invoice = issue(tenant_id, test_invoice_id(), 0, 0);
        pay(&mut invoice, tenant_id, 200_000).unwrap();

        let err = pay(&mut invoice, tenant_id, 25_001).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientRemaining(_)));
        assert_eq!(invoice.total_paid(), 200_000);
        assert_eq!(invoice.remaining(), 25_000);
        assert_eq!(invoice.payments().len(), 1);

        // The exact remaining amount is still accepted.
        pay(&mut invoice, tenant_id, 25_000).unwrap();
        assert_eq!(invoice.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn zero_payment_is_rejected() {
        let tenant_id = test_tenant_id();
        let mut invoice = issue(tenant_id, test_invoice_id(), 0, 0);

        let err = pay(&mut invoice, tenant_id, 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cancel_with_payments_is_rejected() {
        let tenant_id = test_tenant_id();
        let mut invoice = issue(tenant_id, test_invoice_id(), 0, 0);
        pay(&mut invoice, tenant_id, 1_000).unwrap();

        let cmd = CancelInvoice {
            tenant_id,
            invoice_id: invoice.id_typed(),
            reason: None,
            occurred_at: test_time(),
        };
        let err = invoice.handle(&InvoiceCommand::CancelInvoice(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn cancelled_invoice_rejects_payments_and_repeat_cancel() {
        let tenant_id = test_tenant_id();
        let mut invoice = issue(tenant_id, test_invoice_id(), 0, 0);

        let cmd = CancelInvoice {
            tenant_id,
            invoice_id: invoice.id_typed(),
            reason: Some("issued against wrong case".to_string()),
            occurred_at: test_time(),
        };
        let events = invoice.handle(&InvoiceCommand::CancelInvoice(cmd.clone())).unwrap();
        invoice.apply(&events[0]);

        assert_eq!(invoice.payment_status(), PaymentStatus::Cancelled);

        let err = pay(&mut invoice, tenant_id, 1_000).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = invoice.handle(&InvoiceCommand::CancelInvoice(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn payment_on_unknown_invoice_is_not_found() {
        let invoice = Invoice::empty(test_invoice_id());
        let cmd = RecordPayment {
            tenant_id: test_tenant_id(),
            invoice_id: invoice.id_typed(),
            amount: 1,
            method: PaymentMethod::Card,
            reference: None,
            occurred_at: test_time(),
        };

        let err = invoice.handle(&InvoiceCommand::RecordPayment(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    proptest! {
        // Ledger arithmetic: remaining always equals total minus paid, and
        // the paid amount always equals the sum of recorded payments.
        #[test]
        fn payment_arithmetic_holds(amounts in prop::collection::vec(1u64..50_000, 1..10)) {
            let tenant_id = test_tenant_id();
            let mut invoice = issue(tenant_id, test_invoice_id(), 0, 0);

            for amount in amounts {
                let _ = pay(&mut invoice, tenant_id, amount);
                prop_assert!(invoice.total_paid() <= invoice.total_amount());
                prop_assert_eq!(invoice.remaining(), invoice.total_amount() - invoice.total_paid());
                let sum: u64 = invoice.payments().iter().map(|p| p.amount).sum();
                prop_assert_eq!(sum, invoice.total_paid());
            }
        }
    }
}
