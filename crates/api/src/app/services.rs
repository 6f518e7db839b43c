//! Infrastructure wiring: store, bus, dispatcher, projections, and the
//! cross-aggregate workflows (invoice-for-case, goods-received expense).

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use dentflow_accounting::{
    Expense, ExpenseCategory, ExpenseCommand, ExpenseId, ExpenseSource, RecordExpense,
};
use dentflow_cases::{Case, CaseCommand, CaseId, CaseStatus, Department, LinkInvoice, UnlinkInvoice};
use dentflow_core::{Aggregate, AggregateId, DomainError, TenantId};
use dentflow_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};
use dentflow_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{
        CaseReadModel, CasesProjection, DoctorBalance, DoctorBalancesProjection, ExpenseReadModel,
        ExpensesProjection, InvoiceReadModel, InvoicesProjection, PartiesProjection,
        PartyReadModel, PurchaseOrderReadModel, PurchaseOrdersProjection, SupplierBalance,
        SupplierBalancesProjection,
    },
    read_model::{InMemoryTenantStore, PricingRuleStore},
    sequence::SequenceAllocator,
};
use dentflow_invoicing::{
    Invoice, InvoiceCommand, InvoiceId, IssueInvoice, PaymentMethod as InvoicePaymentMethod,
    RecordPayment,
};
use dentflow_parties::{PartyId, PartyKind};
use dentflow_pricing::{calculate, CostBreakdown, PriceOverrides, PricingRule, Priority, WorkType};
use dentflow_purchasing::{PoStatus, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId};

type Dispatcher =
    CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

type Store<K, V> = Arc<InMemoryTenantStore<K, V>>;

pub struct AppServices {
    dispatcher: Dispatcher,
    event_store: Arc<InMemoryEventStore>,
    sequences: SequenceAllocator,
    pricing_rules: PricingRuleStore<Store<WorkType, PricingRule>>,
    cases: Arc<CasesProjection<Store<CaseId, CaseReadModel>>>,
    invoices: Arc<InvoicesProjection<Store<InvoiceId, InvoiceReadModel>>>,
    doctor_balances: Arc<DoctorBalancesProjection<Store<PartyId, DoctorBalance>>>,
    purchase_orders: Arc<PurchaseOrdersProjection<Store<PurchaseOrderId, PurchaseOrderReadModel>>>,
    supplier_balances: Arc<SupplierBalancesProjection<Store<PartyId, SupplierBalance>>>,
    expenses: Arc<ExpensesProjection<Store<ExpenseId, ExpenseReadModel>>>,
    parties: Arc<PartiesProjection<Store<PartyId, PartyReadModel>>>,
}

pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());

    let cases = Arc::new(CasesProjection::new(Arc::new(InMemoryTenantStore::new())));
    let invoices = Arc::new(InvoicesProjection::new(Arc::new(InMemoryTenantStore::new())));
    let doctor_balances = Arc::new(DoctorBalancesProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let purchase_orders = Arc::new(PurchaseOrdersProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let supplier_balances = Arc::new(SupplierBalancesProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let expenses = Arc::new(ExpensesProjection::new(Arc::new(InMemoryTenantStore::new())));
    let parties = Arc::new(PartiesProjection::new(Arc::new(InMemoryTenantStore::new())));

    // Background subscriber: bus -> projections.
    {
        let sub = bus.subscribe();
        let cases = cases.clone();
        let invoices = invoices.clone();
        let doctor_balances = doctor_balances.clone();
        let purchase_orders = purchase_orders.clone();
        let supplier_balances = supplier_balances.clone();
        let expenses = expenses.clone();
        let parties = parties.clone();
        tokio::task::spawn_blocking(move || loop {
            match sub.recv() {
                Ok(env) => {
                    let applied = match env.aggregate_type() {
                        "cases.case" => cases.apply_envelope(&env).map_err(|e| e.to_string()),
                        "invoicing.invoice" => invoices
                            .apply_envelope(&env)
                            .and_then(|_| doctor_balances.apply_envelope(&env))
                            .map_err(|e| e.to_string()),
                        "purchasing.order" => purchase_orders
                            .apply_envelope(&env)
                            .and_then(|_| supplier_balances.apply_envelope(&env))
                            .map_err(|e| e.to_string()),
                        "accounting.expense" => {
                            expenses.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        "parties.party" => parties.apply_envelope(&env).map_err(|e| e.to_string()),
                        _ => Ok(()),
                    };

                    if let Err(e) = applied {
                        tracing::warn!("projection apply failed: {e}");
                    }
                }
                Err(_) => break,
            }
        });
    }

    let dispatcher = CommandDispatcher::new(store.clone(), bus);

    AppServices {
        dispatcher,
        event_store: store,
        sequences: SequenceAllocator::new(),
        pricing_rules: PricingRuleStore::new(Arc::new(InMemoryTenantStore::new())),
        cases,
        invoices,
        doctor_balances,
        purchase_orders,
        supplier_balances,
        expenses,
        parties,
    }
}

impl AppServices {
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    pub fn event_store(&self) -> &Arc<InMemoryEventStore> {
        &self.event_store
    }

    pub fn next_case_number(&self, tenant_id: TenantId) -> String {
        self.sequences.next(tenant_id, SequenceAllocator::CASE_PREFIX)
    }

    pub fn next_invoice_number(&self, tenant_id: TenantId) -> String {
        self.sequences.next(tenant_id, SequenceAllocator::INVOICE_PREFIX)
    }

    pub fn next_po_number(&self, tenant_id: TenantId) -> String {
        self.sequences.next(tenant_id, SequenceAllocator::PURCHASE_ORDER_PREFIX)
    }

    // --- pricing --------------------------------------------------------

    pub fn pricing_rule(&self, tenant_id: TenantId, work_type: WorkType) -> PricingRule {
        self.pricing_rules.get_or_default(tenant_id, work_type)
    }

    pub fn put_pricing_rule(&self, tenant_id: TenantId, work_type: WorkType, rule: PricingRule) {
        self.pricing_rules.put(tenant_id, work_type, rule);
    }

    pub fn list_pricing_rules(&self, tenant_id: TenantId) -> Vec<(WorkType, PricingRule)> {
        self.pricing_rules.list_effective(tenant_id)
    }

    /// Derive the cost breakdown for a case with the tenant's effective rule.
    pub fn price_case(
        &self,
        tenant_id: TenantId,
        work_type: WorkType,
        teeth: &str,
        priority: Priority,
        overrides: &PriceOverrides,
    ) -> Result<CostBreakdown, DomainError> {
        let rule = self.pricing_rule(tenant_id, work_type);
        calculate(work_type, teeth, priority, &rule, overrides)
    }

    // --- projections ----------------------------------------------------

    pub fn cases_get(&self, tenant_id: TenantId, case_id: &CaseId) -> Option<CaseReadModel> {
        self.cases.get(tenant_id, case_id)
    }

    pub fn cases_list(&self, tenant_id: TenantId) -> Vec<CaseReadModel> {
        self.cases.list(tenant_id)
    }

    pub fn cases_by_status(&self, tenant_id: TenantId, status: CaseStatus) -> Vec<CaseReadModel> {
        self.cases.list_by_status(tenant_id, status)
    }

    pub fn cases_by_department(
        &self,
        tenant_id: TenantId,
        department: Department,
    ) -> Vec<CaseReadModel> {
        self.cases.list_by_department(tenant_id, department)
    }

    pub fn cases_by_doctor(&self, tenant_id: TenantId, doctor_id: PartyId) -> Vec<CaseReadModel> {
        self.cases.list_by_doctor(tenant_id, doctor_id)
    }

    pub fn invoices_get(&self, tenant_id: TenantId, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.invoices.get(tenant_id, invoice_id)
    }

    pub fn invoices_list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.invoices.list(tenant_id)
    }

    pub fn invoice_for_case(&self, tenant_id: TenantId, case_id: CaseId) -> Option<InvoiceReadModel> {
        self.invoices.find_by_case(tenant_id, case_id)
    }

    pub fn invoice_report_rows(&self, tenant_id: TenantId) -> Vec<dentflow_accounting::InvoiceRow> {
        self.invoices.report_rows(tenant_id)
    }

    pub fn doctor_balance(&self, tenant_id: TenantId, doctor_id: &PartyId) -> Option<DoctorBalance> {
        self.doctor_balances.get(tenant_id, doctor_id)
    }

    pub fn doctor_balances_list(&self, tenant_id: TenantId) -> Vec<DoctorBalance> {
        self.doctor_balances.list(tenant_id)
    }

    pub fn purchase_orders_get(
        &self,
        tenant_id: TenantId,
        order_id: &PurchaseOrderId,
    ) -> Option<PurchaseOrderReadModel> {
        self.purchase_orders.get(tenant_id, order_id)
    }

    pub fn purchase_orders_list(&self, tenant_id: TenantId) -> Vec<PurchaseOrderReadModel> {
        self.purchase_orders.list(tenant_id)
    }

    pub fn purchase_orders_by_supplier(
        &self,
        tenant_id: TenantId,
        supplier_id: PartyId,
    ) -> Vec<PurchaseOrderReadModel> {
        self.purchase_orders.list_by_supplier(tenant_id, supplier_id)
    }

    pub fn purchase_report_rows(&self, tenant_id: TenantId) -> Vec<dentflow_accounting::PurchaseRow> {
        self.purchase_orders.report_rows(tenant_id)
    }

    pub fn supplier_balance(&self, tenant_id: TenantId, supplier_id: &PartyId) -> Option<SupplierBalance> {
        self.supplier_balances.get(tenant_id, supplier_id)
    }

    pub fn supplier_balances_list(&self, tenant_id: TenantId) -> Vec<SupplierBalance> {
        self.supplier_balances.list(tenant_id)
    }

    pub fn expenses_list(&self, tenant_id: TenantId) -> Vec<ExpenseReadModel> {
        self.expenses.list(tenant_id)
    }

    pub fn expense_for_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Option<ExpenseReadModel> {
        self.expenses.find_by_purchase_order(tenant_id, order_id)
    }

    pub fn expenses_by_category(
        &self,
        tenant_id: TenantId,
        category: ExpenseCategory,
    ) -> Vec<ExpenseReadModel> {
        self.expenses.list_by_category(tenant_id, category)
    }

    pub fn expense_report_rows(&self, tenant_id: TenantId) -> Vec<dentflow_accounting::ExpenseRow> {
        self.expenses.report_rows(tenant_id)
    }

    pub fn parties_get(&self, tenant_id: TenantId, party_id: &PartyId) -> Option<PartyReadModel> {
        self.parties.get(tenant_id, party_id)
    }

    pub fn parties_list(&self, tenant_id: TenantId, kind: PartyKind) -> Vec<PartyReadModel> {
        self.parties.list(tenant_id, kind)
    }

    // --- cross-aggregate workflows --------------------------------------

    /// Issue an invoice for a case.
    ///
    /// The case aggregate is the gatekeeper: linking fails unless the case
    /// passed QC and has no invoice yet. The link is dispatched first so two
    /// racing requests cannot both issue; if issuing then fails, the link is
    /// compensated away.
    pub fn create_invoice_for_case(
        &self,
        tenant_id: TenantId,
        case_id: CaseId,
        doctor_id: PartyId,
        breakdown: CostBreakdown,
        discount: u64,
        tax: u64,
        due_date: Option<chrono::NaiveDate>,
    ) -> Result<(InvoiceId, String, Vec<StoredEvent>), DispatchError> {
        let invoice_agg = AggregateId::new();
        let invoice_id = InvoiceId::new(invoice_agg);

        self.dispatch::<Case>(
            tenant_id,
            case_id.0,
            "cases.case",
            CaseCommand::LinkInvoice(LinkInvoice {
                tenant_id,
                case_id,
                invoice_id: invoice_agg,
                occurred_at: Utc::now(),
            }),
            |_, id| Case::empty(CaseId::new(id)),
        )?;

        let invoice_number = self.next_invoice_number(tenant_id);
        let issued = self.dispatch::<Invoice>(
            tenant_id,
            invoice_agg,
            "invoicing.invoice",
            InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                invoice_number: invoice_number.clone(),
                case_id,
                doctor_id,
                breakdown,
                discount,
                tax,
                due_date,
                occurred_at: Utc::now(),
            }),
            |_, id| Invoice::empty(InvoiceId::new(id)),
        );

        match issued {
            Ok(committed) => Ok((invoice_id, invoice_number, committed)),
            Err(e) => {
                // Roll the link back so the case can be invoiced again.
                let unlink = self.dispatch::<Case>(
                    tenant_id,
                    case_id.0,
                    "cases.case",
                    CaseCommand::UnlinkInvoice(UnlinkInvoice {
                        tenant_id,
                        case_id,
                        occurred_at: Utc::now(),
                    }),
                    |_, id| Case::empty(CaseId::new(id)),
                );
                if let Err(unlink_err) = unlink {
                    tracing::warn!("failed to unlink invoice after issue failure: {unlink_err:?}");
                }
                Err(e)
            }
        }
    }

    /// Cancel an invoice and free its case for re-invoicing.
    pub fn cancel_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        reason: Option<String>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed = self.dispatch::<Invoice>(
            tenant_id,
            invoice_id.0,
            "invoicing.invoice",
            InvoiceCommand::CancelInvoice(dentflow_invoicing::CancelInvoice {
                tenant_id,
                invoice_id,
                reason,
                occurred_at: Utc::now(),
            }),
            |_, id| Invoice::empty(InvoiceId::new(id)),
        )?;

        // The cancelled event carries the case id; unlink so the case can be
        // invoiced again. Payloads are stored as the full event enum, so
        // decode that and pick the variant out; a decode failure here means
        // the stream is corrupt and must not be papered over.
        for stored in &committed {
            if stored.event_type != "invoicing.invoice.cancelled" {
                continue;
            }
            let event: dentflow_invoicing::InvoiceEvent =
                serde_json::from_value(stored.payload.clone())
                    .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            let dentflow_invoicing::InvoiceEvent::InvoiceCancelled(cancelled) = event else {
                continue;
            };
            self.dispatch::<Case>(
                tenant_id,
                cancelled.case_id.0,
                "cases.case",
                CaseCommand::UnlinkInvoice(UnlinkInvoice {
                    tenant_id,
                    case_id: cancelled.case_id,
                    occurred_at: Utc::now(),
                }),
                |_, id| Case::empty(CaseId::new(id)),
            )?;
        }

        Ok(committed)
    }

    pub fn record_invoice_payment(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        amount: u64,
        method: InvoicePaymentMethod,
        reference: Option<String>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatch::<Invoice>(
            tenant_id,
            invoice_id.0,
            "invoicing.invoice",
            InvoiceCommand::RecordPayment(RecordPayment {
                tenant_id,
                invoice_id,
                amount,
                method,
                reference,
                occurred_at: Utc::now(),
            }),
            |_, id| Invoice::empty(InvoiceId::new(id)),
        )
    }

    /// Change a purchase order's status; receiving goods books a materials
    /// expense exactly once.
    pub fn change_po_status(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        to_status: PoStatus,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed = self.dispatch::<PurchaseOrder>(
            tenant_id,
            order_id.0,
            "purchasing.order",
            PurchaseOrderCommand::ChangeStatus(dentflow_purchasing::ChangeStatus {
                tenant_id,
                order_id,
                to_status,
                occurred_at: Utc::now(),
            }),
            |_, id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )?;

        if to_status == PoStatus::Received {
            self.record_goods_received_expense(tenant_id, order_id, &committed)?;
        }

        Ok(committed)
    }

    /// Stream id for the expense booked when `order_id` is received.
    ///
    /// Derived from the order id, so every booking attempt for the same order
    /// lands on the same expense stream and the second one conflicts in the
    /// aggregate. Duplicate protection does not depend on the (eventually
    /// consistent) expense projection having caught up.
    fn goods_received_expense_id(order_id: PurchaseOrderId) -> AggregateId {
        AggregateId::from_uuid(Uuid::new_v5(order_id.0.as_uuid(), b"goods-received-expense"))
    }

    /// Book the materials expense for a received order by hand.
    ///
    /// Covers an automatic booking that never landed without opening a
    /// double-booking hole.
    pub fn book_po_expense(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let Some(order) = self.purchase_orders.get(tenant_id, &order_id) else {
            return Err(DispatchError::Domain(DomainError::not_found()));
        };
        if order.status != PoStatus::Received {
            return Err(DispatchError::Domain(DomainError::precondition(
                "expense can only be booked for a received order",
            )));
        }
        if self.expenses.find_by_purchase_order(tenant_id, order_id).is_some() {
            return Err(DispatchError::Domain(DomainError::conflict(
                "an expense already references this purchase order",
            )));
        }

        let expense_agg = Self::goods_received_expense_id(order_id);
        self.dispatch::<Expense>(
            tenant_id,
            expense_agg,
            "accounting.expense",
            ExpenseCommand::RecordExpense(RecordExpense {
                tenant_id,
                expense_id: ExpenseId::new(expense_agg),
                category: ExpenseCategory::Materials,
                amount: order.total_amount,
                date: Utc::now().date_naive(),
                reference: Some(order.po_number.clone()),
                purchase_order_id: Some(order_id),
                source: ExpenseSource::PurchaseOrder,
                occurred_at: Utc::now(),
            }),
            |_, id| Expense::empty(ExpenseId::new(id)),
        )
    }

    /// `received` is terminal in the order lifecycle, so this runs at most
    /// once per normal flow; the order-derived expense stream id turns any
    /// replay into an aggregate conflict, which is treated as already booked.
    fn record_goods_received_expense(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        committed: &[StoredEvent],
    ) -> Result<(), DispatchError> {
        let mut status_changed = None;
        for stored in committed {
            let event: dentflow_purchasing::PurchaseOrderEvent =
                serde_json::from_value(stored.payload.clone())
                    .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            if let dentflow_purchasing::PurchaseOrderEvent::PurchaseOrderStatusChanged(changed) =
                event
            {
                status_changed = Some(changed);
            }
        }
        let Some(status_changed) = status_changed else {
            return Ok(());
        };

        let expense_agg = Self::goods_received_expense_id(order_id);
        let expense = self.dispatch::<Expense>(
            tenant_id,
            expense_agg,
            "accounting.expense",
            ExpenseCommand::RecordExpense(RecordExpense {
                tenant_id,
                expense_id: ExpenseId::new(expense_agg),
                category: ExpenseCategory::Materials,
                amount: status_changed.total_amount,
                date: Utc::now().date_naive(),
                reference: Some(status_changed.po_number.clone()),
                purchase_order_id: Some(order_id),
                source: ExpenseSource::PurchaseOrder,
                occurred_at: Utc::now(),
            }),
            |_, id| Expense::empty(ExpenseId::new(id)),
        );

        match expense {
            Ok(_) => Ok(()),
            Err(DispatchError::Domain(DomainError::Conflict(_))) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
