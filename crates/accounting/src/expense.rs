use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use dentflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use dentflow_events::Event;
use dentflow_purchasing::PurchaseOrderId;

/// Expense identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(pub AggregateId);

impl ExpenseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Expense category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Maintenance,
    Salaries,
    Marketing,
    Transport,
    Materials,
    Other,
}

/// Categories counted as overhead by the cost-analysis report. Materials are
/// tracked through purchase orders, so they are excluded here.
pub const OVERHEAD_CATEGORIES: [ExpenseCategory; 6] = [
    ExpenseCategory::Rent,
    ExpenseCategory::Utilities,
    ExpenseCategory::Maintenance,
    ExpenseCategory::Salaries,
    ExpenseCategory::Marketing,
    ExpenseCategory::Transport,
];

impl ExpenseCategory {
    pub fn is_overhead(self) -> bool {
        OVERHEAD_CATEGORIES.contains(&self)
    }
}

/// Where an expense row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseSource {
    Manual,
    PurchaseOrder,
}

/// Aggregate root: Expense. Immutable once recorded; a single event stream
/// per expense row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    tenant_id: Option<TenantId>,
    category: ExpenseCategory,
    amount: u64,
    date: Option<NaiveDate>,
    reference: Option<String>,
    purchase_order_id: Option<PurchaseOrderId>,
    source: ExpenseSource,
    version: u64,
    created: bool,
}

impl Expense {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ExpenseId) -> Self {
        Self {
            id,
            tenant_id: None,
            category: ExpenseCategory::Other,
            amount: 0,
            date: None,
            reference: None,
            purchase_order_id: None,
            source: ExpenseSource::Manual,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ExpenseId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn category(&self) -> ExpenseCategory {
        self.category
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn purchase_order_id(&self) -> Option<PurchaseOrderId> {
        self.purchase_order_id
    }

    pub fn source(&self) -> ExpenseSource {
        self.source
    }
}

impl AggregateRoot for Expense {
    type Id = ExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordExpense. The PO-duplicate guard lives in the expense
/// projection, which sees all expenses for the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExpense {
    pub tenant_id: TenantId,
    pub expense_id: ExpenseId,
    pub category: ExpenseCategory,
    pub amount: u64,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub source: ExpenseSource,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCommand {
    RecordExpense(RecordExpense),
}

/// Event: ExpenseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub tenant_id: TenantId,
    pub expense_id: ExpenseId,
    pub category: ExpenseCategory,
    pub amount: u64,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub source: ExpenseSource,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEvent {
    ExpenseRecorded(ExpenseRecorded),
}

impl Event for ExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::ExpenseRecorded(_) => "accounting.expense.recorded",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::ExpenseRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Expense {
    type Command = ExpenseCommand;
    type Event = ExpenseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExpenseEvent::ExpenseRecorded(e) => {
                self.id = e.expense_id;
                self.tenant_id = Some(e.tenant_id);
                self.category = e.category;
                self.amount = e.amount;
                self.date = Some(e.date);
                self.reference = e.reference.clone();
                self.purchase_order_id = e.purchase_order_id;
                self.source = e.source;
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExpenseCommand::RecordExpense(cmd) => self.handle_record(cmd),
        }
    }
}

impl Expense {
    fn handle_record(&self, cmd: &RecordExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("expense already exists"));
        }
        if cmd.amount == 0 {
            return Err(DomainError::validation("expense amount must be positive"));
        }
        if cmd.source == ExpenseSource::PurchaseOrder && cmd.purchase_order_id.is_none() {
            return Err(DomainError::validation(
                "purchase-order expenses must reference the order",
            ));
        }

        Ok(vec![ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
            tenant_id: cmd.tenant_id,
            expense_id: cmd.expense_id,
            category: cmd.category,
            amount: cmd.amount,
            date: cmd.date,
            reference: cmd.reference.clone(),
            purchase_order_id: cmd.purchase_order_id,
            source: cmd.source,
            occurred_at: cmd.occurred_at,
        })])
    }
}
