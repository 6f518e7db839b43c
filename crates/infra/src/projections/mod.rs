//! Projection implementations (read model builders).
//!
//! Projections consume committed event envelopes and build query-optimized
//! read models. All projections are:
//! - **Rebuildable**: reconstructable from the event stream
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: safe for at-least-once delivery (sequence cursors)

pub mod cases;
pub mod cursor;
pub mod doctor_balances;
pub mod expenses;
pub mod invoices;
pub mod parties;
pub mod purchase_orders;
pub mod supplier_balances;

pub use cases::{CaseReadModel, CasesProjection};
pub use cursor::{CursorMap, ProjectionError};
pub use doctor_balances::{DoctorBalance, DoctorBalancesProjection};
pub use expenses::{ExpenseReadModel, ExpensesProjection};
pub use invoices::{InvoicePaymentRow, InvoiceReadModel, InvoicesProjection};
pub use parties::{PartiesProjection, PartyReadModel};
pub use purchase_orders::{PurchaseOrderReadModel, PurchaseOrdersProjection};
pub use supplier_balances::{SupplierBalance, SupplierBalancesProjection};
