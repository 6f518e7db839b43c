//! Infrastructure: event store, command dispatch, read models, projections.
//!
//! Domain crates stay pure; everything that loads, persists, publishes or
//! queries lives here.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod sequence;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use projections::{
    CaseReadModel, CasesProjection, CursorMap, DoctorBalance, DoctorBalancesProjection,
    ExpenseReadModel, ExpensesProjection, InvoicePaymentRow, InvoiceReadModel, InvoicesProjection,
    PartiesProjection, PartyReadModel, ProjectionError, PurchaseOrderReadModel,
    PurchaseOrdersProjection, SupplierBalance, SupplierBalancesProjection,
};
pub use read_model::{InMemoryTenantStore, PricingRuleStore, TenantStore};
pub use sequence::SequenceAllocator;
