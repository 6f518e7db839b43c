//! Purchasing: the supplier-side order ledger.

pub mod order;

pub use order::{
    ChangeStatus, CreatePurchaseOrder, OrderLine, OrderLineInput, PaymentMethod, PoStatus,
    PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderId,
    PurchaseOrderStatusChanged, RecordSupplierPayment, SupplierPayment,
    SupplierPaymentRecorded, PO_LIFECYCLE,
};
