//! Invoicing: the immutable sales ledger and its payment arithmetic.

pub mod invoice;

pub use invoice::{
    CancelInvoice, Invoice, InvoiceCancelled, InvoiceCommand, InvoiceEvent, InvoiceId,
    InvoiceIssued, IssueInvoice, Payment, PaymentMethod, PaymentRecorded, PaymentStatus,
    RecordPayment,
};
