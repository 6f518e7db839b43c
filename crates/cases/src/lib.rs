//! Production cases: the department workflow engine and its audit trail.

pub mod case;
pub mod workflow;

pub use case::{
    Case, CaseCommand, CaseEvent, CaseId, CaseRegistered, CaseTransferred, InvoiceLinked,
    InvoiceUnlinked, LinkInvoice, QcRecorded, QcResult, RecordQc, RegisterCase, Transfer,
    UnlinkInvoice, WorkflowStep,
};
pub use workflow::{CASE_WORKFLOW, CaseStatus, Department, department_of};
