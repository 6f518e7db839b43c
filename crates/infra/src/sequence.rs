//! Sequential document numbers (C-000001, INV-000001, PO-000001).
//!
//! Numbers are per tenant and per prefix. The allocator is a convenience for
//! human-readable references only; identity remains the aggregate id.

use std::collections::HashMap;
use std::sync::RwLock;

use dentflow_core::TenantId;

#[derive(Debug, Default)]
pub struct SequenceAllocator {
    counters: RwLock<HashMap<(TenantId, &'static str), u64>>,
}

impl SequenceAllocator {
    pub const CASE_PREFIX: &'static str = "C";
    pub const INVOICE_PREFIX: &'static str = "INV";
    pub const PURCHASE_ORDER_PREFIX: &'static str = "PO";

    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next number for a tenant + prefix, formatted as
    /// `PREFIX-NNNNNN`.
    pub fn next(&self, tenant_id: TenantId, prefix: &'static str) -> String {
        let mut counters = match self.counters.write() {
            Ok(c) => c,
            // A poisoned lock still lets us hand out a usable, if non-dense,
            // reference.
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = counters.entry((tenant_id, prefix)).or_insert(0);
        *counter += 1;
        format!("{prefix}-{:06}", *counter)
    }
}
