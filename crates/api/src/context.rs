use dentflow_core::TenantId;

/// Tenant scope attached to a request by the tenant middleware.
///
/// Handlers read it with `Extension<TenantContext>`. It is only constructed
/// after the tenant header has been validated, so its presence on a request
/// is the proof that the request is tenant-scoped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
