//! Tenant-scoped pricing rule storage.
//!
//! Rules are plain configuration, not event-sourced; a tenant that has never
//! customized a work type prices with the built-in defaults.

use dentflow_core::TenantId;
use dentflow_pricing::{PricingRule, WorkType};

use crate::read_model::TenantStore;

#[derive(Debug)]
pub struct PricingRuleStore<S>
where
    S: TenantStore<WorkType, PricingRule>,
{
    store: S,
}

impl<S> PricingRuleStore<S>
where
    S: TenantStore<WorkType, PricingRule>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The effective rule: the tenant's override, or the built-in default.
    pub fn get_or_default(&self, tenant_id: TenantId, work_type: WorkType) -> PricingRule {
        self.store
            .get(tenant_id, &work_type)
            .unwrap_or_else(|| PricingRule::default_for(work_type))
    }

    pub fn put(&self, tenant_id: TenantId, work_type: WorkType, rule: PricingRule) {
        self.store.upsert(tenant_id, work_type, rule);
    }

    /// Reset a work type back to the built-in default.
    pub fn reset(&self, tenant_id: TenantId, work_type: WorkType) {
        self.store.remove(tenant_id, &work_type);
    }

    /// Effective rules for every work type, customized or not.
    pub fn list_effective(&self, tenant_id: TenantId) -> Vec<(WorkType, PricingRule)> {
        WorkType::ALL
            .iter()
            .map(|&wt| (wt, self.get_or_default(tenant_id, wt)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryTenantStore;

    fn store() -> PricingRuleStore<InMemoryTenantStore<WorkType, PricingRule>> {
        PricingRuleStore::new(InMemoryTenantStore::new())
    }

    #[test]
    fn uncustomized_work_types_use_defaults() {
        let rules = store();
        let tenant_id = TenantId::new();

        let effective = rules.get_or_default(tenant_id, WorkType::Crown);
        assert_eq!(effective, PricingRule::default_for(WorkType::Crown));
        assert_eq!(rules.list_effective(tenant_id).len(), WorkType::ALL.len());
    }

    #[test]
    fn overrides_are_tenant_scoped_and_resettable() {
        let rules = store();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        let custom = PricingRule {
            base_price_per_unit: 99_000,
            ..PricingRule::default_for(WorkType::Crown)
        };
        rules.put(tenant_a, WorkType::Crown, custom.clone());

        assert_eq!(rules.get_or_default(tenant_a, WorkType::Crown), custom);
        assert_eq!(
            rules.get_or_default(tenant_b, WorkType::Crown),
            PricingRule::default_for(WorkType::Crown)
        );

        rules.reset(tenant_a, WorkType::Crown);
        assert_eq!(
            rules.get_or_default(tenant_a, WorkType::Crown),
            PricingRule::default_for(WorkType::Crown)
        );
    }
}
