//! Tenant-isolated read model storage abstractions.

pub mod pricing_rules;
pub mod tenant_store;

pub use pricing_rules::PricingRuleStore;
pub use tenant_store::{InMemoryTenantStore, TenantStore};
