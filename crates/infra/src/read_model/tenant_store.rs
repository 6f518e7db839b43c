use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use dentflow_core::TenantId;

/// Tenant-isolated key/value store abstraction for disposable read models.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn remove(&self, tenant_id: TenantId, key: &K);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Clear all read-model records for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn remove(&self, tenant_id: TenantId, key: &K) {
        (**self).remove(tenant_id, key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory tenant-isolated store.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, key.clone())).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, key), value);
        }
    }

    fn remove(&self, tenant_id: TenantId, key: &K) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&(tenant_id, key.clone()));
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((t, _k), v)| if *t == tenant_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _k), _v| *t != tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_scoped_per_tenant() {
        let store = InMemoryTenantStore::<u32, String>::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        store.upsert(tenant_a, 1, "a".to_string());
        store.upsert(tenant_b, 1, "b".to_string());

        assert_eq!(store.get(tenant_a, &1).as_deref(), Some("a"));
        assert_eq!(store.get(tenant_b, &1).as_deref(), Some("b"));

        store.clear_tenant(tenant_a);
        assert!(store.get(tenant_a, &1).is_none());
        assert_eq!(store.list(tenant_b).len(), 1);
    }

    #[test]
    fn remove_deletes_a_single_key() {
        let store = InMemoryTenantStore::<u32, String>::new();
        let tenant = TenantId::new();

        store.upsert(tenant, 1, "one".to_string());
        store.upsert(tenant, 2, "two".to_string());
        store.remove(tenant, &1);

        assert!(store.get(tenant, &1).is_none());
        assert_eq!(store.list(tenant).len(), 1);
    }
}
