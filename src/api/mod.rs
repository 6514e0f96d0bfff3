//! Client-facing registration and query API.
//!
//! Transport-agnostic: an HTTP or RPC adapter converts wire requests into
//! these calls and maps [`RegistryError`] via `http_status()`. Validation
//! happens here; the lease store below assumes well-formed input.

use crate::core::error::{RegistryError, RegistryResult};
use crate::registry::delta::Delta;
use crate::registry::instance::{InstanceInfo, InstanceStatus};
use crate::registry::store::{LeaseStore, Registration};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The registry's client API surface.
#[derive(Clone)]
pub struct RegistryApi {
    store: Arc<LeaseStore>,
}

impl RegistryApi {
    /// Create an API over a lease store.
    pub fn new(store: Arc<LeaseStore>) -> Self {
        Self { store }
    }

    /// Register an instance. Idempotent under retry: re-registration with
    /// the same key overwrites.
    pub fn register(&self, registration: Registration) -> RegistryResult<InstanceInfo> {
        validate(&registration)?;
        Ok(self.store.register(registration))
    }

    /// Renew an instance's lease. NotFound signals the client to
    /// re-register.
    pub fn renew(&self, service: &str, instance_id: &str) -> RegistryResult<()> {
        if self.store.renew(service, instance_id) {
            Ok(())
        } else {
            Err(RegistryError::not_found(service, instance_id))
        }
    }

    /// Cancel an instance. Always succeeds; cancelling twice is a no-op.
    pub fn cancel(&self, service: &str, instance_id: &str) {
        self.store.cancel(service, instance_id);
    }

    /// Override an instance's status.
    pub fn set_status(
        &self,
        service: &str,
        instance_id: &str,
        status: InstanceStatus,
    ) -> RegistryResult<()> {
        if self.store.set_status(service, instance_id, status) {
            Ok(())
        } else {
            Err(RegistryError::not_found(service, instance_id))
        }
    }

    /// Full registry snapshot grouped by service.
    pub fn fetch_all(&self) -> BTreeMap<String, Vec<InstanceInfo>> {
        self.store.fetch_all()
    }

    /// Instances of one service.
    pub fn fetch_service(&self, service: &str) -> Vec<InstanceInfo> {
        self.store.fetch_service(service)
    }

    /// Changes since the caller's cursor, with a new cursor.
    pub fn fetch_delta(&self, cursor: u64) -> Delta {
        self.store.fetch_delta(cursor)
    }
}

fn validate(registration: &Registration) -> RegistryResult<()> {
    if registration.service.trim().is_empty() {
        return Err(RegistryError::validation("serviceName must not be empty"));
    }
    if registration.instance_id.trim().is_empty() {
        return Err(RegistryError::validation("instanceId must not be empty"));
    }
    if registration.address.trim().is_empty() {
        return Err(RegistryError::validation("address must not be empty"));
    }
    if registration.port == 0 {
        return Err(RegistryError::validation("port must be non-zero"));
    }
    if registration.duration_secs == Some(0) {
        return Err(RegistryError::validation("durationSecs must be positive"));
    }
    if registration.renewal_interval_secs == Some(0) {
        return Err(RegistryError::validation(
            "renewalIntervalSecs must be positive",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::ManualClock;
    use crate::ops::observability::RegistryMetrics;
    use crate::registry::store::StoreConfig;
    use std::collections::HashMap;

    fn api() -> RegistryApi {
        let store = Arc::new(LeaseStore::new(
            StoreConfig::default(),
            "node-test",
            Arc::new(ManualClock::new()),
            Arc::new(RegistryMetrics::new()),
        ));
        RegistryApi::new(store)
    }

    fn registration() -> Registration {
        Registration {
            service: "orders".to_string(),
            instance_id: "i-1".to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
            health_check_url: None,
            status: None,
            metadata: HashMap::new(),
            renewal_interval_secs: None,
            duration_secs: None,
        }
    }

    #[test]
    fn rejects_missing_fields() {
        let api = api();

        let mut reg = registration();
        reg.service.clear();
        assert!(matches!(
            api.register(reg),
            Err(RegistryError::Validation { .. })
        ));

        let mut reg = registration();
        reg.address = "  ".to_string();
        assert!(matches!(
            api.register(reg),
            Err(RegistryError::Validation { .. })
        ));

        let mut reg = registration();
        reg.port = 0;
        assert!(matches!(
            api.register(reg),
            Err(RegistryError::Validation { .. })
        ));

        let mut reg = registration();
        reg.duration_secs = Some(0);
        assert!(matches!(
            api.register(reg),
            Err(RegistryError::Validation { .. })
        ));
    }

    #[test]
    fn renew_unknown_is_not_found() {
        let api = api();
        assert!(matches!(
            api.renew("orders", "ghost"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn register_then_fetch_all() {
        let api = api();
        api.register(registration()).unwrap();

        let all = api.fetch_all();
        let orders = all.get("orders").unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].instance_id, "i-1");
        assert_eq!(orders[0].endpoint(), "10.0.0.1:8080");
        assert_eq!(orders[0].status, InstanceStatus::Starting);
    }
}
