//! Table ownership registry
//!
//! Table names are global across services: the first service to register a
//! table owns it, and any other service declaring the same table has that
//! model rejected. Ownership lives in memory for the lifetime of the owning
//! [`DatabaseManager`](crate::DatabaseManager).

use super::types::{ModelInfo, Normalized, RejectedModel};
use crate::error::ValidationError;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use tracing::info;

#[derive(Default)]
struct RegistryState {
    /// lower-cased table name -> owning service
    owners: HashMap<String, String>,
    /// service -> models it registered last
    models: BTreeMap<String, Vec<ModelInfo>>,
}

/// Thread-safe map of table ownership
#[derive(Default)]
pub struct TableRegistry {
    state: RwLock<RegistryState>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject models whose table is owned by another service, without
    /// recording anything
    pub fn check(&self, service_name: &str, normalized: Normalized) -> Normalized {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        partition(&state.owners, service_name, normalized)
    }

    /// Reject colliding models, then record the rest as owned by
    /// `service_name`
    ///
    /// A service's new claim replaces its previous one, so tables it no
    /// longer declares are released. A claim with no valid model at all
    /// changes nothing and the service keeps its earlier tables.
    pub fn claim(&self, service_name: &str, normalized: Normalized) -> Normalized {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let accepted = partition(&state.owners, service_name, normalized);
        if accepted.valid.is_empty() {
            info!(
                "service {} declared no valid model, keeping its previous claim",
                service_name
            );
            return accepted;
        }

        state.owners.retain(|_, owner| owner != service_name);
        for model in &accepted.valid {
            state
                .owners
                .insert(model.table_key(), service_name.to_string());
        }
        state
            .models
            .insert(service_name.to_string(), accepted.valid.clone());

        info!(
            "service {} owns {} table(s), {} model(s) rejected",
            service_name,
            accepted.valid.len(),
            accepted.rejected.len()
        );
        accepted
    }

    /// Drop everything a service registered
    ///
    /// Returns true if the service was known.
    pub fn release(&self, service_name: &str) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.owners.retain(|_, owner| owner != service_name);
        state.models.remove(service_name).is_some()
    }

    /// Service owning a table, if any
    pub fn owner(&self, table_name: &str) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.owners.get(&table_name.to_ascii_lowercase()).cloned()
    }

    /// Models a service registered last, if it registered any
    pub fn models(&self, service_name: &str) -> Option<Vec<ModelInfo>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.models.get(service_name).cloned()
    }

    /// Registered services in name order
    pub fn services(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.models.keys().cloned().collect()
    }
}

fn partition(
    owners: &HashMap<String, String>,
    service_name: &str,
    normalized: Normalized,
) -> Normalized {
    let Normalized {
        valid,
        mut rejected,
    } = normalized;

    let mut accepted = Vec::with_capacity(valid.len());
    for model in valid {
        match owners.get(&model.table_key()) {
            Some(owner) if owner != service_name => {
                let err = ValidationError::TableOwnedByOtherService {
                    table: model.table_name().to_string(),
                    owner: owner.clone(),
                };
                rejected.push(RejectedModel {
                    raw: model_to_raw(&model),
                    reason: err.to_string(),
                });
            }
            _ => accepted.push(model),
        }
    }

    Normalized {
        valid: accepted,
        rejected,
    }
}

fn model_to_raw(model: &ModelInfo) -> serde_json::Value {
    let fields: serde_json::Map<String, serde_json::Value> = model
        .fields()
        .iter()
        .map(|f| (f.name.clone(), json!(f.field_type.name())))
        .collect();
    json!({
        "name": model.name(),
        "table_name": model.table_name(),
        "fields": fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::normalize;

    fn models(service: &str, tables: &[&str]) -> Normalized {
        let raw: Vec<_> = tables
            .iter()
            .map(|t| json!({"name": t, "table_name": t, "fields": {"id": "integer"}}))
            .collect();
        normalize(service, &raw).unwrap()
    }

    #[test]
    fn test_claim_and_collision() {
        let registry = TableRegistry::new();

        let a = registry.claim("svc_a", models("svc_a", &["orders", "items"]));
        assert_eq!(a.valid.len(), 2);
        assert_eq!(registry.owner("ORDERS"), Some("svc_a".to_string()));

        let b = registry.claim("svc_b", models("svc_b", &["orders", "users"]));
        assert_eq!(b.valid.len(), 1);
        assert_eq!(b.valid[0].table_name(), "users");
        assert_eq!(b.rejected.len(), 1);
        assert!(b.rejected[0].reason.contains("svc_a"));
        assert_eq!(b.rejected[0].raw["table_name"], "orders");
    }

    #[test]
    fn test_same_service_can_reclaim() {
        let registry = TableRegistry::new();
        registry.claim("svc_a", models("svc_a", &["orders", "items"]));

        let again = registry.claim("svc_a", models("svc_a", &["orders"]));
        assert_eq!(again.valid.len(), 1);
        assert!(again.rejected.is_empty());

        // items was dropped from the declaration and is free again
        assert_eq!(registry.owner("items"), None);
        assert_eq!(registry.models("svc_a").map(|m| m.len()), Some(1));
    }

    #[test]
    fn test_check_does_not_record() {
        let registry = TableRegistry::new();
        let checked = registry.check("svc_a", models("svc_a", &["orders"]));
        assert_eq!(checked.valid.len(), 1);
        assert_eq!(registry.owner("orders"), None);
        assert!(registry.services().is_empty());
    }

    #[test]
    fn test_release() {
        let registry = TableRegistry::new();
        registry.claim("svc_a", models("svc_a", &["orders"]));
        assert!(registry.release("svc_a"));
        assert!(!registry.release("svc_a"));

        let b = registry.claim("svc_b", models("svc_b", &["orders"]));
        assert_eq!(b.valid.len(), 1);
    }

    #[test]
    fn test_empty_reclaim_keeps_previous_tables() {
        let registry = TableRegistry::new();
        registry.claim("svc_a", models("svc_a", &["orders", "items"]));
        registry.claim("svc_b", models("svc_b", &["users"]));

        let raw = vec![
            json!({"name": "Bad", "table_name": "ledger", "fields": {"id": "decimal128"}}),
            json!({"name": "Users", "table_name": "users", "fields": {"id": "integer"}}),
        ];
        let again = registry.claim("svc_a", normalize("svc_a", &raw).unwrap());
        assert!(again.valid.is_empty());
        assert_eq!(again.rejected.len(), 2);

        assert_eq!(registry.owner("orders"), Some("svc_a".to_string()));
        assert_eq!(registry.owner("items"), Some("svc_a".to_string()));
        assert_eq!(registry.models("svc_a").map(|m| m.len()), Some(2));

        // a service with nothing valid is never recorded
        registry.claim("svc_c", normalize("svc_c", &raw[..1]).unwrap());
        assert!(registry.models("svc_c").is_none());
        assert_eq!(registry.services(), vec!["svc_a".to_string(), "svc_b".to_string()]);
    }
}
