//! The resource index: durable, one-object-per-resource storage with
//! optional actor-scoped access control.

use fleet_core::{Identifier, Resource, resource_from_json};
use fleet_error::{ErrorCode, FleetError};
use fleet_storage::{ObjectStore, StorageValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Access-control hook consulted by [`ResourceIndex::get`] when the caller
/// supplies an actor. Evaluated once per batch, not per resource.
pub trait Policy: Send + Sync {
    /// Whether `actor` may read all of `resource_ids`.
    fn evaluate(&self, actor: &Identifier, resource_ids: &[String]) -> bool;
}

/// A [`Policy`] that allows every read; the default when no access control
/// is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Policy for AllowAll {
    fn evaluate(&self, _actor: &Identifier, _resource_ids: &[String]) -> bool {
        true
    }
}

/// Durable index over [`Resource`] values, one `<id>.json` object per
/// resource so each may also be read individually by key.
pub struct ResourceIndex {
    store: Arc<dyn ObjectStore>,
    policy: Arc<dyn Policy>,
    resources: RwLock<HashMap<String, Resource>>,
    order: RwLock<Vec<String>>,
}

impl ResourceIndex {
    /// Build an index over `store` with the given access policy.
    pub fn new(store: Arc<dyn ObjectStore>, policy: Arc<dyn Policy>) -> Self {
        Self {
            store,
            policy,
            resources: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Build an index with [`AllowAll`] policy.
    pub fn unrestricted(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, Arc::new(AllowAll))
    }

    fn key_for(canonical: &str) -> String {
        format!("{canonical}.json")
    }

    /// Whether a resource with canonical id `id` exists.
    pub async fn has(&self, id: &str) -> Result<bool, FleetError> {
        Ok(self.resources.read().await.contains_key(id))
    }

    /// Store `resource`, generating an identifier name if one is not set.
    /// Overwrites any existing resource at the same id.
    pub async fn put(&self, mut resource: Resource) -> Result<(), FleetError> {
        resource.ensure_identifier();
        let canonical = resource.id().to_canonical();
        self.store
            .put(&Self::key_for(&canonical), StorageValue::Json(resource.to_json()))
            .await?;
        let mut resources = self.resources.write().await;
        let is_new = !resources.contains_key(&canonical);
        resources.insert(canonical.clone(), resource);
        drop(resources);
        if is_new {
            self.order.write().await.push(canonical);
        }
        Ok(())
    }

    /// Alias for [`ResourceIndex::put`], matching the substrate verb.
    pub async fn add(&self, resource: Resource) -> Result<(), FleetError> {
        self.put(resource).await
    }

    /// Fetch resources for `ids`, preserving input order and dropping any
    /// that are missing.
    ///
    /// With an `actor`, the policy is evaluated over the whole batch first;
    /// a denial fails the call with [`ErrorCode::AccessDenied`]. Without an
    /// actor no check is performed.
    pub async fn get(&self, ids: &[String], actor: Option<&Identifier>) -> Result<Vec<Resource>, FleetError> {
        if let Some(actor) = actor
            && !self.policy.evaluate(actor, ids)
        {
            return Err(FleetError::new(
                ErrorCode::AccessDenied,
                format!("actor {} may not read the requested resources", actor.to_canonical()),
            )
            .with_context("actor", actor.to_canonical()));
        }
        let keys: Vec<String> = ids.iter().map(|id| Self::key_for(id)).collect();
        let found = self.store.get_many(&keys).await?;
        let mut out = Vec::with_capacity(found.len());
        for key in &keys {
            let Some(StorageValue::Json(value)) = found.get(key) else {
                continue;
            };
            let resource = resource_from_json(value.clone()).map_err(|e| {
                FleetError::new(ErrorCode::UnknownType, e.to_string()).with_context("key", key)
            })?;
            out.push(resource);
        }
        Ok(out)
    }

    /// All identifiers in first-put order.
    pub async fn find_all(&self) -> Vec<Identifier> {
        let order = self.order.read().await;
        let resources = self.resources.read().await;
        order
            .iter()
            .filter_map(|id| resources.get(id).map(Resource::id).cloned())
            .collect()
    }

    /// Identifiers whose canonical id starts with `prefix`, in first-put
    /// order.
    pub async fn find_by_prefix(&self, prefix: &str) -> Vec<Identifier> {
        self.find_all()
            .await
            .into_iter()
            .filter(|id| id.canonical_starts_with(prefix))
            .collect()
    }

    /// (Re)populate the in-memory view by listing and reading every
    /// `*.json` object. `list()` returns oldest-first, so first-put order
    /// survives the reload.
    pub async fn load_data(&self) -> Result<(), FleetError> {
        let keys = self.store.find_by_extension("json").await?;
        let mut resources = HashMap::new();
        let mut order = Vec::new();
        for key in keys {
            let StorageValue::Json(value) = self.store.get(&key).await? else {
                continue;
            };
            let resource = resource_from_json(value)
                .map_err(|e| FleetError::internal(format!("unrecognized resource at {key}: {e}")))?;
            let canonical = resource.id().to_canonical();
            order.push(canonical.clone());
            resources.insert(canonical, resource);
        }
        *self.resources.write().await = resources;
        *self.order.write().await = order;
        Ok(())
    }
}
