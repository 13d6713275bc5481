//! Supabase Storage backend: S3-compatible data plane, REST control plane.
//!
//! Supabase's S3-compatibility layer cannot create buckets or report health,
//! so [`SupabaseStore`] delegates object operations to an inner [`S3Store`]
//! and overrides bucket lifecycle to POST `/bucket` and probe `/status` on
//! the project's REST endpoint instead.

use crate::{ObjectStore, S3Store, StorageValue};
use async_trait::async_trait;
use fleet_error::{ErrorCode, FleetError};
use serde_json::Value;

/// Wraps an [`S3Store`] with Supabase's REST control plane for bucket
/// lifecycle and health.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    inner: S3Store,
    /// Base REST URL, e.g. `https://<project>.supabase.co/storage/v1`.
    rest_base: String,
    service_role_key: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    /// Wrap `inner`, issuing control-plane calls against `rest_base` with
    /// `SUPABASE_SERVICE_ROLE_KEY` as `service_role_key`.
    #[must_use]
    pub fn new(inner: S3Store, rest_base: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            inner,
            rest_base: rest_base.into(),
            service_role_key: service_role_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.service_role_key)
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn put(&self, key: &str, value: StorageValue) -> Result<(), FleetError> {
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<StorageValue, FleetError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), FleetError> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, FleetError> {
        self.inner.exists(key).await
    }

    async fn append(&self, key: &str, value: Value) -> Result<(), FleetError> {
        self.inner.append(key, value).await
    }

    async fn append_many(&self, key: &str, values: Vec<Value>) -> Result<(), FleetError> {
        self.inner.append_many(key, values).await
    }

    async fn list(&self) -> Result<Vec<String>, FleetError> {
        self.inner.list().await
    }

    fn path(&self, key: &str) -> String {
        self.inner.path(key)
    }

    async fn ensure_bucket(&self) -> Result<(), FleetError> {
        let url = format!("{}/bucket", self.rest_base.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .header("authorization", self.auth_header())
            .json(&serde_json::json!({ "name": self.inner.config.bucket, "public": false }))
            .send()
            .await
            .map_err(|e| FleetError::new(ErrorCode::Unavailable, format!("Supabase bucket create failed: {e}")))?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        Err(FleetError::internal(format!(
            "Supabase bucket create returned {}",
            resp.status()
        )))
    }

    async fn bucket_exists(&self) -> Result<bool, FleetError> {
        let url = format!(
            "{}/bucket/{}",
            self.rest_base.trim_end_matches('/'),
            self.inner.config.bucket
        );
        let resp = self
            .client
            .get(&url)
            .header("authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| FleetError::new(ErrorCode::Unavailable, format!("Supabase bucket lookup failed: {e}")))?;
        Ok(resp.status().is_success())
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/status", self.rest_base.trim_end_matches('/'));
        self.client
            .get(&url)
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }
}
