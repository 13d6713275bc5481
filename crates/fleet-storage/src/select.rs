//! Backend selection: a configured storage type plus a prefix picks the
//! concrete [`ObjectStore`] a service talks to.

use crate::{LocalStore, ObjectStore, S3Auth, S3Config, S3Store, SupabaseStore};
use fleet_error::{ErrorCode, FleetError};
use std::str::FromStr;
use std::sync::Arc;

/// Which backend family `STORAGE_TYPE` selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Files under `STORAGE_ROOT`.
    Local,
    /// An S3-compatible endpoint.
    S3,
    /// Supabase Storage: S3-compatible data plane, REST control plane.
    Supabase,
}

impl FromStr for StorageType {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            "supabase" => Ok(Self::Supabase),
            other => Err(FleetError::invalid_argument(format!(
                "unknown storage type {other:?}, expected local, s3, or supabase"
            ))),
        }
    }
}

/// The environment variables backend selection reads, captured as an
/// explicit value so tests can construct one without touching the real
/// process environment.
#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    /// `STORAGE_TYPE`; empty selects `local`.
    pub storage_type: String,
    /// `STORAGE_ROOT`; empty means the current directory.
    pub root: String,
    /// `S3_BUCKET_NAME`.
    pub bucket: String,
    /// `S3_REGION`.
    pub region: String,
    /// `AWS_ENDPOINT_URL`.
    pub endpoint: String,
    /// `AWS_ACCESS_KEY_ID`.
    pub access_key_id: String,
    /// `AWS_SECRET_ACCESS_KEY`.
    pub secret_access_key: String,
    /// `AWS_SESSION_TOKEN`, set when credentials came from an assumed role
    /// (`S3_BUCKET_ROLE_ARN`).
    pub session_token: String,
    /// `SUPABASE_SERVICE_ROLE_KEY`.
    pub supabase_service_role_key: String,
}

impl StorageSettings {
    /// Capture the selection variables from the process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        let var = |key: &str| std::env::var(key).unwrap_or_default();
        Self {
            storage_type: var("STORAGE_TYPE"),
            root: var("STORAGE_ROOT"),
            bucket: var("S3_BUCKET_NAME"),
            region: var("S3_REGION"),
            endpoint: var("AWS_ENDPOINT_URL"),
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            session_token: var("AWS_SESSION_TOKEN"),
            supabase_service_role_key: var("SUPABASE_SERVICE_ROLE_KEY"),
        }
    }

    fn storage_type(&self) -> Result<StorageType, FleetError> {
        if self.storage_type.is_empty() {
            return Ok(StorageType::Local);
        }
        self.storage_type.parse()
    }

    fn root(&self) -> &str {
        if self.root.is_empty() { "." } else { &self.root }
    }

    fn require(&self, value: &str, env_var: &str) -> Result<String, FleetError> {
        if value.is_empty() {
            return Err(FleetError::new(
                ErrorCode::MissingSecret,
                format!("{env_var} must be set for storage type {:?}", self.storage_type),
            ));
        }
        Ok(value.to_string())
    }

    fn s3_config(&self, prefix: &str) -> Result<S3Config, FleetError> {
        let access_key_id = self.require(&self.access_key_id, "AWS_ACCESS_KEY_ID")?;
        let secret_access_key = self.require(&self.secret_access_key, "AWS_SECRET_ACCESS_KEY")?;
        let auth = if self.session_token.is_empty() {
            S3Auth::Static {
                access_key_id,
                secret_access_key,
            }
        } else {
            S3Auth::Temporary {
                access_key_id,
                secret_access_key,
                session_token: self.session_token.clone(),
            }
        };
        Ok(S3Config {
            bucket: self.require(&self.bucket, "S3_BUCKET_NAME")?,
            region: self.require(&self.region, "S3_REGION")?,
            endpoint: self.require(&self.endpoint, "AWS_ENDPOINT_URL")?,
            auth,
            prefix: prefix.to_string(),
        })
    }
}

/// Prefixes that live in the codebase rather than deployment state; these
/// bind to local storage no matter what `STORAGE_TYPE` says.
const LOCAL_ONLY_PREFIXES: &[&str] = &["config", "generated"];

/// Build the [`ObjectStore`] for `prefix` from `settings`.
pub fn select_store(prefix: &str, settings: &StorageSettings) -> Result<Arc<dyn ObjectStore>, FleetError> {
    let storage_type = if LOCAL_ONLY_PREFIXES.contains(&prefix) {
        StorageType::Local
    } else {
        settings.storage_type()?
    };

    match storage_type {
        StorageType::Local => Ok(Arc::new(LocalStore::new(settings.root(), prefix))),
        StorageType::S3 => Ok(Arc::new(S3Store::new(settings.s3_config(prefix)?))),
        StorageType::Supabase => {
            let key = settings.require(&settings.supabase_service_role_key, "SUPABASE_SERVICE_ROLE_KEY")?;
            let config = settings.s3_config(prefix)?;
            // Supabase's S3 endpoint is `<project>/storage/v1/s3`; the REST
            // control plane lives one segment up.
            let rest_base = config.endpoint.trim_end_matches('/').trim_end_matches("/s3").to_string();
            Ok(Arc::new(SupabaseStore::new(S3Store::new(config), rest_base, key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_settings() -> StorageSettings {
        StorageSettings {
            storage_type: "s3".into(),
            bucket: "fleet".into(),
            region: "us-east-1".into(),
            endpoint: "https://s3.us-east-1.amazonaws.com".into(),
            access_key_id: "AKID".into(),
            secret_access_key: "secret".into(),
            ..StorageSettings::default()
        }
    }

    #[test]
    fn empty_type_selects_local() {
        let store = select_store("resources", &StorageSettings::default()).unwrap();
        assert!(store.path("x.json").contains("resources"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let settings = StorageSettings {
            storage_type: "gcs".into(),
            ..StorageSettings::default()
        };
        let err = select_store("resources", &settings).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn s3_selection_requires_credentials() {
        let mut settings = s3_settings();
        settings.secret_access_key.clear();
        let err = select_store("resources", &settings).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingSecret);
    }

    #[test]
    fn config_prefix_is_always_local() {
        // Even with s3 configured, config/generated stay on disk.
        let store = select_store("config", &s3_settings()).unwrap();
        assert!(!store.path("config.json").starts_with("https://"));
        let store = select_store("generated", &s3_settings()).unwrap();
        assert!(!store.path("x.json").starts_with("https://"));
    }

    #[test]
    fn s3_selection_builds_an_s3_path() {
        let store = select_store("vectors", &s3_settings()).unwrap();
        assert!(store.path("v.jsonl").starts_with("https://s3.us-east-1.amazonaws.com/fleet/vectors/"));
    }
}
