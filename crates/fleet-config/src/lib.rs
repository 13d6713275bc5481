// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layered configuration loading and lazy secret accessors for the agent
//! fleet runtime.
//!
//! A [`Config`] is built, in priority order, from: process environment
//! variables, a JSON config file, a caller-provided defaults dictionary, and
//! hard-coded fallbacks. Secrets (`LLM_TOKEN`, `JWT_SECRET`, ...) are read
//! lazily and cached on first access via [`Config::secret`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock};
use thiserror::Error;

/// Errors produced while loading or reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but is not valid JSON.
    #[error("config file is not valid JSON: {0}")]
    InvalidJson(String),
    /// A required secret environment variable is not set.
    #[error("missing required secret: {0}")]
    MissingSecret(String),
}

/// Indirection over `std::env` so tests can substitute a fixed map without
/// touching real process environment.
pub trait EnvSource: Send + Sync {
    /// Look up a single environment variable.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed map, for tests.
#[derive(Debug, Default, Clone)]
pub struct MapEnv(pub HashMap<String, String>);

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Hard-coded fallback values used when no other layer sets a field.
#[must_use]
pub fn fallback_defaults() -> BTreeMap<String, Value> {
    let mut m = BTreeMap::new();
    m.insert("protocol".into(), Value::String("grpc".into()));
    m.insert("host".into(), Value::String("0.0.0.0".into()));
    m.insert("port".into(), Value::from(3000));
    m.insert("path".into(), Value::String(String::new()));
    m
}

/// A fully merged configuration dictionary plus lazily-resolved secrets.
pub struct Config {
    namespace: String,
    name: String,
    values: BTreeMap<String, Value>,
    env: Box<dyn EnvSource>,
    secrets: Mutex<HashMap<&'static str, OnceLock<String>>>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

/// Name + default-env-var pair for a lazily-resolved secret accessor.
struct SecretSpec {
    name: &'static str,
    env_var: &'static str,
    default: Option<&'static str>,
}

const SECRETS: &[SecretSpec] = &[
    SecretSpec { name: "llm_token", env_var: "LLM_TOKEN", default: None },
    SecretSpec { name: "llm_base_url", env_var: "LLM_BASE_URL", default: None },
    SecretSpec { name: "embedding_base_url", env_var: "EMBEDDING_BASE_URL", default: None },
    SecretSpec { name: "jwt_secret", env_var: "JWT_SECRET", default: None },
    SecretSpec { name: "jwt_anon_key", env_var: "JWT_ANON_KEY", default: None },
    SecretSpec { name: "jwt_auth_url", env_var: "JWT_AUTH_URL", default: Some("http://localhost:9999") },
    SecretSpec { name: "gh_token", env_var: "GH_TOKEN", default: None },
    SecretSpec { name: "gh_client_id", env_var: "GH_CLIENT_ID", default: None },
];

impl Config {
    /// Load a configuration for the service `name` under `namespace`,
    /// merging `env` over `file_contents` over `defaults` over
    /// [`fallback_defaults`]. Each known option `K` may be overridden by
    /// the environment variable `<NAMESPACE>_<NAME>_<K>`, all uppercase;
    /// an override value is parsed as JSON, falling back to the raw string
    /// when it isn't valid JSON.
    ///
    /// `file_contents`, if present, must be the raw bytes of a JSON object
    /// (the caller reads `<config-storage>/config.json` itself — this crate
    /// has no storage dependency, keeping the config layer independent of
    /// the storage it configures).
    pub fn load(
        namespace: impl Into<String>,
        name: impl Into<String>,
        defaults: BTreeMap<String, Value>,
        file_contents: Option<&[u8]>,
        env: Box<dyn EnvSource>,
    ) -> Result<Self, ConfigError> {
        let mut values = fallback_defaults();
        values.extend(defaults);

        if let Some(bytes) = file_contents {
            let parsed: Value = serde_json::from_slice(bytes)
                .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;
            if let Value::Object(map) = parsed {
                for (k, v) in map {
                    values.insert(k, v);
                }
            }
        }

        let namespace = namespace.into();
        let name = name.into();
        let keys: Vec<String> = values.keys().cloned().collect();
        for key in keys {
            let env_var = format!(
                "{}_{}_{}",
                namespace.to_uppercase(),
                name.to_uppercase(),
                key.to_uppercase()
            );
            if let Some(raw) = env.get(&env_var) {
                let parsed = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                values.insert(key, parsed);
            }
        }

        // url is authoritative when present: re-derive protocol/host/port/path from it.
        if let Some(Value::String(url)) = values.get("url").cloned()
            && let Some((protocol, host, port, path)) = split_url(&url)
        {
            values.insert("protocol".into(), Value::String(protocol));
            values.insert("host".into(), Value::String(host));
            values.insert("port".into(), Value::from(port));
            values.insert("path".into(), Value::String(path));
        }

        Ok(Self {
            namespace,
            name,
            values,
            env,
            secrets: Mutex::new(HashMap::new()),
        })
    }

    /// The namespace this config was loaded under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The service name this config was loaded for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a merged config value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The derived `<protocol>://<host>:<port><path>` URL, computed from the
    /// merged `protocol`/`host`/`port`/`path` fields.
    #[must_use]
    pub fn url(&self) -> String {
        if let Some(Value::String(url)) = self.values.get("url") {
            return url.clone();
        }
        let protocol = self.str_or("protocol", "grpc");
        let host = self.str_or("host", "0.0.0.0");
        let port = self
            .values
            .get("port")
            .and_then(Value::as_u64)
            .unwrap_or(3000);
        let path = self.str_or("path", "");
        format!("{protocol}://{host}:{port}{path}")
    }

    fn str_or(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// Resolve a named secret, reading its environment variable on first
    /// access and caching the result thereafter.
    ///
    /// Fails with [`ConfigError::MissingSecret`] when neither the
    /// environment nor the accessor's built-in default provides a value.
    pub fn secret(&self, name: &str) -> Result<String, ConfigError> {
        let spec = SECRETS
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("unknown secret accessor {name:?}"));

        {
            let cache = self.secrets.lock().expect("secret cache lock poisoned");
            if let Some(lock) = cache.get(spec.name)
                && let Some(v) = lock.get()
            {
                return Ok(v.clone());
            }
        }

        let resolved = self
            .env
            .get(spec.env_var)
            .or_else(|| spec.default.map(str::to_string))
            .ok_or_else(|| ConfigError::MissingSecret(spec.env_var.to_string()))?;

        let mut cache = self.secrets.lock().expect("secret cache lock poisoned");
        let lock = cache.entry(spec.name).or_default();
        let _ = lock.set(resolved.clone());
        Ok(resolved)
    }
}

fn split_url(url: &str) -> Option<(String, String, u16, String)> {
    let (protocol, rest) = url.split_once("://")?;
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let (host, port) = authority.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some((protocol.to_string(), host.to_string(), port, path.to_string()))
}
