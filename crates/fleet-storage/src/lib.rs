// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pluggable key/value object storage for the agent fleet runtime.
//!
//! An [`ObjectStore`] is scoped to a prefix (bucket-like namespace) and
//! exposes a uniform JSON/JSONL/opaque-bytes surface over local filesystem,
//! S3-compatible, or Supabase-REST backends. Content-type is inferred from
//! the key suffix: `.json` values round-trip as a single JSON object,
//! `.jsonl` values round-trip as an ordered sequence of JSON values
//! (newline-delimited on the wire), and any other key is opaque bytes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Local-filesystem backend.
pub mod local;
/// Test double that never persists anything.
pub mod null;
/// S3-compatible backend (temporary or static credentials).
pub mod s3;
/// Backend selection from storage type + prefix.
pub mod select;
/// Supabase Storage backend (S3-compatible data plane, REST control plane).
pub mod supabase;

pub use local::LocalStore;
pub use null::NullStore;
pub use s3::{S3Auth, S3Config, S3Store};
pub use select::{StorageSettings, StorageType, select_store};
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use fleet_error::{ErrorCode, FleetError};
use serde_json::Value;
use std::collections::BTreeMap;

/// The decoded content of a stored value, tagged by the key-suffix
/// convention described in the module docs.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    /// A single JSON object/value, for `.json` keys.
    Json(Value),
    /// An ordered sequence of JSON values, for `.jsonl` keys.
    JsonLines(Vec<Value>),
    /// Opaque bytes, for any other key.
    Bytes(Vec<u8>),
}

impl StorageValue {
    /// Encode this value as wire bytes (newline-delimited for `JsonLines`).
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Json(v) => serde_json::to_vec(v).unwrap_or_default(),
            Self::JsonLines(items) => {
                let mut out = Vec::new();
                for item in items {
                    if let Ok(line) = serde_json::to_vec(item) {
                        out.extend(line);
                        out.push(b'\n');
                    }
                }
                out
            }
            Self::Bytes(b) => b.clone(),
        }
    }

    /// Decode `bytes` per the content-type convention for `key`.
    pub fn decode(key: &str, bytes: Vec<u8>) -> Result<Self, FleetError> {
        if key.ends_with(".json") {
            let v: Value = serde_json::from_slice(&bytes).map_err(|e| {
                FleetError::new(ErrorCode::InvalidArgument, format!("invalid JSON at {key}: {e}"))
            })?;
            Ok(Self::Json(v))
        } else if key.ends_with(".jsonl") {
            let text = String::from_utf8_lossy(&bytes);
            let mut items = Vec::new();
            for line in text.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let v: Value = serde_json::from_str(line).map_err(|e| {
                    FleetError::new(
                        ErrorCode::InvalidArgument,
                        format!("invalid JSONL line at {key}: {e}"),
                    )
                })?;
                items.push(v);
            }
            Ok(Self::JsonLines(items))
        } else {
            Ok(Self::Bytes(bytes))
        }
    }

    /// Append a single JSON value's encoded line, as used by [`ObjectStore::append`].
    #[must_use]
    pub fn line_bytes(value: &Value) -> Vec<u8> {
        let mut out = serde_json::to_vec(value).unwrap_or_default();
        out.push(b'\n');
        out
    }
}

/// Uniform key/value object storage, scoped to a prefix (bucket namespace).
///
/// Missing keys on `get`/`delete` fail with [`ErrorCode::NotFound`];
/// `exists` never fails on absence, and `get_many` silently omits missing
/// keys rather than failing.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync {
    /// Write `value` to `key`, creating or overwriting it.
    async fn put(&self, key: &str, value: StorageValue) -> Result<(), FleetError>;

    /// Read `key`. Fails with [`ErrorCode::NotFound`] if absent.
    async fn get(&self, key: &str) -> Result<StorageValue, FleetError>;

    /// Delete `key`. Fails with [`ErrorCode::NotFound`] if absent.
    async fn delete(&self, key: &str) -> Result<(), FleetError>;

    /// Whether `key` exists. Never fails on absence.
    async fn exists(&self, key: &str) -> Result<bool, FleetError>;

    /// Append one JSON value as a line to `key`, creating it if absent.
    async fn append(&self, key: &str, value: Value) -> Result<(), FleetError>;

    /// Append several JSON values as consecutive lines to `key` in one
    /// operation, creating it if absent. Used by buffered writers draining
    /// a batch.
    async fn append_many(&self, key: &str, values: Vec<Value>) -> Result<(), FleetError> {
        for value in values {
            self.append(key, value).await?;
        }
        Ok(())
    }

    /// Read several keys at once, silently omitting any that are missing.
    async fn get_many(&self, keys: &[String]) -> Result<BTreeMap<String, StorageValue>, FleetError> {
        let mut out = BTreeMap::new();
        for key in keys {
            match self.get(key).await {
                Ok(v) => {
                    out.insert(key.clone(), v);
                }
                Err(e) if e.code == ErrorCode::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// All keys in this store, sorted oldest-created first.
    async fn list(&self) -> Result<Vec<String>, FleetError>;

    /// Keys sharing `prefix`. When `delimiter` is given, collapse to the
    /// distinct set of next-segment prefixes (directory-style listing)
    /// instead of full keys.
    async fn find_by_prefix(
        &self,
        prefix: &str,
        delimiter: Option<char>,
    ) -> Result<Vec<String>, FleetError> {
        let all = self.list().await?;
        let matching: Vec<&String> = all.iter().filter(|k| k.starts_with(prefix)).collect();
        let Some(delim) = delimiter else {
            return Ok(matching.into_iter().cloned().collect());
        };
        let mut segments: Vec<String> = Vec::new();
        for key in matching {
            let rest = &key[prefix.len()..];
            if let Some(idx) = rest.find(delim) {
                let seg = format!("{prefix}{}", &rest[..=idx]);
                if !segments.contains(&seg) {
                    segments.push(seg);
                }
            } else if !segments.contains(key) {
                segments.push(key.clone());
            }
        }
        Ok(segments)
    }

    /// Keys whose suffix matches `ext` (e.g. `"json"`).
    async fn find_by_extension(&self, ext: &str) -> Result<Vec<String>, FleetError> {
        let all = self.list().await?;
        let suffix = format!(".{ext}");
        Ok(all.into_iter().filter(|k| k.ends_with(&suffix)).collect())
    }

    /// A display path/URL for `key`, for diagnostics.
    fn path(&self, key: &str) -> String;

    /// Create the backing bucket if it does not already exist. Conflicts
    /// (bucket already exists) are swallowed.
    async fn ensure_bucket(&self) -> Result<(), FleetError>;

    /// Whether the backing bucket currently exists.
    async fn bucket_exists(&self) -> Result<bool, FleetError>;

    /// Lightweight liveness probe for the backend.
    async fn is_healthy(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips_through_bytes() {
        let v = StorageValue::Json(serde_json::json!({"a": 1}));
        let bytes = v.to_bytes();
        let decoded = StorageValue::decode("x.json", bytes).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn jsonl_round_trips_through_bytes() {
        let v = StorageValue::JsonLines(vec![serde_json::json!({"a": 1}), serde_json::json!({"b": 2})]);
        let bytes = v.to_bytes();
        let decoded = StorageValue::decode("x.jsonl", bytes).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn opaque_keys_round_trip_as_bytes() {
        let v = StorageValue::Bytes(vec![1, 2, 3]);
        let bytes = v.to_bytes();
        let decoded = StorageValue::decode("x.bin", bytes).unwrap();
        assert_eq!(decoded, v);
    }
}
