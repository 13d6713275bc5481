//! In-memory [`ObjectStore`] double used by other crates' unit tests.

use crate::{ObjectStore, StorageValue};
use async_trait::async_trait;
use fleet_error::FleetError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Keeps everything in a `BTreeMap` guarded by a `Mutex`; never touches
/// disk or network.
#[derive(Debug, Default)]
pub struct NullStore {
    data: Mutex<BTreeMap<String, (StorageValue, u64)>>,
    clock: Mutex<u64>,
}

impl NullStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> u64 {
        let mut clock = self.clock.lock().expect("clock lock poisoned");
        *clock += 1;
        *clock
    }
}

#[async_trait]
impl ObjectStore for NullStore {
    async fn put(&self, key: &str, value: StorageValue) -> Result<(), FleetError> {
        let seq = self.tick();
        let mut data = self.data.lock().expect("data lock poisoned");
        data.entry(key.to_string())
            .and_modify(|(v, _)| *v = value.clone())
            .or_insert((value, seq));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StorageValue, FleetError> {
        let data = self.data.lock().expect("data lock poisoned");
        data.get(key)
            .map(|(v, _)| v.clone())
            .ok_or_else(|| FleetError::not_found(format!("no such key: {key}")))
    }

    async fn delete(&self, key: &str) -> Result<(), FleetError> {
        let mut data = self.data.lock().expect("data lock poisoned");
        data.remove(key)
            .map(|_| ())
            .ok_or_else(|| FleetError::not_found(format!("no such key: {key}")))
    }

    async fn exists(&self, key: &str) -> Result<bool, FleetError> {
        Ok(self.data.lock().expect("data lock poisoned").contains_key(key))
    }

    async fn append(&self, key: &str, value: Value) -> Result<(), FleetError> {
        let seq = self.tick();
        let mut data = self.data.lock().expect("data lock poisoned");
        match data.get_mut(key) {
            Some((StorageValue::JsonLines(items), _)) => items.push(value),
            Some(_) => {
                return Err(FleetError::invalid_argument(format!(
                    "{key} is not a jsonl key"
                )));
            }
            None => {
                data.insert(key.to_string(), (StorageValue::JsonLines(vec![value]), seq));
            }
        }
        Ok(())
    }

    async fn append_many(&self, key: &str, values: Vec<Value>) -> Result<(), FleetError> {
        let seq = self.tick();
        let mut data = self.data.lock().expect("data lock poisoned");
        match data.get_mut(key) {
            Some((StorageValue::JsonLines(items), _)) => items.extend(values),
            Some(_) => {
                return Err(FleetError::invalid_argument(format!(
                    "{key} is not a jsonl key"
                )));
            }
            None => {
                data.insert(key.to_string(), (StorageValue::JsonLines(values), seq));
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, FleetError> {
        let data = self.data.lock().expect("data lock poisoned");
        let mut entries: Vec<(&String, u64)> = data.iter().map(|(k, (_, seq))| (k, *seq)).collect();
        entries.sort_by_key(|(_, seq)| *seq);
        Ok(entries.into_iter().map(|(k, _)| k.clone()).collect())
    }

    fn path(&self, key: &str) -> String {
        format!("null://{key}")
    }

    async fn ensure_bucket(&self) -> Result<(), FleetError> {
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool, FleetError> {
        Ok(true)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
