use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::billing::BudgetState;
use crate::error::{QuizError, Result};

const KEY_API_KEY: &str = "byok";
const KEY_BUDGET_USD: &str = "aiBudgetUsd";
const KEY_SPENT_USD: &str = "aiSpentUsd";

/// Client-local string key/value persistence.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Volatile store, used in tests and for one-shot runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A flat JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            read_entries(&path).map_err(|e| QuizError::Storage(format!("{:#}", e)))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<()> {
        write_entries(&self.path, &self.entries).map_err(|e| QuizError::Storage(format!("{:#}", e)))
    }
}

fn read_entries(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    let entries = serde_json::from_str(&raw)
        .with_context(|| format!("State file is not a JSON object of strings: {}", path.display()))?;
    Ok(entries)
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, raw)
        .with_context(|| format!("Failed to write state file: {}", path.display()))?;
    Ok(())
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Missing, unparsable or non-finite values read as zero.
fn read_usd(store: &dyn KeyValueStore, key: &str) -> f64 {
    store
        .get(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

pub fn load_budget(store: &dyn KeyValueStore) -> BudgetState {
    BudgetState::new(read_usd(store, KEY_BUDGET_USD), read_usd(store, KEY_SPENT_USD))
}

pub fn save_budget(store: &mut dyn KeyValueStore, state: &BudgetState) -> Result<()> {
    store.set(KEY_BUDGET_USD, &state.budget_usd().to_string())?;
    store.set(KEY_SPENT_USD, &state.spent_usd().to_string())
}

pub fn load_api_key(store: &dyn KeyValueStore) -> Option<String> {
    store.get(KEY_API_KEY).filter(|k| !k.trim().is_empty())
}

pub fn save_api_key(store: &mut dyn KeyValueStore, key: Option<&str>) -> Result<()> {
    match key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(k) => store.set(KEY_API_KEY, k),
        None => store.remove(KEY_API_KEY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        let mut store = MemoryStore::default();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_budget_defaults_to_zero() {
        let store = MemoryStore::default();
        assert_eq!(load_budget(&store), BudgetState::default());
    }

    #[test]
    fn test_garbage_values_read_as_zero() {
        let mut store = MemoryStore::default();
        store.set(KEY_BUDGET_USD, "lots").unwrap();
        store.set(KEY_SPENT_USD, "NaN").unwrap();
        let state = load_budget(&store);
        assert_eq!(state.budget_usd(), 0.0);
        assert_eq!(state.spent_usd(), 0.0);
    }

    #[test]
    fn test_budget_persists() {
        let mut store = MemoryStore::default();
        let mut state = BudgetState::new(2.0, 0.0);
        state.record_spend(0.125);
        save_budget(&mut store, &state).unwrap();

        assert_eq!(load_budget(&store), state);
    }

    #[test]
    fn test_api_key_set_and_clear() {
        let mut store = MemoryStore::default();
        save_api_key(&mut store, Some("  sk-abc  ")).unwrap();
        assert_eq!(load_api_key(&store).as_deref(), Some("sk-abc"));

        save_api_key(&mut store, None).unwrap();
        assert!(load_api_key(&store).is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        {
            let mut store = JsonFileStore::open(&path).unwrap();
            save_budget(&mut store, &BudgetState::new(5.0, 1.5)).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        let state = load_budget(&reopened);
        assert_eq!(state.budget_usd(), 5.0);
        assert_eq!(state.spent_usd(), 1.5);
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(matches!(JsonFileStore::open(&path), Err(QuizError::Storage(_))));
    }
}
