use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persistent string-keyed JSON values.
pub trait KeyValueStore: Send {
    fn get_raw(&self, key: &str) -> Option<Value>;
    fn set_raw(&mut self, key: &str, value: Value) -> Result<()>;
}

impl dyn KeyValueStore {
    /// Stored value for `key`, or `default` when it is absent or does not
    /// decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(value) = self.get_raw(key) else {
            return default;
        };
        match serde_json::from_value(value) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("ignoring undecodable value for {}: {}", key, err);
                default
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_value(value)
            .with_context(|| format!("failed to encode value for {}", key))?;
        self.set_raw(key, encoded)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set_raw(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read state: {}", path.display()))?;
            match serde_json::from_str(&content) {
                Ok(values) => values,
                Err(err) => {
                    warn!("state file {} is not a JSON object: {}", path.display(), err);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!("opened state {} ({} keys)", path.display(), values.len());
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create state directory: {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write state: {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set_raw(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}
