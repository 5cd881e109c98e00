//! Keyed record store backing the gate state (quota counter, throttle and
//! daily flags).
//!
//! Records are opaque JSON strings. The only write primitive is
//! `compare_and_set`, so callers cannot do a blind read-then-write: an update
//! lands only if the record still holds what the caller read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Current record for `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `new` only if the stored record equals `expected`
    /// (`None` = key must be absent). Returns whether the write happened.
    async fn compare_and_set(&self, key: &str, expected: Option<&str>, new: &str)
        -> Result<bool>;

    fn name(&self) -> &'static str;
}

/// Process-wide in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let g = self.inner.lock().expect("state store mutex poisoned");
        Ok(g.get(key).cloned())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool> {
        let mut g = self.inner.lock().expect("state store mutex poisoned");
        if g.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        g.insert(key.to_string(), new.to_string());
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// One JSON file per key under `dir`. Writes go through a temp file and a
/// rename; compare-and-set is serialised inside this process.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.read(key).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.read(key).await?.as_deref() != expected {
            return Ok(false);
        }

        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, new.as_bytes())
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
