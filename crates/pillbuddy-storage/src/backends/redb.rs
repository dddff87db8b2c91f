//! Redb storage backend implementation.
//!
//! Provides persistent storage using the redb embedded database. redb allows
//! a single write transaction at a time, which is what makes
//! [`StorageBackend::update`] atomic here.

use pillbuddy_core::storage::{Result, StorageBackend, StorageError, UpdateFn};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Single unified table for all data - using namespaced keys
// Format: "table_name:key"
const UNIFIED_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("unified_storage");

/// Configuration for RedbBackend.
#[derive(Debug, Clone)]
pub struct RedbBackendConfig {
    /// Path to the database file.
    pub path: String,

    /// Create parent directories if they don't exist.
    pub create_dirs: bool,
}

impl RedbBackendConfig {
    /// Create a new config with the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create_dirs: true,
        }
    }

    /// Set whether to create parent directories.
    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    /// Create a config for a throwaway database.
    pub fn memory() -> Self {
        Self {
            path: ":memory:".to_string(),
            create_dirs: false,
        }
    }
}

/// Create a namespaced key for the unified table.
fn make_key(table: &str, key: &str) -> String {
    let mut result = String::with_capacity(table.len() + key.len() + 1);
    result.push_str(table);
    result.push(':');
    result.push_str(key);
    result
}

fn backend_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// redb-based persistent storage backend.
pub struct RedbBackend {
    db: Arc<Database>,
    /// Storage path (":memory:" for a temporary file).
    path: String,
    /// Actual file path for temporary databases (for cleanup).
    temp_path: Option<PathBuf>,
}

impl RedbBackend {
    /// Create a new RedbBackend with the given configuration.
    pub fn new(config: RedbBackendConfig) -> Result<Self> {
        let path = &config.path;

        let (db, temp_path) = if path == ":memory:" {
            // redb doesn't support true in-memory databases.
            let temp_path =
                std::env::temp_dir().join(format!("pillbuddy_{}.redb", uuid::Uuid::new_v4()));
            let db = Database::create(&temp_path).map_err(backend_err)?;
            (db, Some(temp_path))
        } else {
            let path_ref = Path::new(path);
            if config.create_dirs {
                if let Some(parent) = path_ref.parent() {
                    std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
                }
            }

            let db = if path_ref.exists() {
                Database::open(path_ref).map_err(backend_err)?
            } else {
                Database::create(path_ref).map_err(backend_err)?
            };
            (db, None)
        };

        // Read transactions fail on a table that was never written.
        let txn = db.begin_write().map_err(backend_err)?;
        txn.open_table(UNIFIED_TABLE).map_err(backend_err)?;
        txn.commit().map_err(backend_err)?;

        Ok(Self {
            db: Arc::new(db),
            path: config.path,
            temp_path,
        })
    }

    /// Open or create a redb backend at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(RedbBackendConfig::new(
            path.as_ref().to_string_lossy().to_string(),
        ))
    }

    /// Get the storage path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl StorageBackend for RedbBackend {
    fn write(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        let namespaced = make_key(table, key);
        let txn = self.db.begin_write().map_err(backend_err)?;
        {
            let mut t = txn.open_table(UNIFIED_TABLE).map_err(backend_err)?;
            t.insert(&*namespaced, value).map_err(backend_err)?;
        }
        txn.commit().map_err(backend_err)?;
        Ok(())
    }

    fn read(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let namespaced = make_key(table, key);
        let txn = self.db.begin_read().map_err(backend_err)?;
        let t = txn.open_table(UNIFIED_TABLE).map_err(backend_err)?;
        let value = t
            .get(&*namespaced)
            .map_err(backend_err)?
            .map(|v| v.value().to_vec());
        Ok(value)
    }

    fn delete(&self, table: &str, key: &str) -> Result<bool> {
        let namespaced = make_key(table, key);
        let txn = self.db.begin_write().map_err(backend_err)?;
        let removed = {
            let mut t = txn.open_table(UNIFIED_TABLE).map_err(backend_err)?;
            let removed = t.remove(&*namespaced).map_err(backend_err)?.is_some();
            removed
        };
        txn.commit().map_err(backend_err)?;
        Ok(removed)
    }

    fn scan(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let table_prefix = make_key(table, prefix);
        let table_prefix_len = table.len() + 1;

        let txn = self.db.begin_read().map_err(backend_err)?;
        let t = txn.open_table(UNIFIED_TABLE).map_err(backend_err)?;

        let mut results = Vec::new();
        for item in t.iter().map_err(backend_err)? {
            let (key, value) = item.map_err(backend_err)?;
            let key_str = key.value();
            if key_str.starts_with(&table_prefix) {
                if let Some(rest) = key_str.get(table_prefix_len..) {
                    results.push((rest.to_string(), value.value().to_vec()));
                }
            }
        }

        Ok(results)
    }

    fn update(&self, table: &str, key: &str, f: &mut UpdateFn<'_>) -> Result<Option<Vec<u8>>> {
        let namespaced = make_key(table, key);
        let txn = self.db.begin_write().map_err(backend_err)?;
        let stored = {
            let mut t = txn.open_table(UNIFIED_TABLE).map_err(backend_err)?;
            let current = t
                .get(&*namespaced)
                .map_err(backend_err)?
                .map(|v| v.value().to_vec());
            // An error from `f` drops the transaction, which aborts it.
            match f(current.as_deref())? {
                Some(next) => {
                    t.insert(&*namespaced, &*next).map_err(backend_err)?;
                    Some(next)
                }
                None => current,
            }
        };
        txn.commit().map_err(backend_err)?;
        Ok(stored)
    }

    fn is_persistent(&self) -> bool {
        self.path != ":memory:"
    }
}

/// Cleanup temporary database file when RedbBackend is dropped.
impl Drop for RedbBackend {
    fn drop(&mut self) {
        if let Some(temp_path) = &self.temp_path {
            if let Err(e) = std::fs::remove_file(temp_path) {
                tracing::debug!(
                    "Failed to remove temporary database file {}: {}",
                    temp_path.display(),
                    e
                );
            }
        }
    }
}
