//! In-memory storage backend.
//!
//! Used by tests and by the CLI when no data directory is configured.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use pillbuddy_core::storage::{Result, StorageBackend, UpdateFn};

fn make_key(table: &str, key: &str) -> String {
    format!("{}:{}", table, key)
}

/// Ordered in-memory map behind a single lock.
#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all tables.
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn write(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        self.data.lock().insert(make_key(table, key), value.to_vec());
        Ok(())
    }

    fn read(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().get(&make_key(table, key)).cloned())
    }

    fn delete(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self.data.lock().remove(&make_key(table, key)).is_some())
    }

    fn scan(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let table_prefix = make_key(table, prefix);
        let strip = table.len() + 1;
        let data = self.data.lock();
        Ok(data
            .range(table_prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&table_prefix))
            .map(|(k, v)| (k[strip..].to_string(), v.clone()))
            .collect())
    }

    fn update(&self, table: &str, key: &str, f: &mut UpdateFn<'_>) -> Result<Option<Vec<u8>>> {
        let namespaced = make_key(table, key);
        let mut data = self.data.lock();
        let current = data.get(&namespaced).map(Vec::as_slice);
        match f(current)? {
            Some(next) => {
                data.insert(namespaced, next.clone());
                Ok(Some(next))
            }
            None => Ok(data.get(&namespaced).cloned()),
        }
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_scan_is_table_scoped() {
        let backend = MemoryBackend::new();
        backend.write("a", "x#1", b"1").unwrap();
        backend.write("a", "x#2", b"2").unwrap();
        backend.write("a", "y#1", b"3").unwrap();
        backend.write("b", "x#1", b"4").unwrap();

        let items = backend.scan("a", "x#").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, "x#1");
    }

    #[test]
    fn test_update_keep_returns_current() {
        let backend = MemoryBackend::new();
        backend.write("t", "k", b"old").unwrap();

        let stored = backend.update("t", "k", &mut |_: Option<&[u8]>| Ok(None)).unwrap();
        assert_eq!(stored.as_deref(), Some(&b"old"[..]));
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_writes() {
        let backend = Arc::new(MemoryBackend::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backend = backend.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        backend
                            .update("t", "counter", &mut |current: Option<&[u8]>| {
                                let n: u64 = current
                                    .map(|b| String::from_utf8_lossy(b).parse().unwrap())
                                    .unwrap_or(0);
                                Ok(Some((n + 1).to_string().into_bytes()))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let value = backend.read("t", "counter").unwrap().unwrap();
        assert_eq!(String::from_utf8(value).unwrap(), "800");
    }
}
