//! File-backed storage on redb.
//!
//! Every write runs in its own redb transaction, so a record replace is
//! all-or-nothing and durable once `put` returns.
//!
//! ```yaml
//! store:
//!   backend: redb
//!   path: /data/talent-match.redb
//! ```

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{StoreBackend, StoreError};

const EMBEDDINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("embeddings");

fn backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::backend(e.to_string())
}

pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(backend_err)?;

        let write_txn = db.begin_write().map_err(backend_err)?;
        {
            // Opening inside a write transaction creates the table.
            let _table = write_txn.open_table(EMBEDDINGS_TABLE).map_err(backend_err)?;
        }
        write_txn.commit().map_err(backend_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn write<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut redb::Table<'_, &'static str, &'static [u8]>) -> Result<(), StoreError>,
    {
        let write_txn = self.db.begin_write().map_err(backend_err)?;
        {
            let mut table = write_txn.open_table(EMBEDDINGS_TABLE).map_err(backend_err)?;
            f(&mut table)?;
        }
        write_txn.commit().map_err(backend_err)
    }
}

impl StoreBackend for RedbBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write(|table| {
            table.insert(key, value).map_err(backend_err)?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read().map_err(backend_err)?;
        let table = read_txn.open_table(EMBEDDINGS_TABLE).map_err(backend_err)?;
        let value = table.get(key).map_err(backend_err)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let read_txn = self.db.begin_read().map_err(backend_err)?;
        let table = read_txn.open_table(EMBEDDINGS_TABLE).map_err(backend_err)?;

        for item in table.range(prefix..).map_err(backend_err)? {
            let (key, value) = item.map_err(backend_err)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            visitor(key, value.value())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_replaces_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("store.redb")).unwrap();

        backend.put("job:1", b"value1").unwrap();
        assert_eq!(backend.get("job:1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(backend.get("job:2").unwrap(), None);

        backend.put("job:1", b"value2").unwrap();
        assert_eq!(backend.get("job:1").unwrap(), Some(b"value2".to_vec()));
    }

    #[test]
    fn prefix_scan_only_visits_matching_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("store.redb")).unwrap();
        backend.put("candidate:1", b"c").unwrap();
        backend.put("job:2", b"b").unwrap();
        backend.put("job:1", b"a").unwrap();

        let mut seen = Vec::new();
        backend
            .scan_prefix("job:", &mut |key, value| {
                seen.push((key.to_string(), value.to_vec()));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![
                ("job:1".to_string(), b"a".to_vec()),
                ("job:2".to_string(), b"b".to_vec()),
            ]
        );
    }

    #[test]
    fn reopen_sees_committed_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.put("job:1", b"persisted").unwrap();
        }
        let backend = RedbBackend::open(&path).unwrap();
        assert_eq!(backend.get("job:1").unwrap(), Some(b"persisted".to_vec()));
    }
}
