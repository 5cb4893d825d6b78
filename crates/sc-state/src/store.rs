//! Durable keyspace for sidechain records.
//!
//! Every record lives under a two-part key: a one-byte record-type tag followed
//! by the 32-byte sidechain id. The tag keeps sidechain records apart from any
//! other record kind sharing the same database. Values are bincode-encoded
//! [`ScInfo`] records.

use crate::error::StoreError;
use crate::sidechain::ScInfo;
use log::info;
use parking_lot::Mutex;
use rocksdb::{BlockBasedOptions, Cache, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use sc_core::{ScId, Uint256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Record-type tag for sidechain info records.
pub const DB_SC_INFO: u8 = b'i';

pub const KEY_LEN: usize = 33;

pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a>;

pub fn encode_key(sc_id: &ScId) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[0] = DB_SC_INFO;
    key[1..].copy_from_slice(sc_id.as_bytes());
    key
}

pub fn decode_key(key: &[u8]) -> Result<ScId, StoreError> {
    if key.len() != KEY_LEN {
        return Err(StoreError::MalformedKey(key.len()));
    }
    if key[0] != DB_SC_INFO {
        return Err(StoreError::InvalidRecordType(key[0]));
    }
    Uint256::from_slice(&key[1..]).ok_or(StoreError::MalformedKey(key.len()))
}

pub fn encode_record(info: &ScInfo) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(info)?)
}

pub fn decode_record(bytes: &[u8]) -> Result<ScInfo, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Ordered key-value store holding the committed sidechain records.
///
/// Each `put_sync`/`delete_sync` is one batch, durable before it returns.
pub trait RecordStore: Send {
    fn put_sync(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete_sync(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Every stored `(key, value)` pair in key order.
    fn scan(&self) -> RecordIter<'_>;
}

/// RocksDB-backed record store.
pub struct RocksRecordStore {
    db: DB,
    path: PathBuf,
}

impl RocksRecordStore {
    /// Open (creating if missing) the store at `path` with a block cache of
    /// `cache_size` bytes. With `wipe` the existing database is destroyed first.
    pub fn open(path: impl AsRef<Path>, cache_size: usize, wipe: bool) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);

        let cache = Cache::new_lru_cache(cache_size);
        let mut table_opts = BlockBasedOptions::default();
        table_opts.set_block_cache(&cache);
        db_opts.set_block_based_table_factory(&table_opts);

        if wipe {
            info!(target: "sc", "wiping sidechain database at {}", path.display());
            DB::destroy(&db_opts, &path)?;
        }

        let db = DB::open(&db_opts, &path)?;
        info!(
            target: "sc",
            "opened sidechain database at {} (cache {} bytes)",
            path.display(),
            cache_size
        );
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync_write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db.write_opt(batch, &write_opts)?;
        Ok(())
    }
}

impl RecordStore for RocksRecordStore {
    fn put_sync(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        batch.put(key, value);
        self.sync_write(batch)
    }

    fn delete_sync(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        batch.delete(key);
        self.sync_write(batch)
    }

    fn scan(&self) -> RecordIter<'_> {
        Box::new(self.db.iterator(IteratorMode::Start).map(|item| {
            item.map(|(key, value)| (key.into_vec(), value.into_vec()))
                .map_err(StoreError::from)
        }))
    }
}

/// In-memory record store for regtest nodes and tests.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.records.lock().get(key).cloned()
    }
}

impl RecordStore for MemoryRecordStore {
    fn put_sync(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.records.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete_sync(&self, key: &[u8]) -> Result<(), StoreError> {
        self.records.lock().remove(key);
        Ok(())
    }

    fn scan(&self) -> RecordIter<'_> {
        let snapshot: Vec<_> = self
            .records
            .lock()
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.clone())))
            .collect();
        Box::new(snapshot.into_iter())
    }
}
