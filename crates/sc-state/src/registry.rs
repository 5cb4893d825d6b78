//! Committed sidechain registry.
//!
//! The registry owns the committed `ScId -> ScInfo` mapping and the durable
//! store behind it. All of it sits under one coarse lock. Validation code never
//! mutates the registry directly: it stages changes in a [`ScView`] and commits
//! them through [`ScView::flush`], which is the only path that writes.
//!
//! The committed map is held behind an `Arc` so a view can capture it in O(1);
//! the registry copies it on write only while some view still holds the old one.

use crate::config::RegistryConfig;
use crate::error::{RegistryError, StoreError, ViewError};
use crate::sidechain::{ScInfo, ScInfoMap, ScLookup};
use crate::store::{self, RecordStore, RocksRecordStore};
use crate::view::ScView;
use log::{debug, error, info};
use parking_lot::Mutex;
use sc_core::{Amount, ScId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct RegistryInner {
    sidechains: Arc<ScInfoMap>,
    store: Option<Box<dyn RecordStore>>,
    /// Bumped on every commit; views built on an older generation are stale.
    generation: u64,
}

/// Process-wide registry of active sidechains.
///
/// Constructed once by the node and handed by reference to validation and
/// block connection code.
pub struct SidechainRegistry {
    inner: Mutex<RegistryInner>,
    load_attempted: AtomicBool,
}

impl Default for SidechainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SidechainRegistry {
    /// An empty registry with no store attached.
    pub fn new() -> Self {
        SidechainRegistry {
            inner: Mutex::new(RegistryInner {
                sidechains: Arc::new(ScInfoMap::new()),
                store: None,
                generation: 0,
            }),
            load_attempted: AtomicBool::new(false),
        }
    }

    /// Open the RocksDB store described by `config` and load every record.
    pub fn load_from_store(
        &self,
        config: &RegistryConfig,
        shutdown: &AtomicBool,
    ) -> Result<usize, RegistryError> {
        self.begin_load()?;
        let store = RocksRecordStore::open(config.store_path(), config.cache_size, config.wipe)?;
        self.populate(Box::new(store), shutdown)
    }

    /// Attach `store` and populate the registry from it.
    pub fn load_from(
        &self,
        store: Box<dyn RecordStore>,
        shutdown: &AtomicBool,
    ) -> Result<usize, RegistryError> {
        self.begin_load()?;
        self.populate(store, shutdown)
    }

    fn begin_load(&self) -> Result<(), RegistryError> {
        if self.load_attempted.swap(true, Ordering::SeqCst) {
            error!(target: "sc", "could not init sidechain registry from db more than once");
            return Err(RegistryError::AlreadyLoaded);
        }
        Ok(())
    }

    /// Scan every record of `store` into a private map, checking the shutdown
    /// flag between records. The map and the store are published only when the
    /// whole scan succeeds.
    fn populate(
        &self,
        store: Box<dyn RecordStore>,
        shutdown: &AtomicBool,
    ) -> Result<usize, RegistryError> {
        let mut inner = self.inner.lock();
        let mut loaded = ScInfoMap::new();

        for item in store.scan() {
            if shutdown.load(Ordering::Relaxed) {
                info!(target: "sc", "sidechain db scan interrupted");
                return Err(RegistryError::Interrupted);
            }

            let (key, value) = item.map_err(|e| {
                error!(target: "sc", "error occurred during sidechain db scan: {}", e);
                e
            })?;
            let sc_id = store::decode_key(&key).map_err(|e| {
                error!(target: "sc", "could not read from sidechain db: {}", e);
                e
            })?;
            let info = store::decode_record(&value).map_err(|e| {
                error!(target: "sc", "could not deserialize sidechain {}: {}", sc_id, e);
                e
            })?;

            debug!(target: "sc", "scId[{}] loaded from db", sc_id);
            loaded.insert(sc_id, info);
        }

        let count = loaded.len();
        inner.sidechains = Arc::new(loaded);
        inner.store = Some(store);
        inner.generation += 1;
        info!(target: "sc", "loaded {} sidechain(s) from db", count);
        Ok(count)
    }

    /// Existence check. With a view, only the view is consulted.
    pub fn exists(&self, sc_id: &ScId, view: Option<&ScView<'_>>) -> bool {
        match view {
            Some(view) => view.exists(sc_id),
            None => self.inner.lock().sidechains.contains_key(sc_id),
        }
    }

    /// Copy of the committed record.
    pub fn get(&self, sc_id: &ScId) -> Option<ScInfo> {
        self.inner.lock().sidechains.get(sc_id).cloned()
    }

    /// Committed balance, `None` when the sidechain is unknown.
    pub fn balance(&self, sc_id: &ScId) -> Option<Amount> {
        self.inner.lock().sidechains.get(sc_id).map(|info| info.balance)
    }

    pub fn sidechain_ids(&self) -> BTreeSet<ScId> {
        self.inner.lock().sidechains.keys().copied().collect()
    }

    /// Full copy of the committed mapping.
    pub fn copy_sidechains(&self) -> BTreeMap<ScId, ScInfo> {
        (*self.inner.lock().sidechains).clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sidechains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().sidechains.is_empty()
    }

    pub fn has_store(&self) -> bool {
        self.inner.lock().store.is_some()
    }

    /// Open an overlay over the current committed state.
    pub fn view(&self) -> ScView<'_> {
        let inner = self.inner.lock();
        ScView::new(self, Arc::clone(&inner.sidechains), inner.generation)
    }

    /// Durably write one record. Does not touch the in-memory mapping.
    pub fn write_durable(&self, sc_id: &ScId, info: &ScInfo) -> Result<(), RegistryError> {
        let inner = self.inner.lock();
        write_record(inner.store.as_deref(), sc_id, info)
    }

    /// Durably delete one record. Does not touch the in-memory mapping.
    pub fn erase_durable(&self, sc_id: &ScId) -> Result<(), RegistryError> {
        let inner = self.inner.lock();
        erase_record(inner.store.as_deref(), sc_id)
    }

    /// Commit a view's change-set. Called by [`ScView::flush`] only.
    pub(crate) fn commit(
        &self,
        view_generation: u64,
        modified: ScInfoMap,
        erased: BTreeSet<ScId>,
    ) -> Result<(), ViewError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.generation != view_generation {
            error!(
                target: "sc",
                "refusing to flush stale view (view generation {}, registry generation {})",
                view_generation, inner.generation
            );
            return Err(ViewError::StaleView {
                view: view_generation,
                registry: inner.generation,
            });
        }

        // Checked up front so an inconsistent change-set writes nothing.
        if let Some(missing) = erased.iter().find(|id| !inner.sidechains.contains_key(*id)) {
            error!(target: "sc", "scId={} scheduled for erasure is not in map", missing);
            return Err(ViewError::EraseTargetMissing(*missing));
        }

        let store = inner.store.as_deref();
        if store.is_none() && !(modified.is_empty() && erased.is_empty()) {
            error!(target: "sc", "sc db not initialized");
            return Err(RegistryError::StoreNotOpen.into());
        }

        inner.generation += 1;
        let written = modified.len();
        let removed = erased.len();

        for (sc_id, info) in modified {
            write_record(store, &sc_id, &info)?;
            Arc::make_mut(&mut inner.sidechains).insert(sc_id, info);
            debug!(target: "sc", "wrote scId={} in memory", sc_id);
        }

        for sc_id in erased {
            erase_record(store, &sc_id)?;
            Arc::make_mut(&mut inner.sidechains).remove(&sc_id);
            debug!(target: "sc", "erased scId={} from memory", sc_id);
        }

        info!(
            target: "sc",
            "flushed sidechain view: {} written, {} erased, {} active",
            written,
            removed,
            inner.sidechains.len()
        );
        Ok(())
    }
}

impl ScLookup for SidechainRegistry {
    fn sidechain_info(&self, sc_id: &ScId) -> Option<ScInfo> {
        self.get(sc_id)
    }

    fn sidechain_exists(&self, sc_id: &ScId) -> bool {
        self.exists(sc_id, None)
    }
}

fn write_record(
    store: Option<&dyn RecordStore>,
    sc_id: &ScId,
    info: &ScInfo,
) -> Result<(), RegistryError> {
    let store = store.ok_or_else(|| {
        error!(target: "sc", "sc db not initialized");
        RegistryError::StoreNotOpen
    })?;

    let result = store::encode_record(info)
        .and_then(|value| store.put_sync(&store::encode_key(sc_id), &value));
    log_store_result(result, "write", sc_id)
}

fn erase_record(store: Option<&dyn RecordStore>, sc_id: &ScId) -> Result<(), RegistryError> {
    let store = store.ok_or_else(|| {
        error!(target: "sc", "sc db not initialized");
        RegistryError::StoreNotOpen
    })?;

    let result = store.delete_sync(&store::encode_key(sc_id));
    log_store_result(result, "erase", sc_id)
}

fn log_store_result(
    result: Result<(), StoreError>,
    action: &str,
    sc_id: &ScId,
) -> Result<(), RegistryError> {
    match result {
        Ok(()) => {
            debug!(target: "sc", "{} scId={} in db", action, sc_id);
            Ok(())
        }
        Err(e) => {
            error!(target: "sc", "could not {} scId={} in db: {}", action, sc_id, e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidechain::ScCreationParameters;
    use crate::store::{encode_key, encode_record, MemoryRecordStore, RecordIter};
    use sc_core::double_sha256;

    fn record(balance: Amount) -> ScInfo {
        ScInfo {
            balance,
            creation_block_height: 1,
            creation_data: ScCreationParameters {
                withdrawal_epoch_length: 10,
            },
            ..Default::default()
        }
    }

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn put_sync(&self, _key: &[u8], _value: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Database("disk full".to_string()))
        }

        fn delete_sync(&self, _key: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Database("disk full".to_string()))
        }

        fn scan(&self) -> RecordIter<'_> {
            Box::new(std::iter::empty())
        }
    }

    #[test]
    fn test_load_populates_mapping() {
        let store = MemoryRecordStore::new();
        let a = double_sha256(b"a");
        let b = double_sha256(b"b");
        store.put_sync(&encode_key(&a), &encode_record(&record(5)).unwrap()).unwrap();
        store.put_sync(&encode_key(&b), &encode_record(&record(0)).unwrap()).unwrap();

        let registry = SidechainRegistry::new();
        let count = registry.load_from(Box::new(store), &AtomicBool::new(false)).unwrap();

        assert_eq!(count, 2);
        assert!(registry.exists(&a, None));
        assert_eq!(registry.balance(&a), Some(5));
        assert_eq!(registry.get(&b), Some(record(0)));
        assert_eq!(registry.sidechain_ids(), BTreeSet::from([a, b]));
    }

    #[test]
    fn test_second_load_rejected_without_side_effects() {
        let registry = SidechainRegistry::new();
        registry
            .load_from(Box::new(MemoryRecordStore::new()), &AtomicBool::new(false))
            .unwrap();

        let other = MemoryRecordStore::new();
        other
            .put_sync(&encode_key(&double_sha256(b"a")), &encode_record(&record(1)).unwrap())
            .unwrap();
        let err = registry.load_from(Box::new(other), &AtomicBool::new(false));
        assert!(matches!(err, Err(RegistryError::AlreadyLoaded)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_aborts_on_foreign_record_type() {
        let store = MemoryRecordStore::new();
        store
            .put_sync(&encode_key(&double_sha256(b"a")), &encode_record(&record(1)).unwrap())
            .unwrap();
        let mut foreign = encode_key(&double_sha256(b"b"));
        foreign[0] = b'z';
        store.put_sync(&foreign, b"?").unwrap();

        let registry = SidechainRegistry::new();
        let err = registry.load_from(Box::new(store), &AtomicBool::new(false));
        assert!(matches!(
            err,
            Err(RegistryError::Store(StoreError::InvalidRecordType(b'z')))
        ));
        assert!(registry.is_empty());
        assert!(!registry.has_store());
    }

    #[test]
    fn test_load_aborts_on_corrupt_value() {
        let store = MemoryRecordStore::new();
        store.put_sync(&encode_key(&double_sha256(b"a")), &[0xff]).unwrap();

        let registry = SidechainRegistry::new();
        let err = registry.load_from(Box::new(store), &AtomicBool::new(false));
        assert!(matches!(
            err,
            Err(RegistryError::Store(StoreError::Serialization(_)))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_interrupted_by_shutdown() {
        let store = MemoryRecordStore::new();
        store
            .put_sync(&encode_key(&double_sha256(b"a")), &encode_record(&record(1)).unwrap())
            .unwrap();

        let registry = SidechainRegistry::new();
        let err = registry.load_from(Box::new(store), &AtomicBool::new(true));
        assert!(matches!(err, Err(RegistryError::Interrupted)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_durable_ops_without_store() {
        let registry = SidechainRegistry::new();
        let id = double_sha256(b"a");
        assert!(matches!(
            registry.write_durable(&id, &record(1)),
            Err(RegistryError::StoreNotOpen)
        ));
        assert!(matches!(
            registry.erase_durable(&id),
            Err(RegistryError::StoreNotOpen)
        ));
    }

    #[test]
    fn test_store_failure_becomes_error() {
        let registry = SidechainRegistry::new();
        registry
            .load_from(Box::new(BrokenStore), &AtomicBool::new(false))
            .unwrap();
        let id = double_sha256(b"a");
        assert!(matches!(
            registry.write_durable(&id, &record(1)),
            Err(RegistryError::Store(StoreError::Database(_)))
        ));
        assert!(matches!(
            registry.erase_durable(&id),
            Err(RegistryError::Store(StoreError::Database(_)))
        ));
    }

    #[test]
    fn test_durable_write_is_not_published() {
        let store = MemoryRecordStore::new();
        let registry = SidechainRegistry::new();
        registry
            .load_from(Box::new(store.clone()), &AtomicBool::new(false))
            .unwrap();

        let id = double_sha256(b"a");
        registry.write_durable(&id, &record(3)).unwrap();
        assert!(store.get(&encode_key(&id)).is_some());
        assert!(!registry.exists(&id, None));

        registry.erase_durable(&id).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_balance_not_found_is_distinct_from_zero() {
        let store = MemoryRecordStore::new();
        let id = double_sha256(b"zero");
        store.put_sync(&encode_key(&id), &encode_record(&record(0)).unwrap()).unwrap();

        let registry = SidechainRegistry::new();
        registry.load_from(Box::new(store), &AtomicBool::new(false)).unwrap();
        assert_eq!(registry.balance(&id), Some(0));
        assert_eq!(registry.balance(&double_sha256(b"missing")), None);
    }
}
