//! Copy-on-write overlay over the committed sidechain registry.
//!
//! A view captures the committed map once, at construction, and stages every
//! change in its own change-set:
//!
//! - `modified`: records created or touched through this view
//! - `erased`: committed records scheduled for removal
//!
//! Lookups resolve `modified`, then `erased`, then the captured base, so the
//! view behaves as a complete, isolated snapshot no matter what happens to the
//! registry meanwhile. Nothing reaches the registry or the store until
//! [`ScView::flush`], which consumes the view.
//!
//! Any failed mutation leaves the view partially updated. Callers must drop it.

use crate::error::ViewError;
use crate::registry::SidechainRegistry;
use crate::sidechain::{ScCreationParameters, ScInfo, ScInfoMap, ScLookup};
use log::{debug, error};
use sc_core::{format_money, money_range, Amount, Block, BlockHash, ScCreationOutput, ScId, Transaction, TxHash, TxUndo};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Single-owner staging area for sidechain changes.
pub struct ScView<'a> {
    registry: &'a SidechainRegistry,
    base: Arc<ScInfoMap>,
    base_generation: u64,
    modified: ScInfoMap,
    erased: BTreeSet<ScId>,
}

impl<'a> ScView<'a> {
    pub(crate) fn new(
        registry: &'a SidechainRegistry,
        base: Arc<ScInfoMap>,
        base_generation: u64,
    ) -> Self {
        ScView {
            registry,
            base,
            base_generation,
            modified: ScInfoMap::new(),
            erased: BTreeSet::new(),
        }
    }

    fn lookup(&self, sc_id: &ScId) -> Option<&ScInfo> {
        if let Some(info) = self.modified.get(sc_id) {
            return Some(info);
        }
        if self.erased.contains(sc_id) {
            return None;
        }
        self.base.get(sc_id)
    }

    /// Mutable access, copying the base record into the change-set first.
    fn lookup_mut(&mut self, sc_id: &ScId) -> Option<&mut ScInfo> {
        if !self.modified.contains_key(sc_id) {
            if self.erased.contains(sc_id) {
                return None;
            }
            let info = self.base.get(sc_id)?.clone();
            self.modified.insert(*sc_id, info);
        }
        self.modified.get_mut(sc_id)
    }

    pub fn exists(&self, sc_id: &ScId) -> bool {
        self.lookup(sc_id).is_some()
    }

    pub fn get(&self, sc_id: &ScId) -> Option<ScInfo> {
        self.lookup(sc_id).cloned()
    }

    pub fn balance(&self, sc_id: &ScId) -> Option<Amount> {
        self.lookup(sc_id).map(|info| info.balance)
    }

    /// Every sidechain visible through this view.
    pub fn sidechain_ids(&self) -> BTreeSet<ScId> {
        self.base
            .keys()
            .filter(|id| !self.erased.contains(*id))
            .chain(self.modified.keys())
            .copied()
            .collect()
    }

    /// Records staged for writing on flush.
    pub fn pending_writes(&self) -> usize {
        self.modified.len()
    }

    /// Sidechains staged for erasure on flush.
    pub fn pending_erasures(&self) -> usize {
        self.erased.len()
    }

    /// Stage the effects of a transaction mined in `block` at `height`:
    /// every creation output first, then every forward transfer.
    pub fn apply_tx(&mut self, tx: &Transaction, block: &Block, height: i32) -> Result<(), ViewError> {
        let tx_hash = tx.hash();
        debug!(target: "sc", "applying tx={} to sidechain view", tx_hash);

        let block_hash = block.hash();
        for creation in &tx.sc_creations {
            self.create_sidechain(creation, &tx_hash, &block_hash, height)?;
        }

        for ft in &tx.forward_transfers {
            self.update_balance(&ft.sc_id, ft.value).map_err(|e| {
                error!(
                    target: "sc",
                    "could not apply forward transfer of tx={} to scId={}: {}",
                    tx_hash, ft.sc_id, e
                );
                e
            })?;
        }
        Ok(())
    }

    /// Reverse one transaction: balances first, then creations. A sidechain is
    /// removed only once its balance is back to exactly zero.
    pub fn undo_tx(&mut self, undo: &TxUndo) -> Result<(), ViewError> {
        for ft in &undo.forward_transfers {
            let amount = ft.value.checked_neg().ok_or(ViewError::BalanceOverflow(ft.sc_id))?;
            self.update_balance(&ft.sc_id, amount)?;
        }

        for creation in &undo.sc_creations {
            debug!(target: "sc", "removing scId={}", creation.sc_id);
            self.delete_sidechain(&creation.sc_id)?;
        }
        Ok(())
    }

    /// Stage a new sidechain with zero balance.
    pub fn create_sidechain(
        &mut self,
        creation: &ScCreationOutput,
        tx_hash: &TxHash,
        block_hash: &BlockHash,
        height: i32,
    ) -> Result<(), ViewError> {
        let sc_id = creation.sc_id;
        if self.exists(&sc_id) {
            error!(target: "sc", "scId={} already in view", sc_id);
            return Err(ViewError::AlreadyExists(sc_id));
        }

        let info = ScInfo {
            creation_block_hash: *block_hash,
            creation_block_height: height,
            creation_tx_hash: *tx_hash,
            balance: 0,
            creation_data: ScCreationParameters {
                withdrawal_epoch_length: creation.withdrawal_epoch_length,
            },
            immature_amounts: Default::default(),
        };

        // Re-creating an id erased in this same view replaces the committed
        // record on flush instead of erasing it.
        self.erased.remove(&sc_id);
        self.modified.insert(sc_id, info);
        debug!(target: "sc", "scId[{}] added in view", sc_id);
        Ok(())
    }

    /// Add `amount` (possibly negative) to a staged balance.
    pub fn update_balance(&mut self, sc_id: &ScId, amount: Amount) -> Result<(), ViewError> {
        let info = self.lookup_mut(sc_id).ok_or_else(|| {
            error!(target: "sc", "can not update balance, could not find scId={}", sc_id);
            ViewError::NotFound(*sc_id)
        })?;

        let before = info.balance;
        let after = before
            .checked_add(amount)
            .ok_or(ViewError::BalanceOverflow(*sc_id))?;
        if after < 0 {
            error!(
                target: "sc",
                "can not update balance with amount[{}] for scId={}, would be negative",
                format_money(amount),
                sc_id
            );
            return Err(ViewError::NegativeBalance {
                sc_id: *sc_id,
                balance: before,
                amount,
            });
        }
        if !money_range(after) {
            error!(
                target: "sc",
                "balance of scId={} would exceed the money supply: {}",
                sc_id,
                format_money(after)
            );
            return Err(ViewError::BalanceOverflow(*sc_id));
        }

        info.balance = after;
        debug!(
            target: "sc",
            "scId={} balance: {} -> {}",
            sc_id,
            format_money(before),
            format_money(after)
        );
        Ok(())
    }

    /// Remove a sidechain whose balance has been driven back to zero.
    pub fn delete_sidechain(&mut self, sc_id: &ScId) -> Result<(), ViewError> {
        let balance = match self.lookup(sc_id) {
            Some(info) => info.balance,
            None => {
                error!(target: "sc", "scId={} not in view", sc_id);
                return Err(ViewError::NotFound(*sc_id));
            }
        };

        if balance != 0 {
            error!(
                target: "sc",
                "scId={} balance not null: {}",
                sc_id,
                format_money(balance)
            );
            return Err(ViewError::NonZeroBalance {
                sc_id: *sc_id,
                balance,
            });
        }

        self.remove(sc_id);
        Ok(())
    }

    /// Unconditionally hide `sc_id` from this view and, if it is committed,
    /// schedule its erasure.
    pub fn remove(&mut self, sc_id: &ScId) {
        if self.modified.remove(sc_id).is_some() {
            debug!(target: "sc", "scId={} removed from view", sc_id);
        }
        // Ids created in this view were never committed: dropping the staged
        // record is enough.
        if self.base.contains_key(sc_id) {
            debug!(target: "sc", "scId={} scheduled for erasure", sc_id);
            self.erased.insert(*sc_id);
        }
    }

    /// Commit the change-set to the registry and its store.
    ///
    /// Runs under the registry lock. Fails if another flush landed since this
    /// view was opened, or if an erase target is missing from the registry.
    pub fn flush(self) -> Result<(), ViewError> {
        let ScView {
            registry,
            base,
            base_generation,
            modified,
            erased,
        } = self;
        debug!(
            target: "sc",
            "flushing sidechain view: {} to write, {} to erase",
            modified.len(),
            erased.len()
        );
        // Release our hold on the snapshot so the registry can update it in place.
        drop(base);
        registry.commit(base_generation, modified, erased)
    }
}

impl ScLookup for ScView<'_> {
    fn sidechain_info(&self, sc_id: &ScId) -> Option<ScInfo> {
        self.get(sc_id)
    }

    fn sidechain_exists(&self, sc_id: &ScId) -> bool {
        self.exists(sc_id)
    }
}
