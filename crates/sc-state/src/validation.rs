//! Consensus rules for sidechain outputs.
//!
//! Three entry points feed the node's acceptance pipeline:
//!
//! - [`ScValidator::check_tx_semantic_validity`]: context-free structure checks
//! - [`ScValidator::check_applicable_to_state`]: existence checks against the
//!   registry or an overlay
//! - [`ScValidator::check_allowed_in_mempool`]: double-creation detection
//!   against pending transactions
//!
//! A failed check yields a [`Rejection`] carrying the reason, the reject code
//! and the misbehavior weight charged to the peer that relayed the transaction.

use crate::sidechain::ScLookup;
use log::{debug, warn};
use sc_core::{Transaction, TxMemPool};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Reject code for consensus-invalid transactions.
pub const REJECT_INVALID: u8 = 0x10;

/// Misbehavior weight for structurally invalid transactions.
pub const DOS_SCORE_INVALID: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    VersionMismatch,
    CreationMissingFunding,
    DuplicateCreation,
    AlreadyCreated,
    TargetNotCreated,
    CreationConflict,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::VersionMismatch => "version-mismatch",
            RejectReason::CreationMissingFunding => "creation-missing-funding",
            RejectReason::DuplicateCreation => "duplicate-creation",
            RejectReason::AlreadyCreated => "already-created",
            RejectReason::TargetNotCreated => "target-not-created",
            RejectReason::CreationConflict => "creation-conflict",
        }
    }

    /// Reason string relayed to peers in reject messages.
    pub fn network_reason(&self) -> &'static str {
        match self {
            RejectReason::VersionMismatch => "sidechain-tx-version",
            RejectReason::CreationMissingFunding => "sidechain-creation-missing-fwd-transfer",
            RejectReason::DuplicateCreation => "sidechain-creation-duplicate",
            RejectReason::AlreadyCreated => "sidechain-already-created",
            RejectReason::TargetNotCreated => "sidechain-not-created",
            RejectReason::CreationConflict => "sidechain-creation",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {message}")]
pub struct Rejection {
    pub reason: RejectReason,
    pub reject_code: u8,
    pub dos_score: u32,
    pub message: String,
}

impl Rejection {
    fn new(reason: RejectReason, dos_score: u32, message: String) -> Self {
        warn!(target: "sc", "{}: {}", reason, message);
        Rejection {
            reason,
            reject_code: REJECT_INVALID,
            dos_score,
            message,
        }
    }

    /// Semantic failures are provably invalid and charge full misbehavior weight.
    fn invalid(reason: RejectReason, message: String) -> Self {
        Self::new(reason, DOS_SCORE_INVALID, message)
    }

    /// State-dependent failures may be a timing artifact and charge nothing.
    fn unapplicable(reason: RejectReason, message: String) -> Self {
        Self::new(reason, 0, message)
    }
}

pub struct ScValidator;

impl ScValidator {
    /// Structure checks that need no chain state.
    pub fn check_tx_semantic_validity(tx: &Transaction) -> Result<(), Rejection> {
        let tx_hash = tx.hash();

        if !tx.is_sc_version() {
            if !tx.cc_is_null() {
                return Err(Rejection::invalid(
                    RejectReason::VersionMismatch,
                    format!(
                        "tx={} version {} can not carry sidechain outputs",
                        tx_hash, tx.version
                    ),
                ));
            }
            return Ok(());
        }

        if tx.has_joinsplits() {
            return Err(Rejection::invalid(
                RejectReason::VersionMismatch,
                format!("sidechain tx={} can not carry joinsplits", tx_hash),
            ));
        }

        let mut created = BTreeSet::new();
        for creation in &tx.sc_creations {
            if !created.insert(creation.sc_id) {
                return Err(Rejection::invalid(
                    RejectReason::DuplicateCreation,
                    format!(
                        "tx={} creates scId={} more than once",
                        tx_hash, creation.sc_id
                    ),
                ));
            }
            if !tx.has_forward_transfer_to(&creation.sc_id) {
                return Err(Rejection::invalid(
                    RejectReason::CreationMissingFunding,
                    format!(
                        "tx={} creates scId={} without a forward transfer to it",
                        tx_hash, creation.sc_id
                    ),
                ));
            }
        }

        debug!(target: "sc", "tx={} semantically valid", tx_hash);
        Ok(())
    }

    /// Creations must be new and forward transfers must target a known
    /// sidechain or one created by the same transaction.
    pub fn check_applicable_to_state<L>(tx: &Transaction, state: &L) -> Result<(), Rejection>
    where
        L: ScLookup + ?Sized,
    {
        let tx_hash = tx.hash();

        for creation in &tx.sc_creations {
            if state.sidechain_exists(&creation.sc_id) {
                return Err(Rejection::unapplicable(
                    RejectReason::AlreadyCreated,
                    format!(
                        "tx={} tries to create scId={} which already exists",
                        tx_hash, creation.sc_id
                    ),
                ));
            }
        }

        for ft in &tx.forward_transfers {
            if !state.sidechain_exists(&ft.sc_id) && !tx.has_creation_output(&ft.sc_id) {
                return Err(Rejection::unapplicable(
                    RejectReason::TargetNotCreated,
                    format!(
                        "tx={} transfers to scId={} which is neither registered nor created by it",
                        tx_hash, ft.sc_id
                    ),
                ));
            }
        }

        debug!(target: "sc", "tx={} applicable to sidechain state", tx_hash);
        Ok(())
    }

    /// True when some other pending transaction already declares one of the
    /// sidechains `tx` creates.
    ///
    /// The pooled copy of `tx` itself is skipped, so re-checking a transaction
    /// already in the pool accepts it.
    pub fn has_creation_conflicts_in_mempool(pool: &TxMemPool, tx: &Transaction) -> bool {
        if tx.sc_creations.is_empty() {
            return false;
        }

        // TODO: index pending creations by scId once the pool grows large.
        let own_hash = tx.hash();
        let conflict = pool.find_transaction(|pending| {
            tx.sc_creations
                .iter()
                .any(|creation| pending.has_creation_output(&creation.sc_id))
                && pending.hash() != own_hash
        });

        match conflict {
            Some(other) => {
                debug!(
                    target: "sc",
                    "tx={} conflicts with pending tx={} on sidechain creation",
                    own_hash, other
                );
                true
            }
            None => false,
        }
    }

    pub fn check_allowed_in_mempool(pool: &TxMemPool, tx: &Transaction) -> Result<(), Rejection> {
        if Self::has_creation_conflicts_in_mempool(pool, tx) {
            return Err(Rejection::unapplicable(
                RejectReason::CreationConflict,
                format!(
                    "tx={} creates a sidechain already being created in mempool",
                    tx.hash()
                ),
            ));
        }
        Ok(())
    }
}
