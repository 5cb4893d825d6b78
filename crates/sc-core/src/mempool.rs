use crate::block::Block;
use crate::transaction::Transaction;
use crate::types::TxHash;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The pool of unconfirmed transactions waiting for block inclusion
#[derive(Default)]
pub struct TxMemPool {
    transactions: RwLock<HashMap<TxHash, Transaction>>,
}

impl TxMemPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transaction unless one with the same hash is already pending.
    ///
    /// Sidechain admission rules are checked by the caller before this point.
    pub fn add_transaction(&self, transaction: Transaction) -> bool {
        let tx_hash = transaction.hash();
        let mut transactions = self.transactions.write();

        if transactions.contains_key(&tx_hash) {
            log::warn!("Attempting to add duplicate transaction: {}", tx_hash);
            return false;
        }

        transactions.insert(tx_hash, transaction);
        log::debug!("Transaction {} added to mempool. Total: {}", tx_hash, transactions.len());
        true
    }

    /// Removes a transaction, returning it if it was pending
    pub fn remove_transaction(&self, tx_hash: &TxHash) -> Option<Transaction> {
        self.transactions.write().remove(tx_hash)
    }

    /// Drops every transaction included in `block`
    pub fn remove_for_block(&self, block: &Block) -> usize {
        let mut transactions = self.transactions.write();
        let before = transactions.len();
        for tx in &block.transactions {
            transactions.remove(&tx.hash());
        }
        before - transactions.len()
    }

    pub fn contains(&self, tx_hash: &TxHash) -> bool {
        self.transactions.read().contains_key(tx_hash)
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    /// Snapshot of the pending transactions
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.transactions.read().values().cloned().collect()
    }

    /// Returns the hash of the first pending transaction matching `pred`.
    ///
    /// The whole scan runs under a single read lock.
    pub fn find_transaction<F>(&self, mut pred: F) -> Option<TxHash>
    where
        F: FnMut(&Transaction) -> bool,
    {
        self.transactions
            .read()
            .iter()
            .find(|entry| pred(entry.1))
            .map(|(hash, _)| *hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{double_sha256, Uint256};

    #[test]
    fn test_duplicate_rejected() {
        let pool = TxMemPool::new();
        let tx = Transaction::new_sc().with_forward_transfer(double_sha256(b"x"), 1);
        assert!(pool.add_transaction(tx.clone()));
        assert!(!pool.add_transaction(tx.clone()));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&tx.hash()));
    }

    #[test]
    fn test_find_and_remove() {
        let pool = TxMemPool::new();
        let sc_id = double_sha256(b"x");
        let creator = Transaction::new_sc()
            .with_creation(sc_id, 3)
            .with_forward_transfer(sc_id, 1);
        let other = Transaction::new_sc().with_forward_transfer(sc_id, 7);
        pool.add_transaction(creator.clone());
        pool.add_transaction(other.clone());

        let mut pending: Vec<TxHash> = pool.pending_transactions().iter().map(Transaction::hash).collect();
        pending.sort();
        let mut expected = vec![creator.hash(), other.hash()];
        expected.sort();
        assert_eq!(pending, expected);

        let found = pool.find_transaction(|tx| tx.has_creation_output(&sc_id));
        assert_eq!(found, Some(creator.hash()));

        assert_eq!(pool.remove_transaction(&creator.hash()), Some(creator));
        assert!(pool.find_transaction(|tx| tx.has_creation_output(&sc_id)).is_none());

        let block = Block::new(Uint256::ZERO, 1, vec![other]);
        assert_eq!(pool.remove_for_block(&block), 1);
        assert!(pool.is_empty());
    }
}
