use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;
use crate::types::{double_sha256, BlockHash, Uint256};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: BlockHash,
    pub merkle_root: Uint256,
    pub time: u32,
}

impl BlockHeader {
    fn consensus_bytes(&self) -> [u8; 72] {
        let mut buf = [0u8; 72];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..36].copy_from_slice(self.prev_block_hash.as_bytes());
        buf[36..68].copy_from_slice(self.merkle_root.as_bytes());
        buf[68..72].copy_from_slice(&self.time.to_le_bytes());
        buf
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build a block on top of `prev_block_hash`, filling in the merkle root.
    pub fn new(prev_block_hash: BlockHash, time: u32, transactions: Vec<Transaction>) -> Self {
        let mut block = Block {
            header: BlockHeader {
                version: 4,
                prev_block_hash,
                merkle_root: Uint256::ZERO,
                time,
            },
            transactions,
        };
        block.header.merkle_root = block.compute_merkle_root();
        block
    }

    pub fn hash(&self) -> BlockHash {
        double_sha256(&self.header.consensus_bytes())
    }

    /// Merkle root over the transaction hashes; odd levels duplicate the last node.
    pub fn compute_merkle_root(&self) -> Uint256 {
        let mut level: Vec<Uint256> = self.transactions.iter().map(Transaction::hash).collect();
        if level.is_empty() {
            return Uint256::ZERO;
        }

        while level.len() > 1 {
            if level.len() % 2 == 1 {
                if let Some(last) = level.last().copied() {
                    level.push(last);
                }
            }
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut data = [0u8; 64];
                    data[..32].copy_from_slice(pair[0].as_bytes());
                    data[32..].copy_from_slice(pair[1].as_bytes());
                    double_sha256(&data)
                })
                .collect();
        }
        level[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merkle_root_single_tx_is_tx_hash() {
        let tx = Transaction::new_sc();
        let block = Block::new(Uint256::ZERO, 1, vec![tx.clone()]);
        assert_eq!(block.header.merkle_root, tx.hash());
    }

    #[test]
    fn test_block_hash_depends_on_header() {
        let a = Block::new(Uint256::ZERO, 1, vec![]);
        let b = Block::new(Uint256::ZERO, 2, vec![]);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.header.merkle_root, Uint256::ZERO);
    }

    #[test]
    fn test_merkle_root_odd_count() {
        let txs: Vec<Transaction> = (0..3)
            .map(|i| Transaction {
                lock_time: i,
                ..Transaction::new_sc()
            })
            .collect();
        let block = Block::new(Uint256::ZERO, 1, txs.clone());

        let mut with_dup = txs;
        with_dup.push(with_dup[2].clone());
        let padded = Block::new(Uint256::ZERO, 1, with_dup);
        assert_eq!(block.header.merkle_root, padded.header.merkle_root);
    }
}
