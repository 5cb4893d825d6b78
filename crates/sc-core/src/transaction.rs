use serde::{Deserialize, Serialize};

use crate::types::{double_sha256, Amount, ScId, TxHash, Uint256};

pub const TRANSPARENT_TX_VERSION: i32 = 1;
pub const PHGR_TX_VERSION: i32 = 2;
pub const GROTH_TX_VERSION: i32 = -3;
/// Only this version may carry sidechain outputs.
pub const SC_TX_VERSION: i32 = -4;

/// Output declaring a new sidechain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScCreationOutput {
    pub sc_id: ScId,
    pub withdrawal_epoch_length: i32,
}

/// Output moving coins from the mainchain into a sidechain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardTransferOutput {
    pub sc_id: ScId,
    pub value: Amount,
    /// Receiver on the sidechain side.
    pub address: Uint256,
}

/// Shielded transfer description. Only its presence matters to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSplit {
    pub vpub_old: Amount,
    pub vpub_new: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub joinsplits: Vec<JoinSplit>,
    pub sc_creations: Vec<ScCreationOutput>,
    pub forward_transfers: Vec<ForwardTransferOutput>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Transaction {
            version: TRANSPARENT_TX_VERSION,
            joinsplits: Vec::new(),
            sc_creations: Vec::new(),
            forward_transfers: Vec::new(),
            lock_time: 0,
        }
    }
}

impl Transaction {
    /// An empty transaction at the sidechain-capable version.
    pub fn new_sc() -> Self {
        Transaction {
            version: SC_TX_VERSION,
            ..Default::default()
        }
    }

    pub fn with_creation(mut self, sc_id: ScId, withdrawal_epoch_length: i32) -> Self {
        self.sc_creations.push(ScCreationOutput {
            sc_id,
            withdrawal_epoch_length,
        });
        self
    }

    pub fn with_forward_transfer(mut self, sc_id: ScId, value: Amount) -> Self {
        self.forward_transfers.push(ForwardTransferOutput {
            sc_id,
            value,
            address: Uint256::ZERO,
        });
        self
    }

    pub fn is_sc_version(&self) -> bool {
        self.version == SC_TX_VERSION
    }

    /// True when the transaction carries no sidechain outputs at all.
    pub fn cc_is_null(&self) -> bool {
        self.sc_creations.is_empty() && self.forward_transfers.is_empty()
    }

    pub fn has_joinsplits(&self) -> bool {
        !self.joinsplits.is_empty()
    }

    pub fn has_creation_output(&self, sc_id: &ScId) -> bool {
        self.sc_creations.iter().any(|sc| &sc.sc_id == sc_id)
    }

    pub fn has_forward_transfer_to(&self, sc_id: &ScId) -> bool {
        self.forward_transfers.iter().any(|ft| &ft.sc_id == sc_id)
    }

    /// Deterministic byte encoding hashed into the transaction id.
    pub fn consensus_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            16 + self.joinsplits.len() * 16
                + self.sc_creations.len() * 36
                + self.forward_transfers.len() * 72,
        );
        buf.extend_from_slice(&self.version.to_le_bytes());

        buf.extend_from_slice(&(self.joinsplits.len() as u32).to_le_bytes());
        for js in &self.joinsplits {
            buf.extend_from_slice(&js.vpub_old.to_le_bytes());
            buf.extend_from_slice(&js.vpub_new.to_le_bytes());
        }

        buf.extend_from_slice(&(self.sc_creations.len() as u32).to_le_bytes());
        for sc in &self.sc_creations {
            buf.extend_from_slice(sc.sc_id.as_bytes());
            buf.extend_from_slice(&sc.withdrawal_epoch_length.to_le_bytes());
        }

        buf.extend_from_slice(&(self.forward_transfers.len() as u32).to_le_bytes());
        for ft in &self.forward_transfers {
            buf.extend_from_slice(ft.sc_id.as_bytes());
            buf.extend_from_slice(&ft.value.to_le_bytes());
            buf.extend_from_slice(ft.address.as_bytes());
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    pub fn hash(&self) -> TxHash {
        double_sha256(&self.consensus_bytes())
    }
}
