use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;
use crate::types::{Amount, ScId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardTransferUndo {
    pub sc_id: ScId,
    pub value: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScCreationUndo {
    pub sc_id: ScId,
}

/// What is needed to reverse one transaction's effect on the sidechain registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxUndo {
    pub forward_transfers: Vec<ForwardTransferUndo>,
    pub sc_creations: Vec<ScCreationUndo>,
}

impl TxUndo {
    pub fn from_transaction(tx: &Transaction) -> Self {
        TxUndo {
            forward_transfers: tx
                .forward_transfers
                .iter()
                .map(|ft| ForwardTransferUndo {
                    sc_id: ft.sc_id,
                    value: ft.value,
                })
                .collect(),
            sc_creations: tx
                .sc_creations
                .iter()
                .map(|sc| ScCreationUndo { sc_id: sc.sc_id })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forward_transfers.is_empty() && self.sc_creations.is_empty()
    }
}

/// Undo data for a whole block, one entry per transaction in block order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUndo {
    pub tx_undo: Vec<TxUndo>,
}
