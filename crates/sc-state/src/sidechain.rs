use sc_core::{format_money, Amount, BlockHash, ScId, TxHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameters fixed by the creation output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScCreationParameters {
    pub withdrawal_epoch_length: i32,
}

/// Registry record for one sidechain.
///
/// The creation fields never change once the record exists; only `balance`
/// (and the immature amounts) move as forward transfers are applied or undone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScInfo {
    pub creation_block_hash: BlockHash,
    pub creation_block_height: i32,
    pub creation_tx_hash: TxHash,

    /// Never negative.
    pub balance: Amount,

    pub creation_data: ScCreationParameters,

    /// maturity height -> amount
    pub immature_amounts: BTreeMap<i32, Amount>,
}

impl fmt::Display for ScInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "balance: {}", format_money(self.balance))?;
        writeln!(
            f,
            "created in block: {} (height {})",
            self.creation_block_hash, self.creation_block_height
        )?;
        writeln!(f, "creation tx: {}", self.creation_tx_hash)?;
        writeln!(
            f,
            "withdrawal epoch length: {}",
            self.creation_data.withdrawal_epoch_length
        )?;
        write!(f, "immature amounts: {}", self.immature_amounts.len())
    }
}

pub type ScInfoMap = BTreeMap<ScId, ScInfo>;

/// Read access to a set of sidechains, either committed or staged.
pub trait ScLookup {
    fn sidechain_info(&self, sc_id: &ScId) -> Option<ScInfo>;

    fn sidechain_exists(&self, sc_id: &ScId) -> bool {
        self.sidechain_info(sc_id).is_some()
    }

    fn sidechain_balance(&self, sc_id: &ScId) -> Option<Amount> {
        self.sidechain_info(sc_id).map(|info| info.balance)
    }
}

impl ScLookup for ScInfoMap {
    fn sidechain_info(&self, sc_id: &ScId) -> Option<ScInfo> {
        self.get(sc_id).cloned()
    }

    fn sidechain_exists(&self, sc_id: &ScId) -> bool {
        self.contains_key(sc_id)
    }
}
