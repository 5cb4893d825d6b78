// === Primitive types ===
pub mod types;

// === Transactions, blocks and undo data ===
pub mod transaction;
pub mod block;
pub mod undo;

// === Mempool ===
pub mod mempool;

// === Re-exports for broader ecosystem access ===
pub use block::{Block, BlockHeader};
pub use mempool::TxMemPool;
pub use transaction::{
    ForwardTransferOutput, JoinSplit, ScCreationOutput, Transaction, GROTH_TX_VERSION,
    PHGR_TX_VERSION, SC_TX_VERSION, TRANSPARENT_TX_VERSION,
};
pub use types::{
    double_sha256, format_money, money_range, Amount, BlockHash, ParseUint256Error, ScId,
    TxHash, Uint256, COIN, MAX_MONEY,
};
pub use undo::{BlockUndo, ForwardTransferUndo, ScCreationUndo, TxUndo};
