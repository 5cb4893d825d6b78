//! Block connection and disconnection against the sidechain registry.
//!
//! Each call opens one view, stages every transaction, and flushes once. A
//! failure anywhere drops the view, so a block is either committed in full or
//! leaves the registry untouched.

use crate::error::ViewError;
use crate::registry::SidechainRegistry;
use log::{error, info};
use sc_core::{Block, BlockUndo, TxUndo};

/// Apply every transaction of `block` at `height` and commit.
///
/// Returns the undo data needed to disconnect the block later.
pub fn connect_block(
    registry: &SidechainRegistry,
    block: &Block,
    height: i32,
) -> Result<BlockUndo, ViewError> {
    let block_hash = block.hash();
    let mut view = registry.view();
    let mut undo = BlockUndo::default();

    for tx in &block.transactions {
        view.apply_tx(tx, block, height).map_err(|e| {
            error!(
                target: "sc",
                "could not connect block {} at height {}: tx={}: {}",
                block_hash,
                height,
                tx.hash(),
                e
            );
            e
        })?;
        undo.tx_undo.push(TxUndo::from_transaction(tx));
    }

    view.flush()?;
    info!(
        target: "sc",
        "connected block {} at height {} ({} tx)",
        block_hash,
        height,
        block.transactions.len()
    );
    Ok(undo)
}

/// Reverse a connected block, last transaction first, and commit.
pub fn disconnect_block(registry: &SidechainRegistry, undo: &BlockUndo) -> Result<(), ViewError> {
    let mut view = registry.view();

    for tx_undo in undo.tx_undo.iter().rev() {
        view.undo_tx(tx_undo).map_err(|e| {
            error!(target: "sc", "could not undo sidechain changes: {}", e);
            e
        })?;
    }

    view.flush()?;
    info!(
        target: "sc",
        "disconnected block ({} tx undone)",
        undo.tx_undo.len()
    );
    Ok(())
}
