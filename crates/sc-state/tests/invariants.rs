use proptest::prelude::*;
use sc_core::{double_sha256, Amount, Block, BlockUndo, ScId, Transaction, Uint256};
use sc_state::{
    connect_block, disconnect_block, MemoryRecordStore, ScInfoMap, SidechainRegistry, ViewError,
};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

const SIDECHAINS: usize = 4;

fn sc_id(index: usize) -> ScId {
    double_sha256(&(index as u64).to_le_bytes())
}

fn registry() -> SidechainRegistry {
    let registry = SidechainRegistry::new();
    registry
        .load_from(Box::new(MemoryRecordStore::new()), &AtomicBool::new(false))
        .unwrap();
    registry
}

/// Block 0 creates every sidechain; later blocks only transfer.
fn build_blocks(initial: &[Amount], transfers: &[Vec<(usize, Amount)>]) -> Vec<Block> {
    let mut creation = Transaction::new_sc();
    for (index, amount) in initial.iter().enumerate() {
        creation = creation
            .with_creation(sc_id(index), 10)
            .with_forward_transfer(sc_id(index), *amount);
    }

    let mut blocks = vec![Block::new(Uint256::ZERO, 0, vec![creation])];
    for (height, block_transfers) in transfers.iter().enumerate() {
        let txs = block_transfers
            .iter()
            .enumerate()
            .map(|(n, (index, amount))| Transaction {
                lock_time: n as u32,
                ..Transaction::new_sc().with_forward_transfer(sc_id(*index), *amount)
            })
            .collect();
        let prev = blocks[height].hash();
        blocks.push(Block::new(prev, height as u32 + 1, txs));
    }
    blocks
}

fn snapshot(registry: &SidechainRegistry) -> BTreeMap<ScId, Amount> {
    registry
        .copy_sidechains()
        .into_iter()
        .map(|(id, info)| (id, info.balance))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn connect_disconnect_is_symmetric(
        initial in proptest::collection::vec(1_i64..1_000, SIDECHAINS),
        transfers in proptest::collection::vec(
            proptest::collection::vec((0..SIDECHAINS, 0_i64..500), 0..4),
            0..6,
        ),
    ) {
        let registry = registry();
        let blocks = build_blocks(&initial, &transfers);

        let mut history: Vec<(BTreeMap<ScId, Amount>, BlockUndo)> = Vec::new();
        for (height, block) in blocks.iter().enumerate() {
            let before = snapshot(&registry);
            let undo = connect_block(&registry, block, height as i32).unwrap();
            history.push((before, undo));
        }

        let mut expected: BTreeMap<ScId, Amount> = BTreeMap::new();
        for (index, amount) in initial.iter().enumerate() {
            expected.insert(sc_id(index), *amount);
        }
        for (index, amount) in transfers.iter().flatten() {
            *expected.get_mut(&sc_id(*index)).unwrap() += amount;
        }
        prop_assert_eq!(snapshot(&registry), expected);

        while let Some((before, undo)) = history.pop() {
            disconnect_block(&registry, &undo).unwrap();
            prop_assert_eq!(snapshot(&registry), before);
        }
        prop_assert!(registry.is_empty());
    }

    #[test]
    fn balances_never_go_negative(
        initial in 0_i64..1_000,
        deltas in proptest::collection::vec(-1_500_i64..1_500, 1..40),
    ) {
        let registry = registry();
        let x = sc_id(0);
        let block = build_blocks(&[initial], &[]).remove(0);
        connect_block(&registry, &block, 0).unwrap();

        let mut model = initial;
        for delta in deltas {
            let mut view = registry.view();
            match view.update_balance(&x, delta) {
                Ok(()) => {
                    model += delta;
                    view.flush().unwrap();
                }
                Err(ViewError::NegativeBalance { balance, amount, .. }) => {
                    prop_assert_eq!(balance, model);
                    prop_assert_eq!(amount, delta);
                    prop_assert!(model + delta < 0);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
            let balance = registry.balance(&x).unwrap();
            prop_assert!(balance >= 0);
            prop_assert_eq!(balance, model);
        }
    }

    #[test]
    fn creation_metadata_is_immutable(
        transfers in proptest::collection::vec((0..1_usize, 1_i64..100), 1..10),
    ) {
        let registry = registry();
        let blocks = build_blocks(&[1], &[transfers]);
        connect_block(&registry, &blocks[0], 0).unwrap();
        let created: ScInfoMap = registry.copy_sidechains();

        connect_block(&registry, &blocks[1], 1).unwrap();
        let after = registry.get(&sc_id(0)).unwrap();
        let original = &created[&sc_id(0)];
        prop_assert_eq!(after.creation_block_hash, original.creation_block_hash);
        prop_assert_eq!(after.creation_block_height, 0);
        prop_assert_eq!(after.creation_tx_hash, original.creation_tx_hash);
        prop_assert_eq!(&after.creation_data, &original.creation_data);
    }
}
