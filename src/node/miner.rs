use log::{debug, info};
use std::sync::atomic::Ordering;

use super::{Ledger, Node};
use crate::blockchain::{Block, Blockchain};
use crate::error::{MineError, NodeError};
use crate::transaction::{Transaction, TransactionPool};
use crate::wallet::Wallet;

/// A block this node appended, with its height at the time of the append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedBlock {
    pub index: usize,
    pub block: Block,
}

/// Block payload for the next block: pooled transactions that verify and
/// still match their sender's chain balance, followed by the miner reward.
pub fn assemble_block_data(
    pool: &TransactionPool,
    blockchain: &Blockchain,
    miner: &Wallet,
) -> Vec<Transaction> {
    let mut data: Vec<Transaction> = pool
        .valid_transactions()
        .into_iter()
        .filter(|tx| {
            let fresh =
                tx.input.amount == Wallet::calculate_balance(&blockchain.chain, &tx.input.address);
            if !fresh {
                debug!("MINER - skipping stale transaction {}", tx.id);
            }
            fresh
        })
        .collect();
    data.push(Transaction::reward(miner));
    data
}

impl Node {
    /// Mine the pool into a new block, reward this node's wallet, clear the
    /// included transactions and broadcast the chain.
    ///
    /// Cancelled if the chain changes or a pooled entry is amended or
    /// replaced before the block is appended.
    pub fn mine_transactions(&self) -> Result<MinedBlock, NodeError> {
        let mined = self.seal_with(true, |ledger, wallet| {
            assemble_block_data(&ledger.pool, &ledger.blockchain, wallet)
        })?;
        info!(
            "MINER - sealed block #{} (hash={}, nonce={}, difficulty={}, txs={})",
            mined.index,
            mined.block.hash,
            mined.block.nonce,
            mined.block.difficulty,
            mined.block.data.len()
        );
        self.publish_chain();
        Ok(mined)
    }

    pub(super) fn seal(&self, data: Vec<Transaction>) -> Result<MinedBlock, MineError> {
        self.seal_with(false, move |_, _| data)
    }

    /// Snapshot tip and payload under the lock, search without it, then
    /// append only if nothing the payload depends on changed in between.
    fn seal_with<F>(&self, watch_pool: bool, build: F) -> Result<MinedBlock, MineError>
    where
        F: FnOnce(&Ledger, &Wallet) -> Vec<Transaction>,
    {
        let (last_block, data, chain_epoch, pool_epoch) = {
            let ledger = self.ledger();
            let wallet = self.wallet();
            let data = build(&*ledger, &*wallet);
            (
                ledger.blockchain.last_block().clone(),
                data,
                self.chain_epoch.load(Ordering::SeqCst),
                self.pool_epoch.load(Ordering::SeqCst),
            )
        };
        let pool_changed = || watch_pool && self.pool_epoch.load(Ordering::SeqCst) != pool_epoch;
        let changed = || self.chain_epoch.load(Ordering::SeqCst) != chain_epoch || pool_changed();

        let block = Block::mine_until(&last_block, data, changed).ok_or(MineError::Cancelled)?;

        let mut ledger = self.ledger();
        if pool_changed() {
            debug!("MINER - pool changed during the search, dropping block");
            return Err(MineError::Cancelled);
        }
        ledger.blockchain.append_premined_block(block.clone())?;
        let index = ledger.blockchain.len() - 1;
        let Ledger { blockchain, pool } = &mut *ledger;
        pool.clear_blockchain_transactions(&blockchain.chain);
        self.bump_chain_epoch();
        Ok(MinedBlock { index, block })
    }
}
