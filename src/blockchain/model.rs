use std::collections::HashSet;

use super::{Block, MINING_REWARD};
use crate::error::{BlockDataError, ChainError, ReplaceError};
use crate::transaction::Transaction;
use crate::wallet::Wallet;

/// In-memory chain of mined blocks, always starting at genesis.
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub chain: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    /// Mine and append a new block with the provided `data`.
    pub fn add_block(&mut self, data: Vec<Transaction>) -> &Block {
        let block = Block::mine(self.last_block(), data);
        self.chain.push(block);
        self.last_block()
    }

    /// Append a block that was mined outside of this struct. Rejected when it
    /// no longer extends the tip or does not validate against it.
    pub fn append_premined_block(&mut self, block: Block) -> Result<(), ChainError> {
        let tip = self.last_block();
        if block.last_hash != tip.hash {
            return Err(ChainError::StaleParent {
                tip: tip.hash.clone(),
            });
        }
        validate_link(tip, &block, self.chain.len())?;
        self.chain.push(block);
        Ok(())
    }

    /// Validate linkage, hashes, proof-of-work and difficulty steps.
    pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
        let genesis = chain.first().ok_or(ChainError::Empty)?;
        if *genesis != Block::genesis() {
            return Err(ChainError::InvalidGenesis);
        }

        for (index, pair) in chain.windows(2).enumerate() {
            validate_link(&pair[0], &pair[1], index + 1)?;
        }
        Ok(())
    }

    pub fn is_valid_chain(chain: &[Block]) -> bool {
        Self::validate_chain(chain).is_ok()
    }

    /// Longest-valid-chain fork choice.
    ///
    /// Only length is compared, not accumulated work. `on_success` runs once,
    /// with the candidate, right before the swap.
    pub fn replace_chain<F>(
        &mut self,
        candidate: Vec<Block>,
        validate_transactions: bool,
        on_success: F,
    ) -> Result<(), ReplaceError>
    where
        F: FnOnce(&[Block]),
    {
        if candidate.len() <= self.chain.len() {
            return Err(ReplaceError::NotLonger {
                current: self.chain.len(),
                incoming: candidate.len(),
            });
        }

        Self::validate_chain(&candidate)?;

        if validate_transactions {
            Self::valid_transaction_data(&candidate)?;
        }

        on_success(&candidate);
        self.chain = candidate;
        Ok(())
    }

    /// Ledger rules over every non-genesis block: one reward of the fixed
    /// amount, valid signed transfers whose input amount matches the sender's
    /// balance over the preceding blocks, no transaction included twice and
    /// at most one transfer per sender.
    pub fn valid_transaction_data(chain: &[Block]) -> Result<(), BlockDataError> {
        for (i, block) in chain.iter().enumerate().skip(1) {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut senders: HashSet<&str> = HashSet::new();
            let mut reward_count = 0usize;

            for tx in &block.data {
                if tx.is_reward() {
                    reward_count += 1;
                    if reward_count > 1 {
                        return Err(BlockDataError::MultipleRewards { block: i });
                    }
                    let mut outputs = tx.output_map.values();
                    if outputs.next() != Some(&MINING_REWARD) || outputs.next().is_some() {
                        return Err(BlockDataError::InvalidReward { block: i });
                    }
                    continue;
                }

                tx.validate()
                    .map_err(|source| BlockDataError::InvalidTransaction { block: i, source })?;

                let true_balance = Wallet::calculate_balance(&chain[..i], &tx.input.address);
                if tx.input.amount != true_balance {
                    return Err(BlockDataError::InvalidInputAmount {
                        block: i,
                        id: tx.id.clone(),
                        declared: tx.input.amount,
                        actual: true_balance,
                    });
                }

                if !seen.insert(tx.id.as_str()) {
                    return Err(BlockDataError::DuplicateTransaction {
                        block: i,
                        id: tx.id.clone(),
                    });
                }

                // each input spends the whole balance, so one spend per sender
                if !senders.insert(tx.input.address.as_str()) {
                    return Err(BlockDataError::DoubleSpend {
                        block: i,
                        address: tx.input.address.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

/// Checks `block` (at position `index`) against its parent.
fn validate_link(parent: &Block, block: &Block, index: usize) -> Result<(), ChainError> {
    if block.last_hash != parent.hash {
        return Err(ChainError::BrokenLink { index });
    }
    if block.hash != block.recompute_hash() {
        return Err(ChainError::HashMismatch { index });
    }
    if parent.difficulty.abs_diff(block.difficulty) > 1 {
        return Err(ChainError::DifficultyJump {
            index,
            previous: parent.difficulty,
            current: block.difficulty,
        });
    }
    if block.difficulty < 1 || !block.meets_difficulty() {
        return Err(ChainError::InsufficientWork {
            index,
            difficulty: block.difficulty,
        });
    }
    Ok(())
}
