use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{INITIAL_DIFFICULTY, MINE_RATE_MS};
use crate::crypto::{hash_parts, stringify};
use crate::transaction::Transaction;

/// How many nonces are tried between two polls of the stop signal.
const STOP_POLL_INTERVAL: u64 = 1024;

/// A mined block holding a list of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: i64, // Unix timestamp in milliseconds (UTC)
    pub last_hash: String,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub data: Vec<Transaction>,
}

impl Block {
    /// The fixed first block of every chain.
    pub fn genesis() -> Self {
        Self {
            timestamp: 1,
            last_hash: "-----".to_string(),
            hash: "hash-one".to_string(),
            nonce: 0,
            difficulty: INITIAL_DIFFICULTY,
            data: Vec::new(),
        }
    }

    /// Hash of the given block fields. Field order does not matter.
    pub fn compute_hash(
        timestamp: i64,
        last_hash: &str,
        data: &[Transaction],
        nonce: u64,
        difficulty: u32,
    ) -> String {
        crate::crypto_hash!(timestamp, last_hash, data, nonce, difficulty)
    }

    /// Recompute this block's hash from its own fields.
    pub fn recompute_hash(&self) -> String {
        Self::compute_hash(
            self.timestamp,
            &self.last_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    /// Mine a block on top of `last_block`.
    pub fn mine(last_block: &Block, data: Vec<Transaction>) -> Self {
        match Self::mine_until(last_block, data, || false) {
            Some(block) => block,
            None => unreachable!("search without a stop signal always finds a nonce"),
        }
    }

    /// Proof-of-work search that gives up once `should_stop` returns true.
    ///
    /// The difficulty is fixed before the search from the start time; the
    /// timestamp is refreshed on every attempt and the nonce walks up from 0.
    pub fn mine_until<F>(last_block: &Block, data: Vec<Transaction>, mut should_stop: F) -> Option<Self>
    where
        F: FnMut() -> bool,
    {
        let difficulty = Self::adjust_difficulty(last_block, Utc::now().timestamp_millis());
        let data_json = stringify(&data);
        let difficulty_s = difficulty.to_string();

        let mut nonce: u64 = 0;
        loop {
            if nonce % STOP_POLL_INTERVAL == 0 && should_stop() {
                return None;
            }

            let timestamp = Utc::now().timestamp_millis();
            let (timestamp_s, nonce_s) = (timestamp.to_string(), nonce.to_string());
            let hash = hash_parts(&[
                timestamp_s.as_str(),
                last_block.hash.as_str(),
                data_json.as_str(),
                nonce_s.as_str(),
                difficulty_s.as_str(),
            ]);

            if leading_zero_bits(&hash) >= difficulty {
                return Some(Self {
                    timestamp,
                    last_hash: last_block.hash.clone(),
                    hash,
                    nonce,
                    difficulty,
                    data,
                });
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    /// Retarget by one step depending on how long the last block took.
    pub fn adjust_difficulty(last_block: &Block, timestamp: i64) -> u32 {
        let difficulty = last_block.difficulty;
        if difficulty < 1 {
            return 1;
        }
        if timestamp - last_block.timestamp > MINE_RATE_MS {
            return (difficulty - 1).max(1);
        }
        difficulty + 1
    }

    /// True when the stored hash carries enough leading zero bits.
    pub fn meets_difficulty(&self) -> bool {
        leading_zero_bits(&self.hash) >= self.difficulty
    }
}

/// Number of leading zero bits in a hex digest. Stops at the first non-hex
/// character.
pub fn leading_zero_bits(hash_hex: &str) -> u32 {
    let mut total = 0u32;
    for c in hash_hex.chars() {
        match c.to_digit(16) {
            Some(0) => total += 4,
            Some(nibble) => {
                total += nibble.leading_zeros() - 28;
                break;
            }
            None => break,
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            timestamp: 2000,
            last_hash: "foo-hash".into(),
            hash: "bar-hash".into(),
            nonce: 1,
            difficulty: 1,
            data: Vec::new(),
        }
    }

    #[test]
    fn genesis_is_the_fixed_constant() {
        let g = Block::genesis();
        assert_eq!(g.timestamp, 1);
        assert_eq!(g.last_hash, "-----");
        assert_eq!(g.hash, "hash-one");
        assert_eq!(g.difficulty, 1);
        assert!(g.data.is_empty());
        assert_eq!(g, Block::genesis());
    }

    #[test]
    fn mined_block_links_to_last_block() {
        let last = Block::genesis();
        let mined = Block::mine(&last, Vec::new());
        assert_eq!(mined.last_hash, last.hash);
        assert!(mined.data.is_empty());
        assert!(mined.timestamp > 0);
    }

    #[test]
    fn mined_hash_is_computed_from_the_block_fields() {
        let last = Block::genesis();
        let mined = Block::mine(&last, Vec::new());
        let reordered = crate::crypto_hash!(
            mined.nonce,
            mined.difficulty,
            mined.timestamp,
            last.hash,
            mined.data
        );
        assert_eq!(mined.hash, reordered);
        assert_eq!(mined.hash, mined.recompute_hash());
    }

    #[test]
    fn mined_hash_meets_the_difficulty() {
        let mut last = sample_block();
        last.hash = "prev".into();
        last.difficulty = 6;
        last.timestamp = Utc::now().timestamp_millis();
        let mined = Block::mine(&last, Vec::new());
        assert!(leading_zero_bits(&mined.hash) >= mined.difficulty);
        assert!(mined.meets_difficulty());
    }

    #[test]
    fn mined_difficulty_moves_by_one_step() {
        let last = Block::genesis();
        let mined = Block::mine(&last, Vec::new());
        assert!([last.difficulty + 1, 1].contains(&mined.difficulty));
    }

    #[test]
    fn raises_difficulty_for_a_quick_block() {
        let block = sample_block();
        assert_eq!(
            Block::adjust_difficulty(&block, block.timestamp + MINE_RATE_MS - 100),
            block.difficulty + 1
        );
    }

    #[test]
    fn lowers_difficulty_for_a_slow_block() {
        let mut block = sample_block();
        block.difficulty = 4;
        assert_eq!(
            Block::adjust_difficulty(&block, block.timestamp + MINE_RATE_MS + 100),
            3
        );
    }

    #[test]
    fn difficulty_never_drops_below_one() {
        let mut block = sample_block();
        assert_eq!(
            Block::adjust_difficulty(&block, block.timestamp + MINE_RATE_MS + 100),
            1
        );
        block.difficulty = 0;
        assert_eq!(Block::adjust_difficulty(&block, block.timestamp), 1);
    }

    #[test]
    fn stop_signal_aborts_the_search() {
        let mut last = sample_block();
        last.difficulty = 200;
        last.timestamp = Utc::now().timestamp_millis();
        let mut polls = 0;
        let result = Block::mine_until(&last, Vec::new(), || {
            polls += 1;
            polls > 2
        });
        assert!(result.is_none());
        assert_eq!(polls, 3);
    }

    #[test]
    fn counts_leading_zero_bits_of_hex() {
        assert_eq!(leading_zero_bits("ffff"), 0);
        assert_eq!(leading_zero_bits("0fff"), 4);
        assert_eq!(leading_zero_bits("00ff"), 8);
        assert_eq!(leading_zero_bits("0040"), 9);
        assert_eq!(leading_zero_bits("1000"), 3);
        assert_eq!(leading_zero_bits(&"0".repeat(64)), 256);
        assert_eq!(leading_zero_bits("hash-one"), 0);
    }
}
