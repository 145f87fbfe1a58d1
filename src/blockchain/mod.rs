pub mod block;
pub mod model;

pub use block::{Block, leading_zero_bits};
pub use model::Blockchain;

/// Target milliseconds between blocks; slower blocks lower the difficulty.
pub const MINE_RATE_MS: i64 = 1000;

/// Difficulty of the genesis block.
pub const INITIAL_DIFFICULTY: u32 = 1;

/// Amount credited by the single reward transaction of each block.
pub const MINING_REWARD: u64 = 50;
