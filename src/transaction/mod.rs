pub mod model;
pub mod pool;

pub use model::{OutputMap, Transaction, TxInput};
pub use pool::TransactionPool;

/// Sentinel input address of reward transactions.
pub const REWARD_INPUT_ADDRESS: &str = "*authorized-reward*";
