use thiserror::Error;

/// Hard failures while building or amending a transaction locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Amount exceeds balance (amount {amount}, balance {balance})")]
    InsufficientFunds { amount: u64, balance: u64 },

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Why a single transaction failed validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid transaction {id}: outputs total {outputs} but input amount is {input}")]
    OutputTotalMismatch { id: String, input: u64, outputs: u128 },

    #[error("invalid signature on transaction {id} from {address}")]
    InvalidSignature { id: String, address: String },
}

/// Structural chain rejections (linkage, hashes, difficulty).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain is empty")]
    Empty,

    #[error("first block is not the canonical genesis block")]
    InvalidGenesis,

    #[error("block {index}: last_hash does not match the previous block hash")]
    BrokenLink { index: usize },

    #[error("block {index}: stored hash does not match its contents")]
    HashMismatch { index: usize },

    #[error("block {index}: difficulty jumped from {previous} to {current}")]
    DifficultyJump {
        index: usize,
        previous: u32,
        current: u32,
    },

    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: usize, difficulty: u32 },

    #[error("block does not extend the current tip {tip}")]
    StaleParent { tip: String },
}

/// Ledger-level rejections found while checking the transactions of a chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockDataError {
    #[error("block {block}: miner rewards exceed limit")]
    MultipleRewards { block: usize },

    #[error("block {block}: miner reward amount is invalid")]
    InvalidReward { block: usize },

    #[error("block {block}: {source}")]
    InvalidTransaction {
        block: usize,
        #[source]
        source: TransactionError,
    },

    #[error("block {block}: transaction {id} declares input {declared} but the sender balance is {actual}")]
    InvalidInputAmount {
        block: usize,
        id: String,
        declared: u64,
        actual: u64,
    },

    #[error("block {block}: transaction {id} appears more than once")]
    DuplicateTransaction { block: usize, id: String },

    #[error("block {block}: sender {address} spends more than once")]
    DoubleSpend { block: usize, address: String },
}

/// Why a candidate chain was not adopted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplaceError {
    #[error("the incoming chain must be longer (current {current}, incoming {incoming})")]
    NotLonger { current: usize, incoming: usize },

    #[error("the incoming chain must be valid: {0}")]
    InvalidChain(#[from] ChainError),

    #[error("the incoming chain has invalid data: {0}")]
    InvalidData(#[from] BlockDataError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MineError {
    #[error("mining cancelled: the chain changed during the search")]
    Cancelled,

    #[error("mined block rejected: {0}")]
    Rejected(#[from] ChainError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no subscribers on the bus")]
    NoSubscribers,
}

/// Umbrella error for the node's collaborator-facing operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Mine(#[from] MineError),

    #[error(transparent)]
    Replace(#[from] ReplaceError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
