use crate::blockchain::Block;
use crate::node::Node;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state: the node owns chain, pool and wallet.
#[derive(Clone)]
pub struct AppState {
    pub node: Arc<Node>,
}

impl AppState {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub transactions_valid: bool,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub mined_index: usize,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub transactions: usize,
}

#[derive(Deserialize)]
pub struct MineRequest {
    #[serde(default)]
    pub data: Vec<Transaction>,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct TransactRequest {
    pub recipient: String,
    pub amount: u64,
}

#[derive(Serialize)]
pub struct TransactResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub transaction: Transaction,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "error",
            message: message.into(),
        }
    }
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub difficulty: u32,
    pub mine_rate_ms: i64,
    pub last_interval_ms: Option<i64>,
    pub pool_size: usize,
    pub node_id: String,
}
