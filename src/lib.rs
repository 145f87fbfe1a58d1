//! A small proof-of-work ledger node: signed transfers, a transaction pool,
//! adaptive-difficulty mining and longest-valid-chain replication over a
//! publish/subscribe bus.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod node;
pub mod pubsub;
pub mod transaction;
pub mod wallet;
