use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::model::Transaction;
use crate::blockchain::Block;

/// Pending transactions keyed by id.
/// Holds at most one entry per sender address.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TransactionPool {
    transaction_map: HashMap<String, Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self {
            transaction_map: HashMap::new(),
        }
    }

    /// Insert or replace by id. A valid transaction also drops any other
    /// pending entry from the same sender; an invalid one never displaces a
    /// valid entry.
    ///
    /// Returns `true` when an existing entry was replaced or dropped.
    pub fn set_transaction(&mut self, transaction: Transaction) -> bool {
        if !transaction.is_valid() {
            let shadows_valid = self
                .transaction_map
                .get(&transaction.id)
                .is_some_and(Transaction::is_valid);
            if shadows_valid {
                return false;
            }
            return self
                .transaction_map
                .insert(transaction.id.clone(), transaction)
                .is_some();
        }

        let before = self.transaction_map.len();
        let sender = &transaction.input.address;
        let id = &transaction.id;
        self.transaction_map
            .retain(|other_id, other| other_id == id || &other.input.address != sender);
        let evicted = self.transaction_map.len() < before;
        let replaced = self
            .transaction_map
            .insert(transaction.id.clone(), transaction)
            .is_some();
        evicted || replaced
    }

    /// Replace the whole pool, e.g. when syncing from another node.
    pub fn set_map(&mut self, transaction_map: HashMap<String, Transaction>) {
        self.transaction_map = transaction_map;
    }

    /// The pending transaction authored by `address`, if any.
    pub fn existing_transaction(&self, address: &str) -> Option<&Transaction> {
        self.transaction_map
            .values()
            .find(|tx| tx.input.address == address)
    }

    pub fn existing_transaction_mut(&mut self, address: &str) -> Option<&mut Transaction> {
        self.transaction_map
            .values_mut()
            .find(|tx| tx.input.address == address)
    }

    /// Entries that currently pass validation. Invalid ones stay in the pool.
    pub fn valid_transactions(&self) -> Vec<Transaction> {
        self.transaction_map
            .values()
            .filter(|tx| tx.is_valid())
            .cloned()
            .collect()
    }

    /// Drop every pending transaction already included in `chain`.
    pub fn clear_blockchain_transactions(&mut self, chain: &[Block]) {
        let included: HashSet<&str> = chain
            .iter()
            .skip(1)
            .flat_map(|block| block.data.iter().map(|tx| tx.id.as_str()))
            .collect();
        self.transaction_map
            .retain(|id, _| !included.contains(id.as_str()));
    }

    pub fn clear(&mut self) {
        self.transaction_map.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transaction_map.get(id)
    }

    pub fn transaction_map(&self) -> &HashMap<String, Transaction> {
        &self.transaction_map
    }

    pub fn len(&self) -> usize {
        self.transaction_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_map.is_empty()
    }
}
