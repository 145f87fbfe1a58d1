//! The node: chain, pool and wallet behind one lock, wired to the bus.

pub mod miner;

pub use miner::MinedBlock;

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::blockchain::{Block, Blockchain};
use crate::error::{NodeError, ReplaceError};
use crate::pubsub::{BusMessage, Inbound, PubSub};
use crate::transaction::{Transaction, TransactionPool};
use crate::wallet::Wallet;

/// Chain and pool. Always mutated together under [`Node`]'s lock.
#[derive(Debug, Default)]
pub struct Ledger {
    pub blockchain: Blockchain,
    pub pool: TransactionPool,
}

impl Ledger {
    /// Fork choice, clearing adopted transactions from the pool on success.
    pub fn adopt_chain(
        &mut self,
        candidate: Vec<Block>,
        validate_transactions: bool,
    ) -> Result<(), ReplaceError> {
        let Ledger { blockchain, pool } = self;
        blockchain.replace_chain(candidate, validate_transactions, |chain| {
            pool.clear_blockchain_transactions(chain)
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub balance: u64,
}

pub struct Node {
    ledger: Mutex<Ledger>,
    wallet: Mutex<Wallet>,
    pubsub: PubSub,
    /// Bumped on every chain mutation; in-flight mining watches it.
    chain_epoch: AtomicU64,
    /// Bumped whenever a pending entry is replaced or dropped by an upsert.
    pool_epoch: AtomicU64,
}

impl Node {
    pub fn new(wallet: Wallet, pubsub: PubSub) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            wallet: Mutex::new(wallet),
            pubsub,
            chain_epoch: AtomicU64::new(0),
            pool_epoch: AtomicU64::new(0),
        }
    }

    // Lock order is ledger, then wallet.
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().expect("ledger mutex poisoned")
    }

    fn wallet(&self) -> MutexGuard<'_, Wallet> {
        self.wallet.lock().expect("wallet mutex poisoned")
    }

    // Both epochs only move while the ledger lock is held.
    fn bump_chain_epoch(&self) {
        self.chain_epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn bump_pool_epoch(&self) {
        self.pool_epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn node_id(&self) -> &str {
        self.pubsub.node_id()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.pubsub.subscribe()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.ledger().blockchain.chain.clone()
    }

    pub fn transaction_pool_map(&self) -> HashMap<String, Transaction> {
        self.ledger().pool.transaction_map().clone()
    }

    /// Read both under one lock, for consistent snapshots.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        let ledger = self.ledger();
        f(&*ledger)
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        Wallet::calculate_balance(&self.ledger().blockchain.chain, address)
    }

    pub fn wallet_info(&self) -> WalletInfo {
        let ledger = self.ledger();
        let address = self.wallet().public_key.clone();
        let balance = Wallet::calculate_balance(&ledger.blockchain.chain, &address);
        WalletInfo { address, balance }
    }

    /// Send `amount` from this node's wallet to `recipient`.
    ///
    /// A pending transaction from this wallet is amended instead of creating
    /// a second one, unless the chain moved its balance since. The result is
    /// pooled and broadcast.
    pub fn transact(&self, recipient: &str, amount: u64) -> Result<Transaction, NodeError> {
        let transaction = {
            let mut ledger = self.ledger();
            let mut wallet = self.wallet();
            let Ledger { blockchain, pool } = &mut *ledger;

            let balance = Wallet::calculate_balance(&blockchain.chain, &wallet.public_key);
            let transaction = match pool.existing_transaction_mut(&wallet.public_key) {
                Some(pending) if pending.input.amount == balance => {
                    pending.update(&wallet, recipient, amount)?;
                    pending.clone()
                }
                // None, or pending against a balance the chain no longer shows
                _ => wallet.create_transaction(recipient, amount, Some(blockchain.chain.as_slice()))?,
            };
            if pool.set_transaction(transaction.clone()) {
                self.bump_pool_epoch();
            }
            transaction
        };
        debug!("pooled transaction {} to {}", transaction.id, recipient);

        self.publish_transaction(&transaction);
        Ok(transaction)
    }

    /// Mine raw `data` on top of the chain, bypassing the pool and reward.
    pub fn mine_raw_block(&self, data: Vec<Transaction>) -> Result<MinedBlock, NodeError> {
        let mined = self.seal(data)?;
        self.publish_chain();
        Ok(mined)
    }

    /// Adopt a root node's state at bootstrap: its chain (structural checks
    /// only) and its pool.
    ///
    /// The node never fetches that state itself; whoever bootstraps it
    /// retrieves the root's chain and pool map and hands them over here.
    pub fn sync_state(
        &self,
        chain: Vec<Block>,
        pool_map: HashMap<String, Transaction>,
    ) -> Result<(), ReplaceError> {
        let mut ledger = self.ledger();
        let adopted = ledger.blockchain.replace_chain(chain, false, |_| {});
        if adopted.is_ok() {
            self.bump_chain_epoch();
        }
        ledger.pool.set_map(pool_map);
        self.bump_pool_epoch();
        adopted
    }

    /// Apply one message from the bus. Own messages and rejected payloads
    /// leave the state untouched.
    pub fn handle_message(&self, msg: &BusMessage) {
        let inbound = match self.pubsub.decode(msg) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => return,
            Err(e) => {
                warn!("dropping undecodable {:?} message: {e}", msg.channel);
                return;
            }
        };

        match inbound {
            Inbound::Chain(candidate) => {
                let incoming = candidate.len();
                match self.ledger().adopt_chain(candidate, true) {
                    Ok(()) => {
                        self.bump_chain_epoch();
                        info!("replaced chain with peer chain of length {incoming}");
                    }
                    Err(e) => warn!("rejected peer chain: {e}"),
                }
            }
            Inbound::Transaction(transaction) => {
                if let Err(e) = transaction.validate() {
                    warn!("rejected peer transaction: {e}");
                    return;
                }
                let mut ledger = self.ledger();
                if ledger.pool.set_transaction(transaction.clone()) {
                    self.bump_pool_epoch();
                }
                debug!("peer transaction {} pooled", transaction.id);
            }
        }
    }

    /// Consume bus messages until the bus closes.
    pub async fn listen(self: Arc<Self>, mut rx: broadcast::Receiver<BusMessage>) {
        loop {
            match rx.recv().await {
                Ok(msg) => self.handle_message(&msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("listener lagged, {skipped} messages skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("node {} stopped listening", self.node_id());
    }

    fn publish_chain(&self) {
        let chain = self.chain();
        if let Err(e) = self.pubsub.broadcast_chain(&chain) {
            warn!("chain broadcast failed: {e}");
        }
    }

    fn publish_transaction(&self, transaction: &Transaction) {
        if let Err(e) = self.pubsub.broadcast_transaction(transaction) {
            warn!("transaction broadcast failed: {e}");
        }
    }
}
