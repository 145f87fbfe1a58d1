use std::sync::Arc;
use std::time::Duration;

use cryptochain::blockchain::{Blockchain, MINING_REWARD};
use cryptochain::node::Node;
use cryptochain::pubsub::{LocalBus, PubSub};
use cryptochain::transaction::Transaction;
use cryptochain::wallet::{STARTING_BALANCE, Wallet};

fn spawn_node(bus: &Arc<LocalBus>, id: &str) -> Arc<Node> {
    let node = Arc::new(Node::new(Wallet::new(), PubSub::new(id, bus.clone())));
    let rx = node.subscribe();
    tokio::spawn(node.clone().listen(rx));
    node
}

async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peers_converge_on_transactions_and_mined_blocks() {
    let bus = Arc::new(LocalBus::new());
    let alice = spawn_node(&bus, "alice");
    let bob = spawn_node(&bus, "bob");

    let tx = alice.transact("carol", 20).unwrap();
    assert!(eventually(|| bob.transaction_pool_map().contains_key(&tx.id)).await);

    let block = bob.mine_transactions().unwrap().block;
    assert!(block.data.iter().any(|t| t.id == tx.id));
    assert!(eventually(|| alice.chain() == bob.chain()).await);
    assert!(eventually(|| alice.transaction_pool_map().is_empty()).await);

    let alice_address = alice.wallet_info().address;
    assert_eq!(alice.balance_of(&alice_address), STARTING_BALANCE - 20);
    assert_eq!(alice.balance_of("carol"), STARTING_BALANCE + 20);
    assert_eq!(
        alice.balance_of(&bob.wallet_info().address),
        STARTING_BALANCE + MINING_REWARD
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peers_ignore_a_longer_but_invalid_chain() {
    let bus = Arc::new(LocalBus::new());
    let alice = spawn_node(&bus, "alice");
    let bob = spawn_node(&bus, "bob");
    bob.mine_raw_block(Vec::new()).unwrap();
    assert!(eventually(|| alice.chain().len() == 2).await);

    let mut forged = Blockchain::new();
    forged.add_block(Vec::new());
    forged.add_block(vec![
        Transaction::reward_to("mallory"),
        Transaction::reward_to("mallory"),
    ]);
    PubSub::new("mallory", bus.clone())
        .broadcast_chain(&forged.chain)
        .unwrap();

    // A later valid block still arrives after the forged chain was dropped.
    bob.mine_raw_block(Vec::new()).unwrap();
    assert!(eventually(|| alice.chain().len() == 3).await);
    assert_eq!(alice.chain(), bob.chain());
    assert_eq!(alice.balance_of("mallory"), STARTING_BALANCE);
}
