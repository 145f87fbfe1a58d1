use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;

use cryptochain::api::{self, AppState};
use cryptochain::config::NodeConfig;
use cryptochain::node::Node;
use cryptochain::pubsub::{LocalBus, PubSub};
use cryptochain::wallet::Wallet;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env();

    let bus = Arc::new(LocalBus::new());
    let pubsub = PubSub::new(config.node_id.clone(), bus);
    let node = Arc::new(Node::new(Wallet::new(), pubsub));

    let rx = node.subscribe();
    actix_web::rt::spawn(node.clone().listen(rx));

    info!(
        "node {} wallet {}",
        config.node_id,
        node.wallet_info().address
    );
    println!(
        "⛓️ Starting cryptochain node at http://{}:{}",
        config.host, config.port
    );

    let state = web::Data::new(AppState::new(node));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
