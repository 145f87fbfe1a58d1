mod balance;
mod chain;
mod health;
pub mod models;
mod stats;
mod tx;
mod wallet;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_blocks)
            .service(chain::validate_chain)
            .service(chain::mine_transactions)
            .service(chain::mine_block)
            .service(tx::post_transact)
            .service(tx::get_transaction_pool_map)
            .service(balance::get_balance)
            .service(stats::get_stats)
            .service(wallet::wallet_info),
    );
}
