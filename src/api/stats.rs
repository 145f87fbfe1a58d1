use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};
use crate::blockchain::MINE_RATE_MS;

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let node = &state.node;
    let resp = node.with_ledger(|ledger| {
        let chain = &ledger.blockchain.chain;
        let height = chain.len();

        // genesis has a fixed timestamp, so the first interval is meaningless
        let last_interval_ms = if height >= 3 {
            let newer = &chain[height - 1];
            let older = &chain[height - 2];
            Some((newer.timestamp - older.timestamp).max(0))
        } else {
            None
        };

        StatsResponse {
            height,
            difficulty: ledger.blockchain.last_block().difficulty,
            mine_rate_ms: MINE_RATE_MS,
            last_interval_ms,
            pool_size: ledger.pool.len(),
            node_id: node.node_id().to_string(),
        }
    });
    HttpResponse::Ok().json(resp)
}
