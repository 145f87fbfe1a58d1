use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info, warn};

use super::models::{
    AppState, ChainResponse, ErrorResponse, MineRequest, MineResponse, ValidateResponse,
};
use crate::blockchain::Blockchain;
use crate::error::NodeError;
use crate::node::MinedBlock;

/// Get the full blockchain.
#[get("/blocks/")]
pub async fn get_blocks(state: web::Data<AppState>) -> impl Responder {
    let chain = state.node.chain();
    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        chain,
    })
}

/// Validate the local chain: structure, then transaction data.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let chain = state.node.chain();
    let structural = Blockchain::validate_chain(&chain);
    let data = Blockchain::valid_transaction_data(&chain);

    let reason = match (&structural, &data) {
        (Err(e), _) => Some(e.to_string()),
        (Ok(()), Err(e)) => Some(e.to_string()),
        _ => None,
    };
    HttpResponse::Ok().json(ValidateResponse {
        valid: structural.is_ok(),
        transactions_valid: data.is_ok(),
        length: chain.len(),
        reason,
    })
}

/// Mine the transaction pool into a block rewarding this node's wallet.
///
/// The proof-of-work search runs on the blocking pool so the server keeps
/// answering while it runs.
#[post("/mine-transactions/")]
pub async fn mine_transactions(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.clone();
    let mined = web::block(move || node.mine_transactions()).await;
    mined_response(mined)
}

/// Mine arbitrary data as a block, bypassing the pool and the reward.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let data = req.into_inner().data;
    debug!("POST /mine/ - raw block with {} transactions", data.len());
    let node = state.node.clone();
    let mined = web::block(move || node.mine_raw_block(data)).await;
    mined_response(mined)
}

fn mined_response(
    mined: Result<Result<MinedBlock, NodeError>, actix_web::error::BlockingError>,
) -> HttpResponse {
    match mined {
        Ok(Ok(MinedBlock { index, block })) => {
            let resp = MineResponse {
                mined_index: index,
                hash: block.hash,
                nonce: block.nonce,
                difficulty: block.difficulty,
                transactions: block.data.len(),
            };
            info!(
                "MINER - block #{} accepted (hash={}, nonce={})",
                resp.mined_index, resp.hash, resp.nonce
            );
            HttpResponse::Ok().json(resp)
        }
        Ok(Err(e)) => {
            warn!("MINER - mining failed: {e}");
            HttpResponse::BadRequest().json(ErrorResponse::new(e.to_string()))
        }
        Err(e) => {
            warn!("MINER - worker failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse::new(e.to_string()))
        }
    }
}
