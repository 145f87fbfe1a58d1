use actix_web::{HttpResponse, Responder, get, web};

use super::models::AppState;

/// Address and chain-derived balance of this node's wallet.
#[get("/wallet-info/")]
pub async fn wallet_info(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.wallet_info())
}
