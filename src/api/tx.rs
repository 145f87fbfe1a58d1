use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info, warn};

use super::models::{AppState, ErrorResponse, TransactRequest, TransactResponse};

/// Send from this node's wallet. Repeated sends amend the pending transaction.
#[post("/transact/")]
pub async fn post_transact(
    state: web::Data<AppState>,
    body: web::Json<TransactRequest>,
) -> impl Responder {
    let TransactRequest { recipient, amount } = body.into_inner();
    debug!("POST /transact/ - recipient={recipient}, amount={amount}");

    if recipient.trim().is_empty() {
        warn!("POST /transact/ - rejected: empty recipient");
        return HttpResponse::BadRequest().json(ErrorResponse::new("recipient required"));
    }

    match state.node.transact(&recipient, amount) {
        Ok(transaction) => {
            info!("POST /transact/ - transaction {} pooled", transaction.id);
            HttpResponse::Ok().json(TransactResponse {
                kind: "success",
                transaction,
            })
        }
        Err(e) => {
            warn!("POST /transact/ - rejected: {e}");
            HttpResponse::BadRequest().json(ErrorResponse::new(e.to_string()))
        }
    }
}

/// Pending transactions keyed by id.
#[get("/transaction-pool-map/")]
pub async fn get_transaction_pool_map(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.transaction_pool_map())
}
