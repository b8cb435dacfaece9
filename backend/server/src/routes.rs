use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use ledger::{
    WalletSummary,
    payloads::{AdIdsRequest, BatchResponse},
};
use serde_json::json;

use crate::{error::AppError, state::AppState, utils::get_ad_ids};

type Payload = Result<Json<AdIdsRequest>, JsonRejection>;

/// 200 only when every ad succeeded, 207 otherwise.
fn batch_response(response: BatchResponse) -> impl IntoResponse {
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };

    (status, Json(response))
}

pub async fn spend_check_handler(
    State(state): State<Arc<AppState>>,
    payload: Payload,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let ad_ids = get_ad_ids(request, state.config.max_batch_size)?;

    Ok(batch_response(
        state.reconciler.check_batch(&ad_ids).await,
    ))
}

pub async fn sync_insights_handler(
    State(state): State<Arc<AppState>>,
    payload: Payload,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let ad_ids = get_ad_ids(request, state.config.max_batch_size)?;

    Ok(batch_response(state.reconciler.sync_batch(&ad_ids).await))
}

pub async fn wallet_balance_handler(
    State(state): State<Arc<AppState>>,
    Path(affiliate_email): Path<String>,
) -> Result<Json<WalletSummary>, AppError> {
    let affiliate_email = affiliate_email.trim();
    if affiliate_email.is_empty() {
        return Err(AppError::MalformedPayload(
            "affiliate email is required".to_string(),
        ));
    }

    Ok(Json(
        state.reconciler.wallet_summary(affiliate_email).await?,
    ))
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
