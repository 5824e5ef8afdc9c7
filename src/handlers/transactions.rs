use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{Transaction, UserTransaction};
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitTransactionRequest {
    pub campaign_id: i64,
    pub amount: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = SubmitTransactionRequest,
    responses(
        (status = 201, description = "Pending transaction with its payment page", body = SubmittedTransaction),
        (status = 400, description = "Invalid amount"),
        (status = 404, description = "Campaign not found"),
        (status = 503, description = "Gateway unavailable, transaction left pending")
    ),
    tag = "Transactions"
)]
pub async fn submit_transaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SubmitTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submitted = state
        .funding
        .submit_transaction(user.id, request.campaign_id, request.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(submitted)))
}

#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/transactions",
    params(("id" = i64, Path, description = "Campaign id")),
    responses(
        (status = 200, description = "Transactions, newest first", body = [Transaction]),
        (status = 403, description = "Caller does not own the campaign")
    ),
    tag = "Transactions"
)]
pub async fn list_campaign_transactions(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(campaign_id): Path<i64>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(
        state
            .funding
            .list_campaign_transactions(user.id, campaign_id)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses((status = 200, description = "Caller's transactions, newest first", body = [UserTransaction])),
    tag = "Transactions"
)]
pub async fn list_user_transactions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<UserTransaction>>, AppError> {
    Ok(Json(state.funding.list_user_transactions(user.id).await?))
}
