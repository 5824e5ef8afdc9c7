use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::IntoParams;

use crate::domain::Campaign;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::services::campaigns::{CampaignDetail, CampaignImageInput, CampaignInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct ImageTarget {
    campaign_id: i64,
}

/// Owner-only routes read the body only after the ownership check, so a
/// non-owner gets 403 whatever the payload looks like.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("invalid request body: {}", e)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCampaignsQuery {
    /// Owner filter; absent or 0 lists every campaign.
    pub user_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    params(ListCampaignsQuery),
    responses((status = 200, description = "Campaigns", body = [Campaign])),
    tag = "Campaigns"
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<Vec<Campaign>>, AppError> {
    Ok(Json(state.campaigns.list(query.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}",
    params(("id" = i64, Path, description = "Campaign id")),
    responses(
        (status = 200, description = "Campaign with its images", body = CampaignDetail),
        (status = 404, description = "Campaign not found")
    ),
    tag = "Campaigns"
)]
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CampaignDetail>, AppError> {
    Ok(Json(state.campaigns.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    request_body = CampaignInput,
    responses(
        (status = 201, description = "Campaign created", body = Campaign),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Slug already taken")
    ),
    tag = "Campaigns"
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CampaignInput>,
) -> Result<impl IntoResponse, AppError> {
    let campaign = state.campaigns.create(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

#[utoipa::path(
    put,
    path = "/api/v1/campaigns/{id}",
    params(("id" = i64, Path, description = "Campaign id")),
    request_body = CampaignInput,
    responses(
        (status = 200, description = "Campaign updated", body = Campaign),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Caller does not own the campaign"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "Campaigns"
)]
pub async fn update_campaign(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<Campaign>, AppError> {
    state.campaigns.owned(user.id, id).await?;
    let input: CampaignInput = parse_body(&body)?;
    Ok(Json(state.campaigns.update(user.id, id, input).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/campaign-images",
    request_body = CampaignImageInput,
    responses(
        (status = 201, description = "Image stored", body = CampaignImage),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Caller does not own the campaign"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "Campaigns"
)]
pub async fn add_campaign_image(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let target: ImageTarget = parse_body(&body)?;
    state.campaigns.owned(user.id, target.campaign_id).await?;
    let input: CampaignImageInput = parse_body(&body)?;
    let image = state.campaigns.add_image(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(image)))
}
