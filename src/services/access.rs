//! Ownership checks for campaign-scoped operations.

use crate::domain::Campaign;
use crate::error::AppError;

pub fn ensure_owner(campaign: &Campaign, user_id: i64) -> Result<(), AppError> {
    if campaign.is_owned_by(user_id) {
        return Ok(());
    }

    tracing::warn!(
        campaign_id = campaign.id,
        owner_id = campaign.user_id,
        user_id,
        "ownership check failed"
    );
    Err(AppError::Forbidden(format!(
        "user {} does not own campaign {}",
        user_id, campaign.id
    )))
}
