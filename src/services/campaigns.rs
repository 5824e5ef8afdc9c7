//! Campaign use cases: listing, detail, creation, owner-only edits.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::domain::{Campaign, CampaignChanges, CampaignImage, NewCampaign, NewCampaignImage};
use crate::error::AppError;
use crate::ports::CampaignStore;
use crate::services::access::ensure_owner;
use crate::validation::{
    normalize_perks, sanitize_string, validate_campaign_name, validate_max_len,
    validate_positive_amount, validate_required, FILE_REFERENCE_MAX_LEN,
    SHORT_DESCRIPTION_MAX_LEN,
};

/// Body of campaign create and update requests.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CampaignInput {
    pub name: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    pub goal_amount: i64,
    #[serde(default)]
    pub perks: Vec<String>,
}

impl CampaignInput {
    fn into_changes(self) -> Result<CampaignChanges, AppError> {
        let name = sanitize_string(&self.name);
        validate_campaign_name(&name)?;
        let short_description = sanitize_string(&self.short_description);
        validate_max_len("short_description", &short_description, SHORT_DESCRIPTION_MAX_LEN)?;
        validate_positive_amount("goal_amount", self.goal_amount)?;
        let perks = normalize_perks(&self.perks)?;

        Ok(CampaignChanges {
            name,
            short_description,
            description: self.description.trim().to_string(),
            goal_amount: self.goal_amount,
            perks,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CampaignImageInput {
    pub campaign_id: i64,
    pub file_reference: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub images: Vec<CampaignImage>,
}

#[derive(Clone)]
pub struct CampaignService {
    store: Arc<dyn CampaignStore>,
}

impl CampaignService {
    pub fn new(store: Arc<dyn CampaignStore>) -> Self {
        Self { store }
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        Ok(self.store.health_check().await?)
    }

    /// All campaigns, or only those of `owner` when given a non-zero id.
    pub async fn list(&self, owner: Option<i64>) -> Result<Vec<Campaign>, AppError> {
        let campaigns = match owner {
            Some(user_id) if user_id != 0 => self.store.list_by_owner(user_id).await?,
            _ => self.store.list_all().await?,
        };
        Ok(campaigns)
    }

    pub async fn get(&self, id: i64) -> Result<CampaignDetail, AppError> {
        let campaign = self.store.get(id).await?;
        let images = self.store.list_images(id).await?;
        Ok(CampaignDetail { campaign, images })
    }

    pub async fn create(&self, user_id: i64, input: CampaignInput) -> Result<Campaign, AppError> {
        let changes = input.into_changes()?;
        let draft = NewCampaign {
            user_id,
            name: changes.name,
            short_description: changes.short_description,
            description: changes.description,
            goal_amount: changes.goal_amount,
            perks: changes.perks,
        };

        let campaign = self.store.create(&draft).await?;
        tracing::info!(campaign_id = campaign.id, user_id, slug = %campaign.slug, "campaign created");
        Ok(campaign)
    }

    /// Loads a campaign and confirms `user_id` owns it.
    pub async fn owned(&self, user_id: i64, campaign_id: i64) -> Result<Campaign, AppError> {
        let campaign = self.store.get(campaign_id).await?;
        ensure_owner(&campaign, user_id)?;
        Ok(campaign)
    }

    pub async fn update(
        &self,
        user_id: i64,
        campaign_id: i64,
        input: CampaignInput,
    ) -> Result<Campaign, AppError> {
        let mut campaign = self.owned(user_id, campaign_id).await?;

        campaign.apply(input.into_changes()?);
        let updated = self.store.update(&campaign).await?;
        tracing::info!(campaign_id, user_id, "campaign updated");
        Ok(updated)
    }

    pub async fn add_image(
        &self,
        user_id: i64,
        input: CampaignImageInput,
    ) -> Result<CampaignImage, AppError> {
        let campaign = self.owned(user_id, input.campaign_id).await?;

        let file_reference = input.file_reference.trim().to_string();
        validate_required("file_reference", &file_reference)?;
        validate_max_len("file_reference", &file_reference, FILE_REFERENCE_MAX_LEN)?;

        let image = self
            .store
            .add_image(&NewCampaignImage {
                campaign_id: campaign.id,
                file_reference,
                is_primary: input.is_primary,
            })
            .await?;
        tracing::info!(
            campaign_id = campaign.id,
            image_id = image.id,
            is_primary = image.is_primary,
            "campaign image added"
        );
        Ok(image)
    }
}
