//! Campaign domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A fundable campaign. `backed_amount` is a cached sum of the campaign's
/// paid transactions and is only ever moved by the funding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Campaign {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub short_description: String,
    pub description: String,
    pub goal_amount: i64,
    pub backed_amount: i64,
    pub perks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Campaign as submitted by its owner, before the store assigns identity.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub user_id: i64,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub goal_amount: i64,
    pub perks: Vec<String>,
}

impl NewCampaign {
    /// Slug stored for this campaign: slugified name plus the owner id.
    pub fn slug(&self) -> String {
        campaign_slug(&self.name, self.user_id)
    }
}

/// Owner-editable fields. Applied as a full replace.
#[derive(Debug, Clone)]
pub struct CampaignChanges {
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub goal_amount: i64,
    pub perks: Vec<String>,
}

impl Campaign {
    pub fn apply(&mut self, changes: CampaignChanges) {
        self.name = changes.name;
        self.short_description = changes.short_description;
        self.description = changes.description;
        self.goal_amount = changes.goal_amount;
        self.perks = changes.perks;
        self.updated_at = Utc::now();
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CampaignImage {
    pub id: i64,
    pub campaign_id: i64,
    pub file_reference: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCampaignImage {
    pub campaign_id: i64,
    pub file_reference: String,
    pub is_primary: bool,
}

pub fn campaign_slug(name: &str, user_id: i64) -> String {
    slug::slugify(format!("{} {}", name, user_id))
}
