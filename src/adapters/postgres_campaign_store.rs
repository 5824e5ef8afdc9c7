//! Postgres implementation of CampaignStore.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{Campaign, CampaignImage, NewCampaign, NewCampaignImage};
use crate::ports::{CampaignStore, RepositoryError, RepositoryResult};

const CAMPAIGN_COLUMNS: &str = "id, user_id, name, slug, short_description, description, \
     goal_amount, backed_amount, perks, created_at, updated_at";

/// Postgres-backed campaign store.
#[derive(Clone)]
pub struct PostgresCampaignStore {
    pool: PgPool,
}

impl PostgresCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignStore for PostgresCampaignStore {
    async fn list_all(&self) -> RepositoryResult<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns ORDER BY id",
            CAMPAIGN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CampaignRow::into_domain).collect())
    }

    async fn list_by_owner(&self, user_id: i64) -> RepositoryResult<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns WHERE user_id = $1 ORDER BY id",
            CAMPAIGN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CampaignRow::into_domain).collect())
    }

    async fn get(&self, id: i64) -> RepositoryResult<Campaign> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CampaignRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", id)))
    }

    async fn create(&self, draft: &NewCampaign) -> RepositoryResult<Campaign> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            r#"
            INSERT INTO campaigns (
                user_id, name, slug, short_description, description, goal_amount, perks
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(draft.user_id)
        .bind(&draft.name)
        .bind(draft.slug())
        .bind(&draft.short_description)
        .bind(&draft.description)
        .bind(draft.goal_amount)
        .bind(&draft.perks)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain())
    }

    async fn update(&self, campaign: &Campaign) -> RepositoryResult<Campaign> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            r#"
            UPDATE campaigns
            SET name = $2, short_description = $3, description = $4,
                goal_amount = $5, perks = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(&campaign.short_description)
        .bind(&campaign.description)
        .bind(campaign.goal_amount)
        .bind(&campaign.perks)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CampaignRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", campaign.id)))
    }

    async fn list_images(&self, campaign_id: i64) -> RepositoryResult<Vec<CampaignImage>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            "SELECT id, campaign_id, file_reference, is_primary, created_at \
             FROM campaign_images WHERE campaign_id = $1 ORDER BY id",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ImageRow::into_domain).collect())
    }

    async fn add_image(&self, image: &NewCampaignImage) -> RepositoryResult<CampaignImage> {
        let mut tx = self.pool.begin().await?;

        // Locking the parent row serializes concurrent image writes per campaign.
        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM campaigns WHERE id = $1 FOR UPDATE")
            .bind(image.campaign_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound(format!("campaign {}", image.campaign_id)));
        }

        if image.is_primary {
            sqlx::query(
                "UPDATE campaign_images SET is_primary = FALSE \
                 WHERE campaign_id = $1 AND is_primary",
            )
            .bind(image.campaign_id)
            .execute(&mut *tx)
            .await?;
        }

        let stored = sqlx::query_as::<_, ImageRow>(
            r#"
            INSERT INTO campaign_images (campaign_id, file_reference, is_primary)
            VALUES ($1, $2, $3)
            RETURNING id, campaign_id, file_reference, is_primary, created_at
            "#,
        )
        .bind(image.campaign_id)
        .bind(&image.file_reference)
        .bind(image.is_primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored.into_domain())
    }

    async fn adjust_backed_amount(&self, campaign_id: i64, delta: i64) -> RepositoryResult<Campaign> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, i64>(
            "SELECT backed_amount FROM campaigns WHERE id = $1 FOR UPDATE",
        )
        .bind(campaign_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", campaign_id)))?;

        let target = current.checked_add(delta).ok_or_else(|| {
            RepositoryError::InvariantViolation(format!(
                "backed amount of campaign {} overflows adding {}",
                campaign_id, delta
            ))
        })?;
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "UPDATE campaigns SET backed_amount = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            CAMPAIGN_COLUMNS
        ))
        .bind(campaign_id)
        .bind(target.max(0))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if target < 0 {
            return Err(RepositoryError::InvariantViolation(format!(
                "backed amount of campaign {} would drop to {}",
                campaign_id, target
            )));
        }
        Ok(row.into_domain())
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    id: i64,
    user_id: i64,
    name: String,
    slug: String,
    short_description: String,
    description: String,
    goal_amount: i64,
    backed_amount: i64,
    perks: Vec<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl CampaignRow {
    fn into_domain(self) -> Campaign {
        Campaign {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            slug: self.slug,
            short_description: self.short_description,
            description: self.description,
            goal_amount: self.goal_amount,
            backed_amount: self.backed_amount,
            perks: self.perks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i64,
    campaign_id: i64,
    file_reference: String,
    is_primary: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl ImageRow {
    fn into_domain(self) -> CampaignImage {
        CampaignImage {
            id: self.id,
            campaign_id: self.campaign_id,
            file_reference: self.file_reference,
            is_primary: self.is_primary,
            created_at: self.created_at,
        }
    }
}
