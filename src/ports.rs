//! Storage ports consumed by the services.
//!
//! Every method is a single atomic unit against the backing store. Callers
//! never hold locks across calls; per-entity serialization is the store's job.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Campaign, CampaignImage, NewCampaign, NewCampaignImage, NewTransaction, StatusChange,
    Transaction, TransactionStatus, TransitionError, UserTransaction,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn list_all(&self) -> RepositoryResult<Vec<Campaign>>;

    async fn list_by_owner(&self, user_id: i64) -> RepositoryResult<Vec<Campaign>>;

    async fn get(&self, id: i64) -> RepositoryResult<Campaign>;

    /// Persists a new campaign with its derived slug. A slug that is already
    /// taken fails with `Conflict`.
    async fn create(&self, draft: &NewCampaign) -> RepositoryResult<Campaign>;

    /// Replaces the owner-editable fields of an existing campaign.
    async fn update(&self, campaign: &Campaign) -> RepositoryResult<Campaign>;

    async fn list_images(&self, campaign_id: i64) -> RepositoryResult<Vec<CampaignImage>>;

    /// Inserts an image. A primary image clears every other primary flag of
    /// the campaign in the same atomic step.
    async fn add_image(&self, image: &NewCampaignImage) -> RepositoryResult<CampaignImage>;

    /// Adds `delta` to the cached backed amount. A result below zero is
    /// clamped to zero and reported as `InvariantViolation`.
    async fn adjust_backed_amount(&self, campaign_id: i64, delta: i64) -> RepositoryResult<Campaign>;

    async fn health_check(&self) -> RepositoryResult<()>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists a new transaction in `Pending`.
    async fn create(&self, tx: &NewTransaction) -> RepositoryResult<Transaction>;

    async fn get(&self, id: i64) -> RepositoryResult<Transaction>;

    /// Newest first.
    async fn list_by_campaign(&self, campaign_id: i64) -> RepositoryResult<Vec<Transaction>>;

    /// Newest first, joined with each campaign's primary image.
    async fn list_by_user(&self, user_id: i64) -> RepositoryResult<Vec<UserTransaction>>;

    /// Records the gateway charge on a transaction that is still pending.
    async fn attach_payment(
        &self,
        id: i64,
        payment_code: &str,
        payment_url: &str,
    ) -> RepositoryResult<Transaction>;

    /// Moves a transaction along the status state machine. Concurrent calls
    /// for the same id are serialized, so exactly one caller observes the
    /// `Pending` origin of a given terminal move.
    ///
    /// A `Pending -> Paid` move credits the owning campaign's backed amount
    /// in the same atomic unit. If the credit cannot be applied (campaign
    /// missing, total would overflow) nothing is written.
    async fn apply_status_transition(
        &self,
        id: i64,
        next: TransactionStatus,
        payment_code: Option<&str>,
    ) -> RepositoryResult<StatusChange>;
}
