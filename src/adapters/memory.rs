//! In-process implementation of both stores.
//!
//! All tables live behind one `RwLock`, so every store call is atomic with
//! respect to every other one. Used by the test suite and `STORAGE=memory`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{
    Campaign, CampaignImage, NewCampaign, NewCampaignImage, NewTransaction, StatusChange,
    Transaction, TransactionStatus, UserTransaction,
};
use crate::ports::{CampaignStore, RepositoryError, RepositoryResult, TransactionStore};

#[derive(Default)]
struct Tables {
    campaigns: BTreeMap<i64, Campaign>,
    images: BTreeMap<i64, CampaignImage>,
    transactions: BTreeMap<i64, Transaction>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn campaign_mut(&mut self, id: i64) -> RepositoryResult<&mut Campaign> {
        self.campaigns
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", id)))
    }

    fn transaction_mut(&mut self, id: i64) -> RepositoryResult<&mut Transaction> {
        self.transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    fn primary_image(&self, campaign_id: i64) -> Option<String> {
        self.images
            .values()
            .find(|image| image.campaign_id == campaign_id && image.is_primary)
            .map(|image| image.file_reference.clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn list_all(&self) -> RepositoryResult<Vec<Campaign>> {
        Ok(self.tables.read().await.campaigns.values().cloned().collect())
    }

    async fn list_by_owner(&self, user_id: i64) -> RepositoryResult<Vec<Campaign>> {
        Ok(self
            .tables
            .read()
            .await
            .campaigns
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> RepositoryResult<Campaign> {
        self.tables
            .read()
            .await
            .campaigns
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", id)))
    }

    async fn create(&self, draft: &NewCampaign) -> RepositoryResult<Campaign> {
        let mut tables = self.tables.write().await;
        let slug = draft.slug();
        if tables.campaigns.values().any(|c| c.slug == slug) {
            return Err(RepositoryError::Conflict(format!("slug '{}' already taken", slug)));
        }

        let now = Utc::now();
        let campaign = Campaign {
            id: tables.next_id(),
            user_id: draft.user_id,
            name: draft.name.clone(),
            slug,
            short_description: draft.short_description.clone(),
            description: draft.description.clone(),
            goal_amount: draft.goal_amount,
            backed_amount: 0,
            perks: draft.perks.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn update(&self, campaign: &Campaign) -> RepositoryResult<Campaign> {
        let mut tables = self.tables.write().await;
        let stored = tables.campaign_mut(campaign.id)?;
        stored.name = campaign.name.clone();
        stored.short_description = campaign.short_description.clone();
        stored.description = campaign.description.clone();
        stored.goal_amount = campaign.goal_amount;
        stored.perks = campaign.perks.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn list_images(&self, campaign_id: i64) -> RepositoryResult<Vec<CampaignImage>> {
        Ok(self
            .tables
            .read()
            .await
            .images
            .values()
            .filter(|image| image.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn add_image(&self, image: &NewCampaignImage) -> RepositoryResult<CampaignImage> {
        let mut tables = self.tables.write().await;
        tables.campaign_mut(image.campaign_id)?;

        if image.is_primary {
            for existing in tables
                .images
                .values_mut()
                .filter(|existing| existing.campaign_id == image.campaign_id)
            {
                existing.is_primary = false;
            }
        }

        let stored = CampaignImage {
            id: tables.next_id(),
            campaign_id: image.campaign_id,
            file_reference: image.file_reference.clone(),
            is_primary: image.is_primary,
            created_at: Utc::now(),
        };
        tables.images.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn adjust_backed_amount(&self, campaign_id: i64, delta: i64) -> RepositoryResult<Campaign> {
        let mut tables = self.tables.write().await;
        let campaign = tables.campaign_mut(campaign_id)?;
        let target = campaign.backed_amount.checked_add(delta).ok_or_else(|| {
            RepositoryError::InvariantViolation(format!(
                "backed amount of campaign {} overflows adding {}",
                campaign_id, delta
            ))
        })?;

        campaign.backed_amount = target.max(0);
        campaign.updated_at = Utc::now();

        if target < 0 {
            return Err(RepositoryError::InvariantViolation(format!(
                "backed amount of campaign {} would drop to {}",
                campaign_id, target
            )));
        }
        Ok(campaign.clone())
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn create(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        let mut tables = self.tables.write().await;
        if !tables.campaigns.contains_key(&tx.campaign_id) {
            return Err(RepositoryError::NotFound(format!("campaign {}", tx.campaign_id)));
        }

        let now = Utc::now();
        let transaction = Transaction {
            id: tables.next_id(),
            campaign_id: tx.campaign_id,
            user_id: tx.user_id,
            amount: tx.amount,
            status: TransactionStatus::Pending,
            payment_code: None,
            payment_url: None,
            created_at: now,
            updated_at: now,
        };
        tables.transactions.insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn get(&self, id: i64) -> RepositoryResult<Transaction> {
        self.tables
            .read()
            .await
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn list_by_campaign(&self, campaign_id: i64) -> RepositoryResult<Vec<Transaction>> {
        // ids are monotonic, so reverse key order is newest first
        Ok(self
            .tables
            .read()
            .await
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: i64) -> RepositoryResult<Vec<UserTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .map(|tx| UserTransaction {
                transaction: tx.clone(),
                campaign_name: tables
                    .campaigns
                    .get(&tx.campaign_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                campaign_primary_image: tables.primary_image(tx.campaign_id),
            })
            .collect())
    }

    async fn apply_status_transition(
        &self,
        id: i64,
        next: TransactionStatus,
        payment_code: Option<&str>,
    ) -> RepositoryResult<StatusChange> {
        let mut tables = self.tables.write().await;
        let current = tables.transaction_mut(id)?.clone();
        let previous = current.status;

        if !previous.transition(next)? {
            return Ok(StatusChange {
                transaction: current,
                previous,
                campaign_backed_amount: None,
            });
        }

        let now = Utc::now();
        let mut campaign_backed_amount = None;
        if next == TransactionStatus::Paid {
            let campaign = tables.campaign_mut(current.campaign_id)?;
            let credited = campaign.backed_amount.checked_add(current.amount).ok_or_else(|| {
                RepositoryError::InvariantViolation(format!(
                    "backed amount of campaign {} overflows crediting transaction {}",
                    current.campaign_id, id
                ))
            })?;
            campaign.backed_amount = credited;
            campaign.updated_at = now;
            campaign_backed_amount = Some(credited);
        }

        let tx = tables.transaction_mut(id)?;
        tx.status = next;
        if tx.payment_code.is_none() {
            tx.payment_code = payment_code.map(str::to_string);
        }
        tx.updated_at = now;

        Ok(StatusChange {
            transaction: tx.clone(),
            previous,
            campaign_backed_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(user_id: i64, name: &str) -> NewCampaign {
        NewCampaign {
            user_id,
            name: name.to_string(),
            short_description: "short".to_string(),
            description: "long".to_string(),
            goal_amount: 1_000_000,
            perks: vec!["thanks".to_string()],
        }
    }

    async fn primary_count(store: &InMemoryStore, campaign_id: i64) -> usize {
        store
            .list_images(campaign_id)
            .await
            .unwrap()
            .iter()
            .filter(|i| i.is_primary)
            .count()
    }

    #[tokio::test]
    async fn create_assigns_slug_and_zero_backed_amount() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(3, "Solar Kit")).await.unwrap();

        assert_eq!(campaign.slug, "solar-kit-3");
        assert_eq!(campaign.backed_amount, 0);
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let store = InMemoryStore::new();
        CampaignStore::create(&store, &draft(3, "Solar Kit")).await.unwrap();
        let err = CampaignStore::create(&store, &draft(3, "solar kit")).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn new_primary_image_replaces_old_primary() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();

        let first = store
            .add_image(&NewCampaignImage {
                campaign_id: campaign.id,
                file_reference: "images/a.png".to_string(),
                is_primary: true,
            })
            .await
            .unwrap();
        store
            .add_image(&NewCampaignImage {
                campaign_id: campaign.id,
                file_reference: "images/b.png".to_string(),
                is_primary: true,
            })
            .await
            .unwrap();

        let images = store.list_images(campaign.id).await.unwrap();
        let old = images.iter().find(|i| i.id == first.id).unwrap();
        assert!(!old.is_primary);
        assert_eq!(primary_count(&store, campaign.id).await, 1);
    }

    #[tokio::test]
    async fn non_primary_image_keeps_existing_primary() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();

        for (file, primary) in [("a.png", true), ("b.png", false)] {
            store
                .add_image(&NewCampaignImage {
                    campaign_id: campaign.id,
                    file_reference: file.to_string(),
                    is_primary: primary,
                })
                .await
                .unwrap();
        }

        let images = store.list_images(campaign.id).await.unwrap();
        assert_eq!(images.len(), 2);
        assert!(images.iter().any(|i| i.file_reference == "a.png" && i.is_primary));
    }

    #[tokio::test]
    async fn concurrent_primary_images_leave_one_primary() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .add_image(&NewCampaignImage {
                            campaign_id: campaign.id,
                            file_reference: format!("img-{}.png", i),
                            is_primary: true,
                        })
                        .await
                })
            })
            .collect();
        for handle in futures::future::join_all(handles).await {
            handle.unwrap().unwrap();
        }

        assert_eq!(primary_count(&store, campaign.id).await, 1);
    }

    #[tokio::test]
    async fn image_for_missing_campaign_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .add_image(&NewCampaignImage {
                campaign_id: 404,
                file_reference: "x.png".to_string(),
                is_primary: true,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn backed_amount_underflow_clamps_to_zero() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();
        store.adjust_backed_amount(campaign.id, 50).await.unwrap();

        let err = store.adjust_backed_amount(campaign.id, -80).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvariantViolation(_)));
        assert_eq!(CampaignStore::get(&store, campaign.id).await.unwrap().backed_amount, 0);
    }

    #[tokio::test]
    async fn backed_amount_overflow_is_rejected_without_write() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();
        store.adjust_backed_amount(campaign.id, i64::MAX).await.unwrap();

        let err = store.adjust_backed_amount(campaign.id, 10).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvariantViolation(_)));
        assert_eq!(
            CampaignStore::get(&store, campaign.id).await.unwrap().backed_amount,
            i64::MAX
        );
    }

    #[tokio::test]
    async fn paid_transition_credits_campaign_in_same_step() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();
        let tx = TransactionStore::create(
            &store,
            &NewTransaction {
                campaign_id: campaign.id,
                user_id: 2,
                amount: 300,
            },
        )
        .await
        .unwrap();

        let change = store
            .apply_status_transition(tx.id, TransactionStatus::Paid, None)
            .await
            .unwrap();
        assert_eq!(change.campaign_backed_amount, Some(300));
        assert_eq!(CampaignStore::get(&store, campaign.id).await.unwrap().backed_amount, 300);

        let repeat = store
            .apply_status_transition(tx.id, TransactionStatus::Paid, None)
            .await
            .unwrap();
        assert!(repeat.is_redelivery());
        assert_eq!(repeat.campaign_backed_amount, None);
        assert_eq!(CampaignStore::get(&store, campaign.id).await.unwrap().backed_amount, 300);
    }

    #[tokio::test]
    async fn failed_credit_leaves_transaction_pending() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();
        store.adjust_backed_amount(campaign.id, i64::MAX - 5).await.unwrap();
        let tx = TransactionStore::create(
            &store,
            &NewTransaction {
                campaign_id: campaign.id,
                user_id: 2,
                amount: 10,
            },
        )
        .await
        .unwrap();

        let err = store
            .apply_status_transition(tx.id, TransactionStatus::Paid, Some("gw-9"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvariantViolation(_)));

        let stored = TransactionStore::get(&store, tx.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert!(stored.payment_code.is_none());
        assert_eq!(
            CampaignStore::get(&store, campaign.id).await.unwrap().backed_amount,
            i64::MAX - 5
        );
    }

    #[tokio::test]
    async fn transitions_follow_state_machine() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();
        let tx = TransactionStore::create(
            &store,
            &NewTransaction {
                campaign_id: campaign.id,
                user_id: 2,
                amount: 500,
            },
        )
        .await
        .unwrap();

        let change = store
            .apply_status_transition(tx.id, TransactionStatus::Denied, Some("gw-1"))
            .await
            .unwrap();
        assert_eq!(change.previous, TransactionStatus::Pending);
        assert_eq!(change.transaction.status, TransactionStatus::Denied);
        assert_eq!(change.transaction.payment_code.as_deref(), Some("gw-1"));

        let repeat = store
            .apply_status_transition(tx.id, TransactionStatus::Denied, None)
            .await
            .unwrap();
        assert!(repeat.is_redelivery());

        let err = store
            .apply_status_transition(tx.id, TransactionStatus::Paid, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn user_listing_is_newest_first_with_primary_image() {
        let store = InMemoryStore::new();
        let campaign = CampaignStore::create(&store, &draft(1, "Boat")).await.unwrap();
        store
            .add_image(&NewCampaignImage {
                campaign_id: campaign.id,
                file_reference: "cover.png".to_string(),
                is_primary: true,
            })
            .await
            .unwrap();

        for amount in [100, 200] {
            TransactionStore::create(
                &store,
                &NewTransaction {
                    campaign_id: campaign.id,
                    user_id: 5,
                    amount,
                },
            )
            .await
            .unwrap();
        }

        let listed = store.list_by_user(5).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].transaction.amount, 200);
        assert_eq!(listed[0].campaign_name, "Boat");
        assert_eq!(listed[0].campaign_primary_image.as_deref(), Some("cover.png"));
    }
}
