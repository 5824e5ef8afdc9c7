//! Funding orchestration: transaction submission, gateway notifications and
//! the campaign backed amount they drive.
//!
//! The service holds no state of its own. Consistency under concurrent
//! requests comes from the per-entity atomic operations of the stores: a
//! status transition is serialized per transaction, and the `Pending -> Paid`
//! move credits the campaign inside that same store operation.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::domain::{NewTransaction, Transaction, TransactionStatus, UserTransaction};
use crate::error::AppError;
use crate::gateway::{ChargeRequest, PaymentGateway, PaymentOutcome};
use crate::ports::{CampaignStore, RepositoryError, TransactionStore};
use crate::services::access::ensure_owner;
use crate::validation::validate_positive_amount;

pub const DEFAULT_CHARGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Output of a successful submission.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmittedTransaction {
    pub transaction: Transaction,
    pub payment_url: String,
}

/// What happened to a notification that was structurally valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Applied { status: TransactionStatus },
    Duplicate { status: TransactionStatus },
    StillPending,
    Rejected { reason: String },
    AmountMismatch { expected: i64, reported: i64 },
    UnknownTransaction,
    /// The store refused the settlement because it would break a stored
    /// invariant. Nothing was written.
    InvariantViolation { reason: String },
}

/// Acknowledgment returned to the gateway.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationAck {
    pub transaction_id: i64,
    #[schema(value_type = Object)]
    pub disposition: Disposition,
}

impl NotificationAck {
    fn new(transaction_id: i64, disposition: Disposition) -> Self {
        Self {
            transaction_id,
            disposition,
        }
    }
}

#[derive(Clone)]
pub struct FundingService {
    campaigns: Arc<dyn CampaignStore>,
    transactions: Arc<dyn TransactionStore>,
    gateway: Arc<dyn PaymentGateway>,
    charge_timeout: Duration,
}

impl FundingService {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        transactions: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            campaigns,
            transactions,
            gateway,
            charge_timeout: DEFAULT_CHARGE_TIMEOUT,
        }
    }

    pub fn with_charge_timeout(mut self, charge_timeout: Duration) -> Self {
        self.charge_timeout = charge_timeout;
        self
    }

    /// Records a pending transaction and opens a charge for it.
    ///
    /// A gateway failure or timeout is reported as `UpstreamUnavailable`; the
    /// transaction stays `Pending` for a later reconciliation sweep.
    pub async fn submit_transaction(
        &self,
        user_id: i64,
        campaign_id: i64,
        amount: i64,
    ) -> Result<SubmittedTransaction, AppError> {
        validate_positive_amount("amount", amount)?;
        self.campaigns.get(campaign_id).await?;

        let tx = self
            .transactions
            .create(&NewTransaction {
                campaign_id,
                user_id,
                amount,
            })
            .await?;
        tracing::info!(transaction_id = tx.id, campaign_id, user_id, amount, "transaction created");

        let request = ChargeRequest {
            transaction_id: tx.id,
            amount: tx.amount,
        };
        let charge = match tokio::time::timeout(self.charge_timeout, self.gateway.create_charge(&request)).await {
            Ok(Ok(charge)) => charge,
            Ok(Err(e)) => {
                tracing::warn!(transaction_id = tx.id, error = %e, "charge creation failed, transaction left pending");
                return Err(AppError::UpstreamUnavailable(format!(
                    "payment gateway failed for transaction {}: {}",
                    tx.id, e
                )));
            }
            Err(_) => {
                tracing::warn!(
                    transaction_id = tx.id,
                    timeout_ms = self.charge_timeout.as_millis() as u64,
                    "charge creation timed out, transaction left pending"
                );
                return Err(AppError::UpstreamUnavailable(format!(
                    "payment gateway timed out for transaction {}",
                    tx.id
                )));
            }
        };

        let transaction = match self
            .transactions
            .attach_payment(tx.id, &charge.payment_code, &charge.redirect_url)
            .await
        {
            Ok(transaction) => transaction,
            // A notification settled the transaction before we got here.
            Err(RepositoryError::Conflict(_)) => self.transactions.get(tx.id).await?,
            Err(e) => return Err(e.into()),
        };

        Ok(SubmittedTransaction {
            transaction,
            payment_url: charge.redirect_url,
        })
    }

    /// Entry point for gateway callbacks.
    ///
    /// Returns an error only for payloads that cannot be parsed or verified
    /// and for storage failures. A failed settlement writes nothing, so a
    /// redelivery after a storage failure still settles and credits. Every
    /// domain anomaly is acknowledged so the gateway does not redeliver forever.
    pub async fn handle_gateway_notification(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<NotificationAck, AppError> {
        let notification = self.gateway.parse_notification(payload, signature)?;
        let id = notification.transaction_id;

        let Some(target) = notification.outcome.target_status() else {
            tracing::info!(transaction_id = id, "gateway reports payment still pending");
            return Ok(NotificationAck::new(id, Disposition::StillPending));
        };

        let tx = match self.transactions.get(id).await {
            Ok(tx) => tx,
            Err(RepositoryError::NotFound(_)) => {
                tracing::warn!(transaction_id = id, "notification for unknown transaction");
                return Ok(NotificationAck::new(id, Disposition::UnknownTransaction));
            }
            Err(e) => return Err(e.into()),
        };

        if notification.outcome == PaymentOutcome::Success {
            if let Some(reported) = notification.gross_amount.filter(|r| *r != tx.amount) {
                tracing::warn!(
                    transaction_id = id,
                    expected = tx.amount,
                    reported,
                    "paid notification amount does not match transaction"
                );
                return Ok(NotificationAck::new(
                    id,
                    Disposition::AmountMismatch {
                        expected: tx.amount,
                        reported,
                    },
                ));
            }
        }

        let change = match self
            .transactions
            .apply_status_transition(id, target, notification.payment_code.as_deref())
            .await
        {
            Ok(change) => change,
            Err(RepositoryError::InvalidTransition(e)) => {
                tracing::warn!(transaction_id = id, error = %e, "conflicting notification rejected");
                return Ok(NotificationAck::new(
                    id,
                    Disposition::Rejected {
                        reason: e.to_string(),
                    },
                ));
            }
            Err(RepositoryError::InvariantViolation(reason)) => {
                tracing::error!(transaction_id = id, %reason, "settlement refused, invariant violated");
                return Ok(NotificationAck::new(
                    id,
                    Disposition::InvariantViolation { reason },
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let status = change.transaction.status;
        if change.is_redelivery() {
            tracing::info!(transaction_id = id, %status, "duplicate notification ignored");
            return Ok(NotificationAck::new(id, Disposition::Duplicate { status }));
        }

        tracing::info!(transaction_id = id, from = %change.previous, to = %status, "transaction status changed");
        if let Some(backed_amount) = change.campaign_backed_amount {
            tracing::info!(
                campaign_id = change.transaction.campaign_id,
                transaction_id = id,
                backed_amount,
                "campaign backed amount updated"
            );
        }

        Ok(NotificationAck::new(id, Disposition::Applied { status }))
    }

    /// Owner-only listing of a campaign's transactions, newest first.
    pub async fn list_campaign_transactions(
        &self,
        user_id: i64,
        campaign_id: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        let campaign = self.campaigns.get(campaign_id).await?;
        ensure_owner(&campaign, user_id)?;
        Ok(self.transactions.list_by_campaign(campaign_id).await?)
    }

    pub async fn list_user_transactions(&self, user_id: i64) -> Result<Vec<UserTransaction>, AppError> {
        Ok(self.transactions.list_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::NewCampaign;
    use crate::gateway::{notification, Charge, GatewayError, GatewayNotification};
    use async_trait::async_trait;

    struct SlowGateway;

    #[async_trait]
    impl PaymentGateway for SlowGateway {
        async fn create_charge(&self, _request: &ChargeRequest) -> Result<Charge, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(GatewayError::Rejected("too late".to_string()))
        }

        fn parse_notification(
            &self,
            payload: &[u8],
            _signature: Option<&str>,
        ) -> Result<GatewayNotification, GatewayError> {
            notification::parse_notification(payload)
        }
    }

    #[tokio::test]
    async fn charge_timeout_leaves_transaction_pending() {
        let store = Arc::new(InMemoryStore::new());
        let campaign = CampaignStore::create(
            store.as_ref(),
            &NewCampaign {
                user_id: 1,
                name: "Timeouts".to_string(),
                short_description: String::new(),
                description: String::new(),
                goal_amount: 1_000,
                perks: vec![],
            },
        )
        .await
        .unwrap();

        let service = FundingService::new(store.clone(), store.clone(), Arc::new(SlowGateway))
            .with_charge_timeout(Duration::from_millis(50));

        let err = service.submit_transaction(2, campaign.id, 100).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));

        let listed = store.list_by_campaign(campaign.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, TransactionStatus::Pending);
        assert!(listed[0].payment_code.is_none());
    }

    #[test]
    fn disposition_serializes_with_variant_name() {
        let ack = NotificationAck::new(
            3,
            Disposition::Applied {
                status: TransactionStatus::Paid,
            },
        );
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(value["transaction_id"], 3);
        assert_eq!(value["disposition"]["applied"]["status"], "paid");

        let refused = serde_json::to_value(Disposition::InvariantViolation {
            reason: "overflow".to_string(),
        })
        .unwrap();
        assert_eq!(refused["invariant_violation"]["reason"], "overflow");
    }
}
