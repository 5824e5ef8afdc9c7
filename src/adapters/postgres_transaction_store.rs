//! Postgres implementation of TransactionStore.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{
    NewTransaction, StatusChange, Transaction, TransactionStatus, UserTransaction,
};
use crate::ports::{RepositoryError, RepositoryResult, TransactionStore};

const TRANSACTION_COLUMNS: &str =
    "id, campaign_id, user_id, amount, status, payment_code, payment_url, created_at, updated_at";

/// Postgres-backed transaction store.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn create(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (campaign_id, user_id, amount, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(tx.campaign_id)
        .bind(tx.user_id)
        .bind(tx.amount)
        .bind(TransactionStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                RepositoryError::NotFound(format!("campaign {}", tx.campaign_id))
            }
            other => RepositoryError::from(other),
        })?;

        row.into_domain()
    }

    async fn get(&self, id: i64) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn list_by_campaign(&self, campaign_id: i64) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE campaign_id = $1 ORDER BY id DESC",
            TRANSACTION_COLUMNS
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn list_by_user(&self, user_id: i64) -> RepositoryResult<Vec<UserTransaction>> {
        let rows = sqlx::query_as::<_, UserTransactionRow>(
            r#"
            SELECT t.id, t.campaign_id, t.user_id, t.amount, t.status,
                   t.payment_code, t.payment_url, t.created_at, t.updated_at,
                   c.name AS campaign_name,
                   i.file_reference AS campaign_primary_image
            FROM transactions t
            JOIN campaigns c ON c.id = t.campaign_id
            LEFT JOIN campaign_images i ON i.campaign_id = t.campaign_id AND i.is_primary
            WHERE t.user_id = $1
            ORDER BY t.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(UserTransaction {
                    campaign_name: row.campaign_name,
                    campaign_primary_image: row.campaign_primary_image,
                    transaction: row.transaction.into_domain()?,
                })
            })
            .collect()
    }

    async fn attach_payment(
        &self,
        id: i64,
        payment_code: &str,
        payment_url: &str,
    ) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET payment_code = $2, payment_url = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .bind(payment_code)
        .bind(payment_url)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_domain(),
            None => {
                let current = self.get(id).await?;
                Err(RepositoryError::Conflict(format!(
                    "transaction {} is already {}",
                    id, current.status
                )))
            }
        }
    }

    async fn apply_status_transition(
        &self,
        id: i64,
        next: TransactionStatus,
        payment_code: Option<&str>,
    ) -> RepositoryResult<StatusChange> {
        let mut db_tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1 FOR UPDATE",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
        .into_domain()?;

        let previous = current.status;
        if !previous.transition(next)? {
            db_tx.rollback().await?;
            return Ok(StatusChange {
                transaction: current,
                previous,
                campaign_backed_amount: None,
            });
        }

        // Lock order is transaction row, then campaign row.
        let mut campaign_backed_amount = None;
        if next == TransactionStatus::Paid {
            let backed = sqlx::query_scalar::<_, i64>(
                "SELECT backed_amount FROM campaigns WHERE id = $1 FOR UPDATE",
            )
            .bind(current.campaign_id)
            .fetch_optional(&mut *db_tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", current.campaign_id)))?;

            let credited = backed.checked_add(current.amount).ok_or_else(|| {
                RepositoryError::InvariantViolation(format!(
                    "backed amount of campaign {} overflows crediting transaction {}",
                    current.campaign_id, id
                ))
            })?;

            sqlx::query("UPDATE campaigns SET backed_amount = $2, updated_at = NOW() WHERE id = $1")
                .bind(current.campaign_id)
                .bind(credited)
                .execute(&mut *db_tx)
                .await?;
            campaign_backed_amount = Some(credited);
        }

        let updated = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $2, payment_code = COALESCE(payment_code, $3), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .bind(next.as_str())
        .bind(payment_code)
        .fetch_one(&mut *db_tx)
        .await?
        .into_domain()?;

        db_tx.commit().await?;

        Ok(StatusChange {
            transaction: updated,
            previous,
            campaign_backed_amount,
        })
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    campaign_id: i64,
    user_id: i64,
    amount: i64,
    status: String,
    payment_code: Option<String>,
    payment_url: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let status = self
            .status
            .parse::<TransactionStatus>()
            .map_err(RepositoryError::InvariantViolation)?;

        Ok(Transaction {
            id: self.id,
            campaign_id: self.campaign_id,
            user_id: self.user_id,
            amount: self.amount,
            status,
            payment_code: self.payment_code,
            payment_url: self.payment_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserTransactionRow {
    #[sqlx(flatten)]
    transaction: TransactionRow,
    campaign_name: String,
    campaign_primary_image: Option<String>,
}
