//! Completed checkout records.
//!
//! Every checkout that unlocks downloads writes one row, whether it went
//! through the payment gateway or was free. Video purchases additionally track
//! the render lifecycle on the same row.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::RwLock;
use tracing::instrument;

use styleswap_core::{
    CurrencyCode, Email, PaymentStatus, RenderStatus, TransactionId, VideoOptions,
};

use super::RepositoryError;

/// One purchased item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    /// Cart line ID, or `video` for a render purchase.
    pub id: String,
    pub description: String,
    pub unit_price: Decimal,
    /// Options paid for, on a video purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_options: Option<VideoOptions>,
}

/// A recorded checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Gateway payment ID, or a synthetic `free_*` / `coupon_free_*` reference.
    pub payment_id: TransactionId,
    pub user_email: Option<Email>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub items: Vec<TransactionItem>,
    pub status: PaymentStatus,
    /// Only set for video purchases.
    pub render_status: Option<RenderStatus>,
    /// Rendered video URL once the render completes.
    pub artifact_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Last change, including render progress.
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether a render marked `rendering` has gone unchanged for longer than
    /// `budget`, meaning the task driving it is gone.
    #[must_use]
    pub fn render_stalled(&self, budget: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.render_status == Some(RenderStatus::Rendering) && now - self.updated_at > budget
    }
}

/// Transaction persistence.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Record a completed checkout.
    ///
    /// Returns `RepositoryError::Conflict` if the payment ID was already recorded.
    async fn insert(&self, record: &TransactionRecord) -> Result<(), RepositoryError>;

    async fn get(&self, payment_id: &TransactionId)
    -> Result<Option<TransactionRecord>, RepositoryError>;

    /// Update the render lifecycle of a video purchase.
    async fn update_render(
        &self,
        payment_id: &TransactionId,
        status: RenderStatus,
        artifact_url: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Most recent transactions first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<TransactionRecord>, RepositoryError>;
}

/// `PostgreSQL`-backed transaction store.
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    payment_id: String,
    user_email: Option<String>,
    amount: Decimal,
    currency: String,
    items: Json<Vec<TransactionItem>>,
    status: PaymentStatus,
    render_status: Option<RenderStatus>,
    artifact_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let user_email = row
            .user_email
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))?;
        let currency = row
            .currency
            .parse::<CurrencyCode>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            payment_id: TransactionId::new(row.payment_id),
            user_email,
            amount: row.amount,
            currency,
            items: row.items.0,
            status: row.status,
            render_status: row.render_status,
            artifact_url: row.artifact_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT payment_id, user_email, amount, currency, items, status, \
                              render_status, artifact_url, created_at, updated_at FROM transactions";

#[async_trait]
impl TransactionStore for PgTransactionStore {
    #[instrument(skip(self, record), fields(payment_id = %record.payment_id))]
    async fn insert(&self, record: &TransactionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO transactions
                (payment_id, user_email, amount, currency, items, status, render_status, artifact_url,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(&record.payment_id)
        .bind(record.user_email.as_ref().map(Email::as_str))
        .bind(record.amount)
        .bind(record.currency.code())
        .bind(Json(&record.items))
        .bind(record.status)
        .bind(record.render_status)
        .bind(record.artifact_url.as_deref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("payment already recorded".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(
        &self,
        payment_id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, RepositoryError> {
        let row: Option<TransactionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE payment_id = $1"))
                .bind(payment_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TransactionRecord::try_from).transpose()
    }

    #[instrument(skip(self, artifact_url))]
    async fn update_render(
        &self,
        payment_id: &TransactionId,
        status: RenderStatus,
        artifact_url: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE transactions
            SET render_status = $2,
                artifact_url = COALESCE($3, artifact_url),
                updated_at = NOW()
            WHERE payment_id = $1
            ",
        )
        .bind(payment_id)
        .bind(status)
        .bind(artifact_url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_recent(&self, limit: i64) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let rows: Vec<TransactionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC LIMIT $1"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TransactionRecord::try_from).collect()
    }
}

/// In-memory transaction store.
#[derive(Default)]
pub struct MemoryTransactionStore {
    records: RwLock<HashMap<TransactionId, TransactionRecord>>,
}

impl MemoryTransactionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn insert(&self, record: &TransactionRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.payment_id) {
            return Err(RepositoryError::Conflict("payment already recorded".to_owned()));
        }
        records.insert(record.payment_id.clone(), record.clone());
        Ok(())
    }

    async fn get(
        &self,
        payment_id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, RepositoryError> {
        Ok(self.records.read().await.get(payment_id).cloned())
    }

    async fn update_render(
        &self,
        payment_id: &TransactionId,
        status: RenderStatus,
        artifact_url: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(payment_id).ok_or(RepositoryError::NotFound)?;
        record.render_status = Some(status);
        if let Some(url) = artifact_url {
            record.artifact_url = Some(url.to_string());
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(id: &str, created_at: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            payment_id: TransactionId::new(id),
            user_email: Email::parse("buyer@example.com").ok(),
            amount: Decimal::new(2160, 2),
            currency: CurrencyCode::INR,
            items: vec![TransactionItem {
                id: "line-1".to_string(),
                description: "Cyberpunk Neon".to_string(),
                unit_price: Decimal::from(8),
                video_options: None,
            }],
            status: PaymentStatus::Success,
            render_status: None,
            artifact_url: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_duplicate_payment_is_conflict() {
        let store = MemoryTransactionStore::new();
        let now = Utc::now();
        store.insert(&record("pay_1", now)).await.expect("insert");
        let dup = store.insert(&record("pay_1", now)).await;
        assert!(matches!(dup, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_render_updates_keep_artifact() {
        let store = MemoryTransactionStore::new();
        let id = TransactionId::new("pay_2");
        store.insert(&record("pay_2", Utc::now())).await.expect("insert");

        store
            .update_render(&id, RenderStatus::Completed, Some("https://cdn/v.mp4"))
            .await
            .expect("update");
        store
            .update_render(&id, RenderStatus::Completed, None)
            .await
            .expect("update");

        let stored = store.get(&id).await.expect("get").expect("exists");
        assert_eq!(stored.render_status, Some(RenderStatus::Completed));
        assert_eq!(stored.artifact_url.as_deref(), Some("https://cdn/v.mp4"));
    }

    #[tokio::test]
    async fn test_render_update_touches_record() {
        let store = MemoryTransactionStore::new();
        let id = TransactionId::new("pay_3");
        let created = Utc::now() - Duration::hours(2);
        store.insert(&record("pay_3", created)).await.expect("insert");

        store
            .update_render(&id, RenderStatus::Rendering, None)
            .await
            .expect("update");

        let stored = store.get(&id).await.expect("get").expect("exists");
        assert_eq!(stored.created_at, created);
        assert!(stored.updated_at > created);
        assert!(!stored.render_stalled(Duration::minutes(30), Utc::now()));
        assert!(stored.render_stalled(Duration::minutes(30), Utc::now() + Duration::hours(1)));
    }

    #[test]
    fn test_only_rendering_rows_stall() {
        let old = Utc::now() - Duration::hours(3);
        let mut rec = record("pay_4", old);
        assert!(!rec.render_stalled(Duration::minutes(1), Utc::now()));

        rec.render_status = Some(RenderStatus::Pending);
        assert!(!rec.render_stalled(Duration::minutes(1), Utc::now()));

        rec.render_status = Some(RenderStatus::Rendering);
        assert!(rec.render_stalled(Duration::minutes(1), Utc::now()));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryTransactionStore::new();
        let result = store
            .update_render(&TransactionId::new("nope"), RenderStatus::Failed, None)
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let store = MemoryTransactionStore::new();
        let now = Utc::now();
        store.insert(&record("old", now - Duration::hours(1))).await.expect("insert");
        store.insert(&record("new", now)).await.expect("insert");
        store.insert(&record("mid", now - Duration::minutes(5))).await.expect("insert");

        let ids: Vec<String> = store
            .list_recent(2)
            .await
            .expect("list")
            .into_iter()
            .map(|r| r.payment_id.to_string())
            .collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }
}
