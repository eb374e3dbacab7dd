//! Postgres order store
//!
//! Mirrors the aggregate into a single `orders` table: the full document as
//! JSONB plus the columns the list queries filter and sort on. The version
//! guard rides on the upsert's `WHERE` clause, so a stale write updates
//! zero rows instead of clobbering a concurrent one.

use sqlx::PgPool;
use uuid::Uuid;

use super::{ListQuery, OrderStore, Page, StoreError};
use crate::domain::Order;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let doc: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT doc FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        doc.map(serde_json::from_value).transpose().map_err(Into::into)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Order>, StoreError> {
        let status = query.status.map(|s| s.as_str());
        let docs: Vec<serde_json::Value> = sqlx::query_scalar(
            "SELECT doc FROM orders WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
        )
        .bind(status)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await?;
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
                .bind(status)
                .fetch_one(&self.pool)
                .await?;
        let results = docs
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Order>, _>>()?;
        Ok(Page {
            results,
            total: total as u64,
            limit: query.limit,
            offset: query.offset,
        })
    }

    async fn put(&self, order: &Order, expected_version: u64) -> Result<(), StoreError> {
        let doc = serde_json::to_value(order)?;
        let result = sqlx::query(
            "INSERT INTO orders (id, number, status, viewed, version, doc, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                 status = EXCLUDED.status, viewed = EXCLUDED.viewed, \
                 version = EXCLUDED.version, doc = EXCLUDED.doc, \
                 updated_at = EXCLUDED.updated_at \
             WHERE orders.version = $9",
        )
        .bind(order.id)
        .bind(&order.number)
        .bind(order.order_status.as_str())
        .bind(order.viewed_by_admin)
        .bind(order.version as i64)
        .bind(doc)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict(order.id));
        }
        Ok(())
    }

    async fn mark_viewed(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE orders SET viewed = TRUE, version = version + 1, \
                 doc = jsonb_set(jsonb_set(doc, '{viewedByAdmin}', 'true'::jsonb), \
                                 '{version}', to_jsonb(version + 1)) \
             WHERE id = ANY($1) AND NOT viewed",
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
