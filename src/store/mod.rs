//! Order storage
//!
//! The service treats the backend as an opaque record store: `get`, `list`,
//! wholesale `put` guarded by an optimistic version check, and a bulk
//! viewed-flag update. Partial mutation never happens at this layer.

mod file;
mod postgres;

pub use file::FileStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored aggregate moved since it was read; the caller should
    /// re-read and re-apply.
    #[error("version conflict on order {0}")]
    VersionConflict(Uuid),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Clone, Debug)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Filtered, offset-paginated listing, newest first. The sort is stable
    /// (`created_at` descending, id as tie-break) so pages do not shear.
    async fn list(&self, query: &ListQuery) -> Result<Page<Order>, StoreError>;

    /// Wholesale upsert. `expected_version` is the version the caller read
    /// (0 for a fresh insert); a mismatch fails with
    /// [`StoreError::VersionConflict`] and writes nothing.
    async fn put(&self, order: &Order, expected_version: u64) -> Result<(), StoreError>;

    /// Bulk-set `viewed_by_admin`, bumping each order's version.
    async fn mark_viewed(&self, ids: &[Uuid]) -> Result<(), StoreError>;
}
