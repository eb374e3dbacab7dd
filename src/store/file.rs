//! Flat-file order store
//!
//! One JSON document per order under the data directory, with an in-memory
//! index rebuilt at startup. Writes go through a tempfile-and-rename so a
//! crash mid-write cannot truncate an existing document. The write lock
//! spans the version check and the flush, which is what makes `put`'s
//! compare-and-swap sound.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ListQuery, OrderStore, Page, StoreError};
use crate::domain::Order;

pub struct FileStore {
    dir: PathBuf,
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl FileStore {
    /// Opens (or creates) the data directory and loads every order document.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let mut orders = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let order: Order = serde_json::from_slice(&std::fs::read(&path)?)?;
                orders.insert(order.id, order);
            }
        }
        tracing::debug!(count = orders.len(), dir = %dir.display(), "order store loaded");
        Ok(Self {
            dir,
            orders: RwLock::new(orders),
        })
    }

    fn doc_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn flush(&self, order: &Order) -> Result<(), StoreError> {
        let path = self.doc_path(order.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(order)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderStore for FileStore {
    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut matched: Vec<&Order> = orders
            .values()
            .filter(|o| query.status.map_or(true, |s| o.order_status == s))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matched.len() as u64;
        let results = matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(Page {
            results,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    async fn put(&self, order: &Order, expected_version: u64) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        let current = orders.get(&order.id).map(|o| o.version).unwrap_or(0);
        if current != expected_version {
            return Err(StoreError::VersionConflict(order.id));
        }
        self.flush(order).await?;
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn mark_viewed(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        for id in ids {
            let updated = match orders.get(id) {
                Some(order) if !order.viewed_by_admin => {
                    let mut updated = order.clone();
                    updated.viewed_by_admin = true;
                    updated.version += 1;
                    updated
                }
                _ => continue,
            };
            self.flush(&updated).await?;
            orders.insert(updated.id, updated);
        }
        Ok(())
    }
}
