//! Product catalog
//!
//! Read-only lookup used at order creation to fill in line-item names and
//! prices the client left out. The catalog file is re-read through an
//! explicit TTL cache so a running service picks up catalog edits without a
//! restart. The cache is advisory and read-mostly; it is never used for
//! order aggregates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::Amount;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub price: Amount,
    pub currency: Option<String>,
    pub color: Option<String>,
    pub image: Option<String>,
}

type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Single-slot cache with a bounded TTL and an injectable clock.
pub struct TtlCache<V> {
    ttl: Duration,
    clock: Clock,
    slot: RwLock<Option<(Instant, Arc<V>)>>,
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(Instant::now))
    }

    pub fn with_clock(ttl: Duration, clock: Clock) -> Self {
        Self {
            ttl,
            clock,
            slot: RwLock::new(None),
        }
    }

    /// Returns the cached value, or repopulates it via `load` once the TTL
    /// has lapsed. A failed load leaves the previous entry untouched.
    pub async fn get_or_load<F, E>(&self, load: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let now = (self.clock)();
        if let Some((at, value)) = self.slot.read().await.as_ref() {
            if now.duration_since(*at) < self.ttl {
                return Ok(Arc::clone(value));
            }
        }
        let mut slot = self.slot.write().await;
        // Another task may have refreshed while we waited on the lock.
        if let Some((at, value)) = slot.as_ref() {
            if now.duration_since(*at) < self.ttl {
                return Ok(Arc::clone(value));
            }
        }
        let value = Arc::new(load()?);
        *slot = Some((now, Arc::clone(&value)));
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

pub struct Catalog {
    path: PathBuf,
    cache: TtlCache<HashMap<String, Product>>,
}

impl Catalog {
    pub fn new(path: impl AsRef<Path>, ttl: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: TtlCache::new(ttl),
        }
    }

    #[cfg(test)]
    fn with_clock(path: impl AsRef<Path>, ttl: Duration, clock: Clock) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: TtlCache::with_clock(ttl, clock),
        }
    }

    pub async fn find(&self, sku: &str) -> Result<Option<Product>, CatalogError> {
        let path = self.path.clone();
        let products = self.cache.get_or_load(|| load_products(&path)).await?;
        Ok(products.get(sku).cloned())
    }
}

fn load_products(path: &Path) -> Result<HashMap<String, Product>, CatalogError> {
    let raw = std::fs::read(path)?;
    let products: Vec<Product> = serde_json::from_slice(&raw)?;
    Ok(products.into_iter().map(|p| (p.sku.clone(), p)).collect())
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog file unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog file malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}
