//! Order lifecycle service
//!
//! Every mutation is a read-modify-write of the whole aggregate finished by
//! a single versioned `put`; a conflicting concurrent writer makes the put
//! fail and the mutation is re-applied against a fresh read. Validation
//! happens before any state is touched.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api::dto::{
    CreateOrderRequest, NewItemRequest, PaymentRequest, ShipmentRequest, UpdateOrderRequest,
};
use crate::catalog::Catalog;
use crate::domain::{NewOrder, Order, OrderItem, OrderStatus, Shipment, TransitionError};
use crate::error::AppError;
use crate::notify::Notifier;
use crate::store::{ListQuery, OrderStore, Page, StoreError};

/// Re-reads before giving up on a contended write.
const PUT_RETRIES: u32 = 3;
const SWEEP_PAGE: u32 = 200;

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    catalog: Option<Catalog>,
    notifier: Notifier,
    reservation_window: Duration,
    default_currency: String,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Option<Catalog>,
        notifier: Notifier,
        reservation_window: Duration,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            reservation_window,
            default_currency: default_currency.into(),
        }
    }

    pub async fn create_order(&self, payload: CreateOrderRequest) -> Result<Order, AppError> {
        payload.validate()?;
        let mut items = Vec::with_capacity(payload.items.len());
        for item in payload.items {
            items.push(self.resolve_item(item).await?);
        }
        let order = Order::create(
            NewOrder {
                customer_name: payload.customer_name,
                customer_phone: payload.customer_phone,
                customer_email: payload.customer_email,
                items,
                addresses: payload.addresses.into_iter().map(Into::into).collect(),
                total: payload.total,
                currency: payload.currency,
                note: payload.note,
                shipping_method: payload.shipping_method,
                shipping_price: payload.shipping_price,
            },
            &self.default_currency,
            self.reservation_window,
        );
        self.store.put(&order, 0).await?;
        info!(order = %order.number, total = order.total, "order created");

        // Best-effort, decoupled from the response: the dispatcher logs and
        // swallows its own failures, one attempt per order.
        let notifier = self.notifier.clone();
        let snapshot = order.clone();
        tokio::spawn(async move {
            notifier.order_created(&snapshot).await;
        });

        Ok(order)
    }

    /// Fills price and display fields from the catalog when the client left
    /// them out. Client-supplied values always win.
    async fn resolve_item(&self, item: NewItemRequest) -> Result<OrderItem, AppError> {
        let hit = if item.price.is_none() || item.color.is_none() || item.image.is_none() {
            match &self.catalog {
                Some(catalog) => catalog.find(&item.sku).await?,
                None => None,
            }
        } else {
            None
        };
        let price = match item.price.or_else(|| hit.as_ref().map(|p| p.price)) {
            Some(price) => price,
            None => return Err(AppError::UnknownSku(item.sku)),
        };
        let mut resolved = OrderItem {
            sku: item.sku,
            name: item.name,
            qty: item.qty,
            price,
            discount: item.discount.unwrap_or(0),
            tax: item.tax.unwrap_or(0),
            total: 0,
            color: item.color.or_else(|| hit.as_ref().and_then(|p| p.color.clone())),
            image: item.image.or_else(|| hit.and_then(|p| p.image)),
        };
        let line_total = resolved.line_total();
        resolved.total = item.total.unwrap_or(line_total);
        Ok(resolved)
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, AppError> {
        self.store.get(id).await?.ok_or(AppError::NotFound(id))
    }

    pub async fn list_orders(
        &self,
        query: ListQuery,
        mark_viewed: bool,
    ) -> Result<Page<Order>, AppError> {
        let mut page = self.store.list(&query).await?;
        if mark_viewed {
            let unseen: Vec<Uuid> = page
                .results
                .iter()
                .filter(|o| !o.viewed_by_admin)
                .map(|o| o.id)
                .collect();
            if !unseen.is_empty() {
                self.store.mark_viewed(&unseen).await?;
                for order in &mut page.results {
                    if unseen.contains(&order.id) {
                        order.viewed_by_admin = true;
                        order.version += 1;
                    }
                }
            }
        }
        Ok(page)
    }

    pub async fn confirm_order(&self, id: Uuid) -> Result<Order, AppError> {
        let order = self.with_order(id, |o| o.confirm()).await?;
        info!(order = %order.number, "order confirmed");
        Ok(order)
    }

    pub async fn cancel_order(&self, id: Uuid, reason: Option<String>) -> Result<Order, AppError> {
        let order = self.with_order(id, |o| o.cancel(reason.clone())).await?;
        info!(order = %order.number, "order cancelled");
        Ok(order)
    }

    pub async fn add_payment(&self, id: Uuid, payload: PaymentRequest) -> Result<Order, AppError> {
        payload.validate()?;
        let order = self
            .with_order(id, |o| {
                o.record_payment(payload.amount, payload.method.clone())
            })
            .await?;
        if order.is_overpaid() {
            warn!(
                order = %order.number,
                paid = order.paid_total(),
                total = order.total,
                "order overpaid"
            );
        }
        info!(order = %order.number, amount = payload.amount, "payment recorded");
        Ok(order)
    }

    pub async fn create_shipment(
        &self,
        id: Uuid,
        payload: ShipmentRequest,
    ) -> Result<Order, AppError> {
        let shipment = Shipment {
            carrier: payload.carrier,
            service: payload.service,
            tracking: payload.tracking,
            created_at: Utc::now(),
        };
        let order = self
            .with_order(id, |o| o.add_shipment(shipment.clone()))
            .await?;
        info!(order = %order.number, "shipment created");
        Ok(order)
    }

    /// Generic patch for non-lifecycle fields. Status fields are not part of
    /// the patch type, so they cannot be written through this path.
    pub async fn update_order(
        &self,
        id: Uuid,
        patch: UpdateOrderRequest,
    ) -> Result<Order, AppError> {
        self.with_order(id, |order| {
            if let Some(name) = &patch.customer_name {
                order.customer_name = Some(name.clone());
            }
            if let Some(phone) = &patch.customer_phone {
                order.customer_phone = Some(phone.clone());
            }
            if let Some(email) = &patch.customer_email {
                order.customer_email = Some(email.clone());
            }
            if let Some(note) = &patch.note {
                order.note = Some(note.clone());
            }
            if let Some(method) = &patch.shipping_method {
                order.shipping_method = Some(method.clone());
            }
            Ok(())
        })
        .await
    }

    /// Cancels every stale unpaid hold. Safe to re-run and to race with
    /// itself: candidates are re-checked under the versioned write, so a
    /// hold is only ever counted once.
    pub async fn expire_reservations(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut candidates = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .store
                .list(&ListQuery {
                    status: Some(OrderStatus::New),
                    limit: SWEEP_PAGE,
                    offset,
                })
                .await?;
            let fetched = page.results.len() as u32;
            candidates.extend(
                page.results
                    .into_iter()
                    .filter(|o| o.is_expirable(now))
                    .map(|o| o.id),
            );
            if fetched < SWEEP_PAGE {
                break;
            }
            offset += SWEEP_PAGE;
        }

        let mut expired = 0;
        for id in candidates {
            match self.try_expire(id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(order = %id, error = %err, "expiry failed, left for the next sweep")
                }
            }
        }
        if expired > 0 {
            info!(count = expired, "expired stale reservations");
        }
        Ok(expired)
    }

    async fn try_expire(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        for _ in 0..PUT_RETRIES {
            let Some(mut order) = self.store.get(id).await? else {
                return Ok(false);
            };
            // A payment or confirmation may have landed since the scan.
            if !order.is_expirable(now) {
                return Ok(false);
            }
            let expected = order.version;
            order.expire()?;
            order.version = expected + 1;
            match self.store.put(&order, expected).await {
                Ok(()) => return Ok(true),
                Err(StoreError::VersionConflict(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(false)
    }

    async fn with_order<F>(&self, id: Uuid, mut apply: F) -> Result<Order, AppError>
    where
        F: FnMut(&mut Order) -> Result<(), TransitionError>,
    {
        let mut attempt = 0;
        loop {
            let mut order = self.store.get(id).await?.ok_or(AppError::NotFound(id))?;
            let expected = order.version;
            apply(&mut order)?;
            order.version = expected + 1;
            match self.store.put(&order, expected).await {
                Ok(()) => return Ok(order),
                Err(StoreError::VersionConflict(_)) if attempt + 1 < PUT_RETRIES => {
                    attempt += 1;
                    debug!(order = %id, attempt, "write conflict, re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
