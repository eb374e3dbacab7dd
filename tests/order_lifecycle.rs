//! End-to-end lifecycle scenarios against the service and the flat-file
//! store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use atelier_orders::api::dto::{
    CreateOrderRequest, NewAddressRequest, NewItemRequest, PaymentRequest, ShipmentRequest,
    UpdateOrderRequest,
};
use atelier_orders::catalog::Catalog;
use atelier_orders::domain::{AddressKind, FulfillmentStatus, OrderStatus, PaymentStatus};
use atelier_orders::error::AppError;
use atelier_orders::notify::Notifier;
use atelier_orders::service::OrderService;
use atelier_orders::store::{FileStore, ListQuery, OrderStore};

fn service(dir: &TempDir) -> (OrderService, Arc<FileStore>) {
    service_with_catalog(dir, None)
}

fn service_with_catalog(dir: &TempDir, catalog: Option<Catalog>) -> (OrderService, Arc<FileStore>) {
    let store = Arc::new(FileStore::open(dir.path().join("orders")).unwrap());
    let svc = OrderService::new(
        Arc::clone(&store) as Arc<dyn OrderStore>,
        catalog,
        Notifier::disabled(),
        Duration::minutes(30),
        "EUR",
    );
    (svc, store)
}

fn item(sku: &str, qty: u32, price: i64) -> NewItemRequest {
    NewItemRequest {
        sku: sku.into(),
        name: format!("{sku} (handmade)"),
        qty,
        price: Some(price),
        discount: None,
        tax: None,
        total: None,
        color: None,
        image: None,
    }
}

fn address() -> NewAddressRequest {
    NewAddressRequest {
        kind: AddressKind::Shipping,
        country: "DE".into(),
        city: "Berlin".into(),
        postal: "10115".into(),
        line1: "Ackerstr. 23".into(),
        line2: None,
        company: None,
    }
}

fn create_request(items: Vec<NewItemRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_name: Some("Mara Jansen".into()),
        customer_phone: Some("+49 30 1234567".into()),
        customer_email: None,
        items,
        addresses: vec![address()],
        total: None,
        currency: None,
        note: None,
        shipping_method: None,
        shipping_price: None,
    }
}

fn payment(amount: i64) -> PaymentRequest {
    PaymentRequest {
        amount,
        method: "card".into(),
    }
}

#[tokio::test]
async fn total_is_computed_from_items() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let order = svc
        .create_order(create_request(vec![
            item("MUG-01", 1, 4500),
            item("BOWL-02", 2, 6500),
        ]))
        .await
        .unwrap();
    assert_eq!(order.total, 17500);
}

#[tokio::test]
async fn created_order_round_trips_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let created = svc
        .create_order(create_request(vec![item("MUG-01", 2, 4500)]))
        .await
        .unwrap();
    let loaded = svc.get_order(created.id).await.unwrap();
    assert_eq!(loaded.number, created.number);
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.items[0].total, 9000);
    assert_eq!(loaded.addresses.len(), 1);
    assert_eq!(loaded.total, created.total);
    assert_eq!(loaded.order_status, OrderStatus::New);
    assert!(loaded.reservation_expires_at.is_some());
}

#[tokio::test]
async fn creation_with_no_items_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, store) = service(&dir);
    let err = svc.create_order(create_request(vec![])).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    // Nothing was persisted.
    let page = store
        .list(&ListQuery {
            status: None,
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn full_payment_marks_paid_and_releases_the_hold() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let order = svc
        .create_order(create_request(vec![
            item("MUG-01", 1, 4500),
            item("BOWL-02", 2, 6500),
        ]))
        .await
        .unwrap();
    svc.add_payment(order.id, payment(17500)).await.unwrap();
    let paid = svc.get_order(order.id).await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.reservation_expires_at.is_none());
}

#[tokio::test]
async fn overpayment_is_kept_and_flagged_not_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();
    svc.add_payment(order.id, payment(6000)).await.unwrap();
    let paid = svc.get_order(order.id).await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.paid_total(), 6000);
    assert!(paid.is_overpaid());
}

#[tokio::test]
async fn stale_unpaid_holds_are_expired_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, store) = service(&dir);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();

    // Age the reservation past its window.
    let mut stale = store.get(order.id).await.unwrap().unwrap();
    let version = stale.version;
    stale.reservation_expires_at = Some(Utc::now() - Duration::minutes(1));
    stale.version += 1;
    store.put(&stale, version).await.unwrap();

    assert_eq!(svc.expire_reservations().await.unwrap(), 1);
    let expired = svc.get_order(order.id).await.unwrap();
    assert_eq!(expired.order_status, OrderStatus::Cancelled);
    assert_eq!(expired.cancel_reason.as_deref(), Some("reservation expired"));
    assert!(expired.reservation_expires_at.is_none());

    // Re-running immediately finds nothing left to expire.
    assert_eq!(svc.expire_reservations().await.unwrap(), 0);
}

#[tokio::test]
async fn sweep_spares_paid_and_confirmed_orders() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, store) = service(&dir);

    let stale = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();
    let partly_paid = svc
        .create_order(create_request(vec![item("BOWL-02", 1, 6500)]))
        .await
        .unwrap();
    let confirmed = svc
        .create_order(create_request(vec![item("VASE-03", 1, 9000)]))
        .await
        .unwrap();

    for id in [stale.id, partly_paid.id, confirmed.id] {
        let mut order = store.get(id).await.unwrap().unwrap();
        let version = order.version;
        order.reservation_expires_at = Some(Utc::now() - Duration::minutes(1));
        order.version += 1;
        store.put(&order, version).await.unwrap();
    }
    svc.add_payment(partly_paid.id, payment(100)).await.unwrap();
    svc.confirm_order(confirmed.id).await.unwrap();

    assert_eq!(svc.expire_reservations().await.unwrap(), 1);
    assert_eq!(
        svc.get_order(stale.id).await.unwrap().order_status,
        OrderStatus::Cancelled
    );
    assert_eq!(
        svc.get_order(partly_paid.id).await.unwrap().order_status,
        OrderStatus::New
    );
    assert_eq!(
        svc.get_order(confirmed.id).await.unwrap().order_status,
        OrderStatus::Confirmed
    );
}

#[tokio::test]
async fn confirmed_orders_can_be_cancelled_but_not_paid_after() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();
    svc.confirm_order(order.id).await.unwrap();
    svc.cancel_order(order.id, Some("customer request".into()))
        .await
        .unwrap();
    let err = svc.add_payment(order.id, payment(4500)).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    let err = svc
        .create_shipment(order.id, ShipmentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

#[tokio::test]
async fn cancelling_twice_is_an_invalid_transition() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();
    svc.cancel_order(order.id, None).await.unwrap();
    let err = svc.cancel_order(order.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

#[tokio::test]
async fn confirm_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();
    svc.confirm_order(order.id).await.unwrap();
    let again = svc.confirm_order(order.id).await.unwrap();
    assert_eq!(again.order_status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn cancel_of_unknown_order_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let err = svc.cancel_order(Uuid::new_v4(), None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn listing_filters_by_status_and_paginates() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let mut ids = Vec::new();
    for i in 0..5 {
        let order = svc
            .create_order(create_request(vec![item("MUG-01", 1, 1000 + i)]))
            .await
            .unwrap();
        ids.push(order.id);
    }
    svc.cancel_order(ids[0], None).await.unwrap();

    let first = svc
        .list_orders(
            ListQuery {
                status: Some(OrderStatus::New),
                limit: 2,
                offset: 0,
            },
            false,
        )
        .await
        .unwrap();
    assert_eq!(first.total, 4);
    assert_eq!(first.results.len(), 2);
    assert!(first
        .results
        .iter()
        .all(|o| o.order_status == OrderStatus::New));

    let second = svc
        .list_orders(
            ListQuery {
                status: Some(OrderStatus::New),
                limit: 2,
                offset: 2,
            },
            false,
        )
        .await
        .unwrap();
    assert_eq!(second.results.len(), 2);
    assert!(second
        .results
        .iter()
        .all(|o| first.results.iter().all(|f| f.id != o.id)));

    let cancelled = svc
        .list_orders(
            ListQuery {
                status: Some(OrderStatus::Cancelled),
                limit: 10,
                offset: 0,
            },
            false,
        )
        .await
        .unwrap();
    assert_eq!(cancelled.total, 1);
    assert_eq!(cancelled.results[0].id, ids[0]);
}

#[tokio::test]
async fn listing_with_mark_viewed_clears_the_new_badge() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, store) = service(&dir);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();
    assert!(!order.viewed_by_admin);

    let page = svc
        .list_orders(
            ListQuery {
                status: None,
                limit: 10,
                offset: 0,
            },
            true,
        )
        .await
        .unwrap();
    assert!(page.results.iter().all(|o| o.viewed_by_admin));
    assert!(store
        .get(order.id)
        .await
        .unwrap()
        .unwrap()
        .viewed_by_admin);
}

#[tokio::test]
async fn concurrent_payments_are_both_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let svc = Arc::new(svc);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 10000)]))
        .await
        .unwrap();

    let a = {
        let svc = Arc::clone(&svc);
        let id = order.id;
        tokio::spawn(async move { svc.add_payment(id, payment(1000)).await })
    };
    let b = {
        let svc = Arc::clone(&svc);
        let id = order.id;
        tokio::spawn(async move { svc.add_payment(id, payment(2000)).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let paid = svc.get_order(order.id).await.unwrap();
    assert_eq!(paid.payments.len(), 2);
    assert_eq!(paid.paid_total(), 3000);
    assert_eq!(paid.payment_status, PaymentStatus::PartiallyPaid);
}

#[tokio::test]
async fn patch_updates_contact_fields_only() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();
    let patched = svc
        .update_order(
            order.id,
            UpdateOrderRequest {
                note: Some("gift wrap please".into()),
                customer_phone: Some("+31 30 7654321".into()),
                ..UpdateOrderRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(patched.note.as_deref(), Some("gift wrap please"));
    assert_eq!(patched.customer_phone.as_deref(), Some("+31 30 7654321"));
    assert_eq!(patched.order_status, OrderStatus::New);
    assert_eq!(patched.payment_status, PaymentStatus::Unpaid);
}

#[tokio::test]
async fn shipment_moves_fulfillment_to_shipped() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let order = svc
        .create_order(create_request(vec![item("MUG-01", 1, 4500)]))
        .await
        .unwrap();
    let shipped = svc
        .create_shipment(
            order.id,
            ShipmentRequest {
                carrier: Some("dhl".into()),
                service: Some("parcel".into()),
                tracking: Some("JD014600003".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(shipped.fulfillment_status, FulfillmentStatus::Shipped);
    assert_eq!(shipped.shipments.len(), 1);
    assert_eq!(shipped.shipments[0].carrier.as_deref(), Some("dhl"));
}

#[tokio::test]
async fn unknown_sku_without_price_fails_creation() {
    let dir = tempfile::tempdir().unwrap();
    let (svc, _) = service(&dir);
    let mut req = create_request(vec![item("GHOST-99", 1, 0)]);
    req.items[0].price = None;
    let err = svc.create_order(req).await.unwrap_err();
    assert!(matches!(err, AppError::UnknownSku(_)));
}

#[tokio::test]
async fn catalog_fills_missing_prices() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.json");
    std::fs::write(
        &catalog_path,
        r#"[{"sku": "MUG-01", "name": "Stoneware mug", "price": 4500, "color": "glazed blue"}]"#,
    )
    .unwrap();
    let catalog = Catalog::new(&catalog_path, std::time::Duration::from_secs(60));
    let (svc, _) = service_with_catalog(&dir, Some(catalog));

    let mut req = create_request(vec![item("MUG-01", 2, 0)]);
    req.items[0].price = None;
    let order = svc.create_order(req).await.unwrap();
    assert_eq!(order.items[0].price, 4500);
    assert_eq!(order.items[0].color.as_deref(), Some("glazed blue"));
    assert_eq!(order.total, 9000);
}
