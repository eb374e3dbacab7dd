//! Order aggregate
//!
//! The aggregate root of the storefront: items, addresses, payments and
//! shipments are embedded and persisted as one unit. All lifecycle
//! transitions go through the methods below; the service layer never pokes
//! status fields directly.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Amounts are integer minor units (cents). Keeps money paths float-free.
pub type Amount = i64;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    /// Human-facing order number, distinct from `id`.
    pub number: String,
    /// Optimistic concurrency token, incremented on every store write.
    pub version: u64,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub items: Vec<OrderItem>,
    pub addresses: Vec<Address>,
    pub total: Amount,
    pub currency: String,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub payments: Vec<Payment>,
    pub shipments: Vec<Shipment>,
    pub shipping_method: Option<String>,
    pub shipping_price: Amount,
    pub note: Option<String>,
    pub cancel_reason: Option<String>,
    pub viewed_by_admin: bool,
    /// Present only while the order is an unpaid hold; the expiry sweep
    /// cancels the order once this passes.
    pub reservation_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub sku: String,
    pub name: String,
    pub qty: u32,
    pub price: Amount,
    pub discount: Amount,
    pub tax: Amount,
    pub total: Amount,
    pub color: Option<String>,
    pub image: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Amount {
        self.qty as Amount * self.price - self.discount + self.tax
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(rename = "type")]
    pub kind: AddressKind,
    pub country: String,
    pub city: String,
    pub postal: String,
    pub line1: String,
    pub line2: Option<String>,
    pub company: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Shipping,
    Billing,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub amount: Amount,
    pub method: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub carrier: Option<String>,
    pub service: Option<String>,
    pub tracking: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    New,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    PartiallyPaid,
    Paid,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    Shipped,
}

/// Pre-resolved creation input. Item line totals must already be filled in.
#[derive(Clone, Debug, Default)]
pub struct NewOrder {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub items: Vec<OrderItem>,
    pub addresses: Vec<Address>,
    pub total: Option<Amount>,
    pub currency: Option<String>,
    pub note: Option<String>,
    pub shipping_method: Option<String>,
    pub shipping_price: Option<Amount>,
}

impl Order {
    pub fn create(draft: NewOrder, default_currency: &str, reservation_window: Duration) -> Self {
        let now = Utc::now();
        let shipping_price = draft.shipping_price.unwrap_or(0);
        let total = draft.total.unwrap_or_else(|| {
            draft.items.iter().map(OrderItem::line_total).sum::<Amount>() + shipping_price
        });
        Self {
            id: Uuid::now_v7(),
            number: next_order_number(now),
            version: 1,
            customer_name: draft.customer_name,
            customer_phone: draft.customer_phone,
            customer_email: draft.customer_email,
            items: draft.items,
            addresses: draft.addresses,
            total,
            currency: draft.currency.unwrap_or_else(|| default_currency.to_string()),
            order_status: OrderStatus::New,
            payment_status: PaymentStatus::Unpaid,
            fulfillment_status: FulfillmentStatus::Pending,
            payments: vec![],
            shipments: vec![],
            shipping_method: draft.shipping_method,
            shipping_price,
            note: draft.note,
            cancel_reason: None,
            viewed_by_admin: false,
            reservation_expires_at: Some(now + reservation_window),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn paid_total(&self) -> Amount {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn is_overpaid(&self) -> bool {
        self.paid_total() > self.total
    }

    /// `new → confirmed`. No-op success when already confirmed.
    pub fn confirm(&mut self) -> Result<(), TransitionError> {
        match self.order_status {
            OrderStatus::Cancelled => Err(TransitionError::Cancelled(self.id)),
            OrderStatus::Confirmed => Ok(()),
            OrderStatus::New => {
                self.order_status = OrderStatus::Confirmed;
                self.reservation_expires_at = None;
                self.touch();
                Ok(())
            }
        }
    }

    /// `new|confirmed → cancelled`. Cancelling twice is an error.
    pub fn cancel(&mut self, reason: Option<String>) -> Result<(), TransitionError> {
        if self.order_status == OrderStatus::Cancelled {
            return Err(TransitionError::AlreadyCancelled(self.id));
        }
        self.order_status = OrderStatus::Cancelled;
        self.cancel_reason = reason;
        self.reservation_expires_at = None;
        self.touch();
        Ok(())
    }

    /// Appends a payment and recomputes the payment sub-state. A paid order
    /// is never auto-expired, so the reservation hold is released here.
    pub fn record_payment(&mut self, amount: Amount, method: String) -> Result<(), TransitionError> {
        if self.order_status == OrderStatus::Cancelled {
            return Err(TransitionError::Cancelled(self.id));
        }
        self.payments.push(Payment {
            amount,
            method,
            recorded_at: Utc::now(),
        });
        let paid = self.paid_total();
        self.payment_status = if paid >= self.total {
            PaymentStatus::Paid
        } else if paid > 0 {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Unpaid
        };
        self.reservation_expires_at = None;
        self.touch();
        Ok(())
    }

    pub fn add_shipment(&mut self, shipment: Shipment) -> Result<(), TransitionError> {
        if self.order_status == OrderStatus::Cancelled {
            return Err(TransitionError::Cancelled(self.id));
        }
        self.shipments.push(shipment);
        self.fulfillment_status = FulfillmentStatus::Shipped;
        self.touch();
        Ok(())
    }

    /// Whether the expiry sweep should cancel this order at `now`.
    pub fn is_expirable(&self, now: DateTime<Utc>) -> bool {
        self.order_status == OrderStatus::New
            && self.payment_status == PaymentStatus::Unpaid
            && self.reservation_expires_at.is_some_and(|at| at <= now)
    }

    pub fn expire(&mut self) -> Result<(), TransitionError> {
        self.cancel(Some("reservation expired".to_string()))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn next_order_number(now: DateTime<Utc>) -> String {
    format!(
        "A-{}-{:04}",
        now.timestamp(),
        rand::thread_rng().gen_range(0..10_000)
    )
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("order {0} is cancelled")]
    Cancelled(Uuid),
    #[error("order {0} is already cancelled")]
    AlreadyCancelled(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str, qty: u32, price: Amount) -> OrderItem {
        let mut item = OrderItem {
            sku: sku.into(),
            name: sku.into(),
            qty,
            price,
            discount: 0,
            tax: 0,
            total: 0,
            color: None,
            image: None,
        };
        item.total = item.line_total();
        item
    }

    fn address() -> Address {
        Address {
            kind: AddressKind::Shipping,
            country: "DE".into(),
            city: "Berlin".into(),
            postal: "10115".into(),
            line1: "Ackerstr. 23".into(),
            line2: None,
            company: None,
        }
    }

    fn draft(items: Vec<OrderItem>) -> NewOrder {
        NewOrder {
            items,
            addresses: vec![address()],
            ..NewOrder::default()
        }
    }

    #[test]
    fn test_total_computed_from_items() {
        let order = Order::create(
            draft(vec![item("MUG-01", 1, 4500), item("BOWL-02", 2, 6500)]),
            "EUR",
            Duration::minutes(30),
        );
        assert_eq!(order.total, 17500);
        assert_eq!(order.order_status, OrderStatus::New);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert!(order.reservation_expires_at.is_some());
    }

    #[test]
    fn test_explicit_total_wins() {
        let mut d = draft(vec![item("MUG-01", 1, 4500)]);
        d.total = Some(4000);
        let order = Order::create(d, "EUR", Duration::minutes(30));
        assert_eq!(order.total, 4000);
    }

    #[test]
    fn test_payment_drives_sub_state() {
        let mut order = Order::create(
            draft(vec![item("MUG-01", 1, 10000)]),
            "EUR",
            Duration::minutes(30),
        );
        order.record_payment(4000, "card".into()).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::PartiallyPaid);
        assert!(order.reservation_expires_at.is_none());
        order.record_payment(6000, "card".into()).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(!order.is_overpaid());
        order.record_payment(500, "cash".into()).unwrap();
        assert!(order.is_overpaid());
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let mut order = Order::create(
            draft(vec![item("MUG-01", 1, 4500)]),
            "EUR",
            Duration::minutes(30),
        );
        order.confirm().unwrap();
        assert_eq!(order.order_status, OrderStatus::Confirmed);
        assert!(order.reservation_expires_at.is_none());
        order.confirm().unwrap();
        assert_eq!(order.order_status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut order = Order::create(
            draft(vec![item("MUG-01", 1, 4500)]),
            "EUR",
            Duration::minutes(30),
        );
        order.confirm().unwrap();
        order.cancel(Some("changed mind".into())).unwrap();
        assert_eq!(order.order_status, OrderStatus::Cancelled);
        assert!(matches!(
            order.confirm(),
            Err(TransitionError::Cancelled(_))
        ));
        assert!(matches!(
            order.record_payment(100, "cash".into()),
            Err(TransitionError::Cancelled(_))
        ));
        assert!(matches!(
            order.cancel(None),
            Err(TransitionError::AlreadyCancelled(_))
        ));
    }

    #[test]
    fn test_expirable_predicate() {
        let mut order = Order::create(
            draft(vec![item("MUG-01", 1, 4500)]),
            "EUR",
            Duration::minutes(30),
        );
        let now = Utc::now();
        assert!(!order.is_expirable(now));
        order.reservation_expires_at = Some(now - Duration::minutes(1));
        assert!(order.is_expirable(now));
        order.record_payment(100, "cash".into()).unwrap();
        assert!(!order.is_expirable(now));
    }

    #[test]
    fn test_shipment_sets_fulfillment() {
        let mut order = Order::create(
            draft(vec![item("MUG-01", 1, 4500)]),
            "EUR",
            Duration::minutes(30),
        );
        order
            .add_shipment(Shipment {
                carrier: Some("dhl".into()),
                service: None,
                tracking: Some("JD014600003".into()),
                created_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(order.fulfillment_status, FulfillmentStatus::Shipped);
    }
}
