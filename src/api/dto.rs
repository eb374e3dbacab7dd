//! Request and response shapes
//!
//! The request side is the input contract: untyped JSON either deserializes
//! and validates into one of these, or the caller gets a field-keyed 400.
//! Status fields are deliberately absent from the patch type.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{Address, AddressKind, Amount, Order, OrderStatus};
use crate::store::Page;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<NewItemRequest>,
    #[validate(length(min = 1, message = "at least one address is required"), nested)]
    pub addresses: Vec<NewAddressRequest>,
    #[validate(range(min = 0))]
    pub total: Option<Amount>,
    pub currency: Option<String>,
    pub note: Option<String>,
    pub shipping_method: Option<String>,
    #[validate(range(min = 0))]
    pub shipping_price: Option<Amount>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewItemRequest {
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 1))]
    pub qty: u32,
    /// Unit price; resolved from the catalog when omitted.
    #[validate(range(min = 0))]
    pub price: Option<Amount>,
    #[validate(range(min = 0))]
    pub discount: Option<Amount>,
    #[validate(range(min = 0))]
    pub tax: Option<Amount>,
    pub total: Option<Amount>,
    pub color: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAddressRequest {
    #[serde(rename = "type")]
    pub kind: AddressKind,
    #[validate(length(min = 1))]
    pub country: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub postal: String,
    #[validate(length(min = 1))]
    pub line1: String,
    pub line2: Option<String>,
    pub company: Option<String>,
}

impl From<NewAddressRequest> for Address {
    fn from(req: NewAddressRequest) -> Self {
        Address {
            kind: req.kind,
            country: req.country,
            city: req.city,
            postal: req.postal,
            line1: req.line1,
            line2: req.line2,
            company: req.company,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: Amount,
    #[validate(length(min = 1, message = "method is required"))]
    pub method: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRequest {
    pub carrier: Option<String>,
    pub service: Option<String>,
    pub tracking: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// Non-lifecycle fields only. Unknown keys (including the status fields)
/// fail deserialization outright.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateOrderRequest {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub note: Option<String>,
    pub shipping_method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub mark_viewed: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub results: Vec<Order>,
    pub meta: PageMeta,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl OrderListResponse {
    pub fn empty(limit: u32, offset: u32) -> Self {
        Self {
            results: vec![],
            meta: PageMeta {
                total: 0,
                limit,
                offset,
            },
        }
    }
}

impl From<Page<Order>> for OrderListResponse {
    fn from(page: Page<Order>) -> Self {
        Self {
            results: page.results,
            meta: PageMeta {
                total: page.total,
                limit: page.limit,
                offset: page.offset,
            },
        }
    }
}
