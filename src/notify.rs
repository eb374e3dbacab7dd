//! Order-created notifications
//!
//! Formats a human-readable order summary and delivers it to a messaging-bot
//! webhook. Strictly fire-and-forget: the dispatcher never errors past its
//! boundary, attempts delivery at most once, and treats missing credentials
//! as a silent no-op so a bare deployment runs without any bot configured.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::domain::{AddressKind, Amount, Order};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(8);
const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone, Debug)]
pub struct NotifyConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    api_base: String,
    config: Option<NotifyConfig>,
}

impl Notifier {
    pub fn new(config: Option<NotifyConfig>) -> Self {
        Self::with_api_base(config, DEFAULT_API_BASE)
    }

    pub fn with_api_base(config: Option<NotifyConfig>, api_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.into(),
            config,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Delivers the order-created summary. Returns whether the attempt
    /// succeeded; an unconfigured dispatcher counts as success.
    pub async fn order_created(&self, order: &Order) -> bool {
        let Some(config) = &self.config else {
            debug!(order = %order.number, "notifications not configured, skipping");
            return true;
        };
        let url = format!("{}/bot{}/sendMessage", self.api_base, config.bot_token);
        let body = json!({
            "chat_id": config.chat_id,
            "text": format_summary(order),
        });
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(order = %order.number, status = %resp.status(), "notification rejected");
                false
            }
            Err(err) => {
                warn!(order = %order.number, error = %err, "notification delivery failed");
                false
            }
        }
    }
}

pub fn format_summary(order: &Order) -> String {
    let mut lines = vec![format!("New order {}", order.number)];
    if let Some(name) = &order.customer_name {
        lines.push(format!("Customer: {name}"));
    }
    if let Some(phone) = &order.customer_phone {
        lines.push(format!("Phone: {phone}"));
    }
    for item in &order.items {
        lines.push(format!(
            "  {} x {} = {}",
            item.qty,
            item.name,
            format_amount(item.total, &order.currency)
        ));
    }
    lines.push(format!(
        "Total: {}",
        format_amount(order.total, &order.currency)
    ));
    if let Some(shipping) = &order.shipping_method {
        lines.push(format!("Shipping: {shipping}"));
    }
    if let Some(addr) = order
        .addresses
        .iter()
        .find(|a| a.kind == AddressKind::Shipping)
        .or(order.addresses.first())
    {
        lines.push(format!(
            "Ship to: {}, {} {}, {}",
            addr.line1, addr.postal, addr.city, addr.country
        ));
    }
    lines.join("\n")
}

fn format_amount(amount: Amount, currency: &str) -> String {
    format!("{}.{:02} {}", amount / 100, (amount % 100).abs(), currency)
}
