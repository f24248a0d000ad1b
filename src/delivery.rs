use crate::store::JsonStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Operator-facing order id, short enough to read back over chat.
fn new_order_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", &uuid[..12])
}

/// Canonical order states; free-text carrier updates are normalised onto
/// these before display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    DhlWarehouse,
    InTransit,
    BuffaloWarehouse,
    Delivered,
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    /// Accepts the spelling variants that show up in hand-edited order
    /// files ("DHL warehouse", "in transit", "arrived in buffalo", ...).
    pub fn normalize(raw: &str) -> Self {
        let cleaned: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect();
        match cleaned.as_str() {
            "" | "processing" => OrderStatus::Processing,
            "dhl" | "dhlwarehouse" | "dhlware" => OrderStatus::DhlWarehouse,
            "intransit" => OrderStatus::InTransit,
            "buffalo" | "buffalowarehouse" | "buffaloware" | "arrivedinbuffalo"
            | "arrivedinbuffalowarehouse" => OrderStatus::BuffaloWarehouse,
            "delivered" => OrderStatus::Delivered,
            _ => OrderStatus::Other(raw.trim().to_lowercase()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            OrderStatus::Processing => "Processing".into(),
            OrderStatus::DhlWarehouse => "DHL Warehouse".into(),
            OrderStatus::InTransit => "In Transit".into(),
            OrderStatus::BuffaloWarehouse => "Arrived in Buffalo Warehouse".into(),
            OrderStatus::Delivered => "Delivered".into(),
            OrderStatus::Other(raw) => raw.to_uppercase(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_number: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub estimated_delivery: Option<String>,
    #[serde(default)]
    pub current_location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DeliveryData {
    orders: Vec<Order>,
}

/// Flat JSON order snapshot, reloaded on demand so operator edits to the
/// file are picked up without a restart.
#[derive(Debug)]
pub struct DeliveryStore {
    inner: JsonStore<DeliveryData>,
}

impl DeliveryStore {
    pub fn open(path: PathBuf) -> Self {
        let store = Self {
            inner: JsonStore::open(path),
        };
        info!(count = store.inner.read().orders.len(), "Loaded orders");
        store
    }

    pub fn add_order(&self, mut order: Order) -> Order {
        if order.id.is_empty() {
            order.id = new_order_id();
        }
        order.status = OrderStatus::normalize(&order.status).display_key();
        self.inner.update(|data| {
            data.orders.push(order.clone());
        });
        order
    }

    pub fn find_by_tracking_number(&self, tracking: &str) -> Option<Order> {
        self.inner
            .read()
            .orders
            .into_iter()
            .find(|o| o.tracking_number.as_deref() == Some(tracking))
    }

    pub fn find_by_id(&self, order_id: &str) -> Option<Order> {
        self.inner
            .read()
            .orders
            .into_iter()
            .find(|o| o.id == order_id)
    }

    pub fn orders_for_customer(&self, customer_number: &str) -> Vec<Order> {
        self.inner
            .read()
            .orders
            .into_iter()
            .filter(|o| o.customer_number == customer_number)
            .collect()
    }
}

impl OrderStatus {
    /// Snake-case key used in the snapshot file.
    fn display_key(&self) -> String {
        match self {
            OrderStatus::Other(raw) => raw.clone(),
            other => serde_json::to_value(other)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "processing".into()),
        }
    }
}

/// Human-readable status block sent back through the channel.
pub fn format_order_status(order: &Order) -> String {
    let status = OrderStatus::normalize(&order.status);
    let mut lines = vec![
        format!("🚚 *Order Status: {}*", order.id),
        "---------------------------".to_string(),
        format!(
            "Name: {}",
            order.customer_name.as_deref().unwrap_or("Not specified")
        ),
        format!("Status: {}", status.display()),
        format!(
            "Current Location: {}",
            order.current_location.as_deref().unwrap_or("Processing")
        ),
    ];
    if let Some(eta) = &order.estimated_delivery {
        lines.push(format!("Estimated Delivery: {eta}"));
    }
    if let Some(tracking) = &order.tracking_number {
        lines.push(format!("Tracking Number: {tracking}"));
    }
    if !order.details.is_empty() {
        lines.push(String::new());
        lines.push(format!("Details: {}", order.details));
    }
    lines.push("---------------------------".to_string());
    lines.push(format!(
        "Last Updated: {}",
        order.updated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    lines.join("\n")
}
