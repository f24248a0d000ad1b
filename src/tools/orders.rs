use crate::delivery::{DeliveryStore, format_order_status};
use crate::tools::{ToolContext, ToolError, ToolHandler};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const ORDER_NOT_FOUND: &str = "Order not found. Please check the order number and try again.";
const NEED_ORDER_NUMBER: &str = "Please provide your order number to check the status.";

#[derive(Debug, Deserialize)]
struct OrderStatusArgs {
    #[serde(default)]
    intent_confirmed: bool,
    #[serde(default)]
    order_number: Option<String>,
}

/// Looks an order up by tracking number and formats its status.
pub struct OrderStatusHandler {
    store: Arc<DeliveryStore>,
}

impl OrderStatusHandler {
    pub fn new(store: Arc<DeliveryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for OrderStatusHandler {
    fn name(&self) -> &'static str {
        "check_order_status"
    }

    async fn call(&self, args: &Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args: OrderStatusArgs = serde_json::from_value(args.clone())
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let order_number = match args.order_number.filter(|n| !n.trim().is_empty()) {
            Some(n) if args.intent_confirmed => n,
            _ => return Ok(NEED_ORDER_NUMBER.to_string()),
        };

        debug!(user_id = %ctx.user_id, order_number, "Order status lookup");
        match self.store.find_by_tracking_number(order_number.trim()) {
            Some(order) => Ok(format_order_status(&order)),
            None => Ok(ORDER_NOT_FOUND.to_string()),
        }
    }
}
