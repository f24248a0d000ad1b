use crate::access::IgnoreList;
use crate::channel::Messenger;
use crate::tools::{ToolContext, ToolError, ToolHandler};
use crate::util::{is_valid_identity, sanitize_for_notification};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const CONTINUE_OUTPUT: &str = "I'll continue assisting you.";

#[derive(Debug, Deserialize)]
struct EscalationArgs {
    #[serde(default)]
    intent_confirmed: bool,
    #[serde(default)]
    user_query: String,
}

/// Hands a conversation over to a human: mutes the assistant for the
/// requester and pages every configured administrator.
pub struct HumanEscalationHandler {
    channel: Arc<dyn Messenger>,
    ignore: Arc<IgnoreList>,
    admins: Vec<String>,
}

impl HumanEscalationHandler {
    pub fn new(channel: Arc<dyn Messenger>, ignore: Arc<IgnoreList>, admins: Vec<String>) -> Self {
        Self {
            channel,
            ignore,
            admins,
        }
    }

    fn notification(user_id: &str, timestamp: &str, reason: &str) -> String {
        format!(
            "🔔 *Human Representative Request*\n\
             ---------------------------\n\
             From: {user_id}\n\
             Time: {timestamp}\n\
             Reason: {reason}\n\
             Status: Awaiting response\n\
             ---------------------------\n\
             To respond, use: !!respond \"{user_id}\" \"your message\""
        )
    }
}

#[async_trait]
impl ToolHandler for HumanEscalationHandler {
    fn name(&self) -> &'static str {
        "handle_human_request"
    }

    async fn call(&self, args: &Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args: EscalationArgs = serde_json::from_value(args.clone())
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        if !args.intent_confirmed {
            return Ok(CONTINUE_OUTPUT.to_string());
        }
        if !is_valid_identity(&ctx.user_id) {
            return Err(ToolError::InvalidIdentity(ctx.user_id.clone()));
        }
        if self.admins.is_empty() {
            return Err(ToolError::NoAdministrators);
        }

        // Mute the assistant before paging; a human owns the thread now.
        self.ignore.add(&ctx.user_id);

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
        let reason = match sanitize_for_notification(&args.user_query) {
            q if q.is_empty() => "No reason provided".to_string(),
            q => q,
        };
        let message = Self::notification(&ctx.user_id, &timestamp, &reason);

        let mut notified = 0usize;
        for admin in &self.admins {
            match self.channel.send_text(admin, &message).await {
                Ok(()) => notified += 1,
                Err(e) => warn!(admin, error = %e, "Could not notify administrator"),
            }
        }
        if notified == 0 {
            return Err(ToolError::AdminsUnreachable);
        }

        info!(user_id = %ctx.user_id, notified, "Escalated to human support");
        Ok(format!(
            "I've forwarded your request to our customer service team. \
             A human representative will contact you shortly. \
             Your request has been logged at {timestamp}. Thank you for your patience."
        ))
    }
}
