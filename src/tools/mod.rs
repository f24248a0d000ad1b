pub mod escalation;
pub mod orders;

use crate::backend::{ToolCallRequest, ToolCallResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// Generic output for callbacks we cannot act on; a run must always get
/// one result per pending call or it deadlocks backend-side.
pub const FALLBACK_OUTPUT: &str = "Sorry, I couldn't process that request.";

/// Output when a handler failed internally.
pub const HANDLER_ERROR_OUTPUT: &str = "An error occurred. Please try again later.";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("invalid user identity: {0}")]
    InvalidIdentity(String),
    /// Operational misconfiguration: escalation requested but no
    /// administrators exist.
    #[error("no administrators configured")]
    NoAdministrators,
    #[error("could not reach any administrator")]
    AdminsUnreachable,
    #[error("handler failed: {0}")]
    Internal(String),
}

/// Per-call context: the identity of the user whose run triggered the
/// callback.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub user_id: String,
}

impl ToolContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn call(&self, args: &Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// Maps callback names onto local handlers. Dispatch is total: unknown
/// names and handler failures both come back as output text, never as an
/// error, so every call id gets an answer.
pub struct ToolDispatcher {
    handlers: HashMap<&'static str, Arc<dyn ToolHandler>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.insert(handler.name(), handler);
        self
    }

    pub async fn dispatch(&self, call: &ToolCallRequest, ctx: &ToolContext) -> ToolCallResult {
        let output = match self.handlers.get(call.name.as_str()) {
            None => {
                warn!(name = %call.name, "Unknown callback name");
                FALLBACK_OUTPUT.to_string()
            }
            Some(handler) => match handler.call(&call.arguments, ctx).await {
                Ok(output) => output,
                Err(ToolError::NoAdministrators) => {
                    // Loud: this is operational misconfiguration, not a
                    // user mistake.
                    error!(
                        name = %call.name,
                        "Escalation requested but no administrators are configured"
                    );
                    HANDLER_ERROR_OUTPUT.to_string()
                }
                Err(e) => {
                    warn!(name = %call.name, error = %e, "Callback handler failed");
                    HANDLER_ERROR_OUTPUT.to_string()
                }
            },
        };
        ToolCallResult {
            call_id: call.call_id.clone(),
            output,
        }
    }

    /// Answers every pending call of a `requires_action` poll, preserving
    /// the call-id set.
    pub async fn dispatch_all(
        &self,
        calls: &[ToolCallRequest],
        ctx: &ToolContext,
    ) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.dispatch(call, ctx).await);
        }
        results
    }
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
