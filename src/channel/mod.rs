pub mod console;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("recipient {0} is not registered on the channel")]
    NotRegistered(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Outbound media payload; the channel decides how to render it.
#[derive(Debug, Clone)]
pub struct MediaBlob {
    pub mime: String,
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// The messaging channel seam. The engine never retries sends itself;
/// a failed delivery surfaces as `ChannelError` and is handled by the
/// caller's policy.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, user_id: &str, text: &str) -> Result<(), ChannelError>;
    async fn send_media(&self, user_id: &str, media: MediaBlob) -> Result<(), ChannelError>;
    async fn is_registered(&self, user_id: &str) -> Result<bool, ChannelError>;
}
