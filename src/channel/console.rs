use crate::channel::{ChannelError, MediaBlob, Messenger};
use async_trait::async_trait;
use tracing::info;

/// Console-backed channel for local runs: outbound messages go to stdout,
/// every identity counts as registered.
#[derive(Debug, Default)]
pub struct ConsoleChannel;

#[async_trait]
impl Messenger for ConsoleChannel {
    async fn send_text(&self, user_id: &str, text: &str) -> Result<(), ChannelError> {
        println!("[{user_id}] {text}");
        Ok(())
    }

    async fn send_media(&self, user_id: &str, media: MediaBlob) -> Result<(), ChannelError> {
        info!(user_id, mime = %media.mime, bytes = media.bytes.len(), "Dropping media on console channel");
        println!("[{user_id}] <media {} ({} bytes)>", media.filename, media.bytes.len());
        Ok(())
    }

    async fn is_registered(&self, _user_id: &str) -> Result<bool, ChannelError> {
        Ok(true)
    }
}
