//! The per-message pipeline that the sequencer drives: resolve a session,
//! run the inference, send the reply back over the channel.

use crate::channel::Messenger;
use crate::run::executor::RunExecutor;
use crate::sequencer::ProcessMessage;
use crate::session::lifecycle::SessionLifecycleManager;
use crate::tools::{ToolContext, ToolDispatcher};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

const APOLOGY: &str =
    "Sorry, something went wrong while handling your message. Please try again in a moment.";

pub struct MessageProcessor {
    lifecycle: SessionLifecycleManager,
    executor: RunExecutor,
    dispatcher: ToolDispatcher,
    channel: Arc<dyn Messenger>,
}

impl MessageProcessor {
    pub fn new(
        lifecycle: SessionLifecycleManager,
        executor: RunExecutor,
        dispatcher: ToolDispatcher,
        channel: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            lifecycle,
            executor,
            dispatcher,
            channel,
        }
    }

    async fn respond(&self, user_id: &str, text: &str) -> anyhow::Result<String> {
        let session_id = self.lifecycle.ensure_valid_session(user_id).await?;
        let ctx = ToolContext::new(user_id);
        let reply = self
            .executor
            .execute(&session_id, text, &self.dispatcher, &ctx)
            .await?;
        Ok(reply)
    }
}

#[async_trait]
impl ProcessMessage for MessageProcessor {
    /// Terminal failures collapse into one generic apology so the user is
    /// never left without any reply; the real cause goes to the log.
    async fn process(&self, user_id: &str, text: &str) -> anyhow::Result<()> {
        let outgoing = match self.respond(user_id, text).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(user_id, %err, "message pipeline failed");
                APOLOGY.to_string()
            }
        };

        if let Err(err) = self.channel.send_text(user_id, &outgoing).await {
            warn!(user_id, %err, "could not deliver reply");
            return Err(err.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RunStatus;
    use crate::backend::mock::{Fail, MockBackend};
    use crate::channel::{ChannelError, MediaBlob};
    use crate::run::RunPolicy;
    use crate::run::registry::RunRegistry;
    use crate::session::config_watch::ConfigWatch;
    use crate::session::store::SessionStore;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct RecordingChannel {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingChannel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Messenger for RecordingChannel {
        async fn send_text(&self, user_id: &str, text: &str) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((user_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn send_media(&self, _: &str, _: MediaBlob) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn is_registered(&self, _: &str) -> Result<bool, ChannelError> {
            Ok(true)
        }
    }

    fn processor(
        backend: Arc<MockBackend>,
        channel: Arc<RecordingChannel>,
        dir: &TempDir,
    ) -> MessageProcessor {
        let store = Arc::new(SessionStore::open(dir.path().join("sessions.json")));
        let watch = ConfigWatch::new(backend.clone(), Duration::from_secs(300));
        let lifecycle = SessionLifecycleManager::new(backend.clone(), store, watch);
        let executor = RunExecutor::new(
            backend,
            RunRegistry::new(),
            RunPolicy {
                poll_interval: Duration::from_millis(1),
                max_run_time: Duration::from_secs(5),
                max_retries: 1,
            },
        );
        MessageProcessor::new(lifecycle, executor, ToolDispatcher::new(), channel)
    }

    #[tokio::test]
    async fn delivers_the_assistant_reply() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses(vec![RunStatus::Completed]);
        let channel = RecordingChannel::new();
        let dir = TempDir::new().unwrap();
        let proc = processor(backend.clone(), channel.clone(), &dir);

        proc.process("12345678", "hello").await.unwrap();

        assert_eq!(
            channel.sent.lock().unwrap().as_slice(),
            &[("12345678".to_string(), "Hi there!".to_string())]
        );
        assert_eq!(
            backend.appended.lock().unwrap().as_slice(),
            &[("s1".to_string(), "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn failure_turns_into_one_apology() {
        let backend = Arc::new(MockBackend::new());
        // Every attempt fails terminally; retry budget of 1 is spent fast.
        backend.script_statuses(vec![RunStatus::Failed, RunStatus::Failed]);
        let channel = RecordingChannel::new();
        let dir = TempDir::new().unwrap();
        let proc = processor(backend, channel.clone(), &dir);

        proc.process("12345678", "hello").await.unwrap();

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, APOLOGY);
    }

    #[tokio::test]
    async fn session_creation_failure_still_apologizes() {
        let backend = Arc::new(MockBackend::new());
        *backend.fail_create_session.lock().unwrap() = Some(Fail::Transient);
        let channel = RecordingChannel::new();
        let dir = TempDir::new().unwrap();
        let proc = processor(backend, channel.clone(), &dir);

        proc.process("12345678", "hello").await.unwrap();

        assert_eq!(channel.sent.lock().unwrap()[0].1, APOLOGY);
    }
}
