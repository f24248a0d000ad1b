//! Inbound routing. One decision tree per message: operator commands are
//! answered first (even while paused or ignored), then system senders,
//! malformed identities, paused mode, and ignored users are filtered out,
//! and whatever is left enters the user's sequencer queue.

use crate::access::IgnoreList;
use crate::channel::Messenger;
use crate::command::CommandHandler;
use crate::sequencer::UserSequencer;
use crate::util::{canonicalize_identity, is_system_sender, is_valid_identity};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

pub struct InboundGateway {
    commands: CommandHandler,
    ignore: Arc<IgnoreList>,
    sequencer: Arc<UserSequencer>,
    channel: Arc<dyn Messenger>,
    paused: Arc<AtomicBool>,
}

impl InboundGateway {
    pub fn new(
        commands: CommandHandler,
        ignore: Arc<IgnoreList>,
        sequencer: Arc<UserSequencer>,
        channel: Arc<dyn Messenger>,
        paused: Arc<AtomicBool>,
    ) -> Self {
        Self {
            commands,
            ignore,
            sequencer,
            channel,
            paused,
        }
    }

    pub async fn handle_inbound(&self, sender: &str, text: &str) {
        if is_system_sender(sender) {
            debug!(sender, "dropping system-sender message");
            return;
        }

        let user_id = canonicalize_identity(sender);

        // Commands short-circuit everything else so operators keep control
        // of a paused or muted bot.
        if let Some(reply) = self.commands.handle(&user_id, text).await {
            if let Err(err) = self.channel.send_text(&user_id, &reply).await {
                warn!(user_id, %err, "could not deliver command reply");
            }
            return;
        }

        if !is_valid_identity(&user_id) {
            debug!(sender, "dropping message from malformed identity");
            return;
        }
        if self.paused.load(Ordering::SeqCst) {
            debug!(user_id, "bot paused, dropping message");
            return;
        }
        if self.ignore.contains(&user_id) {
            debug!(user_id, "user on ignore list, dropping message");
            return;
        }
        if text.trim().is_empty() {
            return;
        }

        self.sequencer.submit(&user_id, text);
    }
}
