//! `!!`-prefixed operator commands. Commands are recognised before any
//! other routing so operators can reach the bot even while it is paused
//! or their own number sits on the ignore list.

use crate::access::{IgnoreList, ModeratorSet};
use crate::channel::Messenger;
use crate::run::registry::RunRegistry;
use crate::session::store::SessionStore;
use crate::util::{extract_all_quoted, extract_quoted, is_valid_identity};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub const PERMISSION_DENIED: &str = "You don't have permission to use this command.";
pub const INVALID_NUMBER: &str =
    "Invalid number format. Please provide only digits without any special characters.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Moderator,
    User,
}

const PUBLIC_COMMANDS: &[&str] = &["!!help", "!!commands", "!!show-menu"];

pub struct CommandHandler {
    moderators: Arc<ModeratorSet>,
    ignore: Arc<IgnoreList>,
    sessions: Arc<SessionStore>,
    runs: Arc<RunRegistry>,
    channel: Arc<dyn Messenger>,
    paused: Arc<AtomicBool>,
    admins: Vec<String>,
}

impl CommandHandler {
    pub fn new(
        moderators: Arc<ModeratorSet>,
        ignore: Arc<IgnoreList>,
        sessions: Arc<SessionStore>,
        runs: Arc<RunRegistry>,
        channel: Arc<dyn Messenger>,
        paused: Arc<AtomicBool>,
        admins: Vec<String>,
    ) -> Self {
        Self {
            moderators,
            ignore,
            sessions,
            runs,
            channel,
            paused,
            admins,
        }
    }

    pub fn role(&self, user_id: &str) -> Role {
        if self.admins.iter().any(|a| a == user_id) {
            Role::Admin
        } else if self.moderators.contains(user_id) {
            Role::Moderator
        } else {
            Role::User
        }
    }

    /// Returns `None` when `text` is not a command at all; otherwise the
    /// reply to send back to the operator.
    pub async fn handle(&self, sender: &str, text: &str) -> Option<String> {
        let trimmed = text.trim();
        let (command, rest) = match trimmed.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (trimmed, ""),
        };
        let command = command.to_lowercase();
        if !command.starts_with("!!") {
            return None;
        }

        let role = self.role(sender);
        if role == Role::User && !PUBLIC_COMMANDS.contains(&command.as_str()) {
            return Some(PERMISSION_DENIED.to_string());
        }
        info!(sender, %command, "handling operator command");

        let reply = match command.as_str() {
            "!!help" | "!!commands" | "!!show-menu" => menu_for(role),

            "!!add-mod" => match extract_quoted(rest) {
                Some(number) if is_valid_identity(&number) => {
                    self.moderators.add(&number);
                    format!("{number} is now a moderator.")
                }
                Some(_) => INVALID_NUMBER.to_string(),
                None => r#"Please specify the number to add as a moderator: !!add-mod "number"."#
                    .to_string(),
            },

            "!!remove-mod" => match extract_quoted(rest) {
                Some(number) if is_valid_identity(&number) => {
                    self.moderators.remove(&number);
                    format!("{number} is no longer a moderator.")
                }
                Some(_) => INVALID_NUMBER.to_string(),
                None => {
                    r#"Please specify the number to remove as a moderator: !!remove-mod "number"."#
                        .to_string()
                }
            },

            "!!list-mods" => {
                let mods = self.moderators.list();
                if mods.is_empty() {
                    "There are no moderators.".to_string()
                } else {
                    format!("Current moderators are: {}", mods.join(", "))
                }
            }

            "!!clear-sessions" => {
                self.sessions.clear();
                "All sessions have been cleared.".to_string()
            }

            "!!pause" => {
                self.paused.store(true, Ordering::SeqCst);
                let evicted = self.runs.clear();
                if evicted > 0 {
                    info!(evicted, "evicted active runs on pause");
                }
                "Bot has been paused.".to_string()
            }

            "!!start" => {
                self.paused.store(false, Ordering::SeqCst);
                "Bot has been started.".to_string()
            }

            "!!no-assist" => match extract_quoted(rest) {
                Some(number) if is_valid_identity(&number) => {
                    self.ignore.add(&number);
                    format!("AI assistance disabled for {number}.")
                }
                Some(_) => INVALID_NUMBER.to_string(),
                None => r#"Please use the format: !!no-assist "number""#.to_string(),
            },

            "!!ai-assist" => match extract_quoted(rest) {
                Some(number) if is_valid_identity(&number) => {
                    self.ignore.remove(&number);
                    format!("AI assistance enabled for {number}.")
                }
                Some(_) => INVALID_NUMBER.to_string(),
                None => r#"Please use the format: !!ai-assist "number""#.to_string(),
            },

            "!!respond" => {
                let quoted = extract_all_quoted(rest);
                if quoted.len() != 2 {
                    return Some(
                        r#"Please use the format: !!respond "recipient_number" "your message""#
                            .to_string(),
                    );
                }
                let (recipient, message) = (&quoted[0], &quoted[1]);
                if !is_valid_identity(recipient) {
                    return Some(INVALID_NUMBER.to_string());
                }
                match self.channel.is_registered(recipient).await {
                    Ok(true) => {}
                    Ok(false) => {
                        return Some(format!(
                            "{recipient} is not registered on the channel."
                        ));
                    }
                    Err(err) => {
                        warn!(sender, recipient, %err, "registration check failed");
                        return Some(format!("Could not deliver the message to {recipient}."));
                    }
                }
                match self.channel.send_text(recipient, message).await {
                    Ok(()) => format!("Response sent to {recipient}"),
                    Err(err) => {
                        warn!(sender, recipient, %err, "manual response delivery failed");
                        format!("Could not deliver the message to {recipient}.")
                    }
                }
            }

            _ => format!("Unknown command {command}. Use !!help to see what's available."),
        };
        Some(reply)
    }
}

fn menu_for(role: Role) -> String {
    let (title, commands): (&str, &[(&str, &str)]) = match role {
        Role::Admin | Role::Moderator => (
            "Moderator Commands",
            &[
                ("show-menu", "Display the command menu"),
                ("help", "Show available commands and their descriptions"),
                ("commands", "Show all available commands"),
                ("add-mod", "Add a new moderator"),
                ("remove-mod", "Remove an existing moderator"),
                ("list-mods", "List all moderators"),
                ("clear-sessions", "Clear all stored sessions"),
                ("pause", "Pause the bot"),
                ("start", "Start the bot"),
                ("no-assist", "Disable AI assistance for a user"),
                ("ai-assist", "Enable AI assistance for a user"),
                ("respond", "Send a response to a user"),
            ],
        ),
        Role::User => (
            "User Commands",
            &[
                ("show-menu", "Display the user command menu"),
                ("help", "Show available commands and their descriptions"),
            ],
        ),
    };
    let body = commands
        .iter()
        .map(|(cmd, desc)| format!("!!{cmd}: {desc}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{title}\n\n{body}")
}
