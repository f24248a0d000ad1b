use once_cell::sync::Lazy;
use regex::Regex;

static DIGITS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));

/// Minimum digit count for a canonical user identity; anything shorter is
/// missing its country code and cannot be addressed on the channel.
const MIN_IDENTITY_LEN: usize = 8;

/// System sender ids the channel emits that never belong to a real user.
const SYSTEM_SENDERS: &[&str] = &["status", "status@broadcast"];

/// Strips everything but digits (a leading `+` is tolerated and dropped).
pub fn canonicalize_identity(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// True for the channel's own broadcast/status senders.
pub fn is_system_sender(sender: &str) -> bool {
    SYSTEM_SENDERS.contains(&sender)
}

/// A usable user identity: digits only, long enough to carry a country
/// code, and not one of the channel's system senders.
pub fn is_valid_identity(id: &str) -> bool {
    !SYSTEM_SENDERS.contains(&id) && DIGITS_ONLY.is_match(id) && id.len() >= MIN_IDENTITY_LEN
}

/// First `"quoted"` segment of `text`, if any.
pub fn extract_quoted(text: &str) -> Option<String> {
    QUOTED.captures(text).map(|c| c[1].to_string())
}

/// Every `"quoted"` segment of `text`, in order.
pub fn extract_all_quoted(text: &str) -> Vec<String> {
    QUOTED
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Removes angle brackets and trims; used before echoing user text into
/// notifications.
pub fn sanitize_for_notification(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string()
}
