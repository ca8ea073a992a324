//! Share payload for the revealed phrase
//!
//! The browser hands this to the native share sheet, or writes
//! `clipboard_text` to the clipboard and shows `copied_notice`.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

pub const SHARE_TITLE: &str = "D8 Creative 2026";

pub const COPIED_NOTICE: &str = "¡Copiado! Ya podés pegarlo en tus redes ✨";

/// Share payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareMessage {
    pub title: String,
    pub text: String,
    pub url: String,
    /// Text copied when no native share surface exists
    pub clipboard_text: String,
    pub copied_notice: String,
}

/// Build the share payload for `phrase` shared from `page_url`
pub fn build_share_message(phrase: &str, page_url: &str) -> ShareMessage {
    let text = format!(
        "✨ Mi deseo para este 2026 es: \"{}\" - Descubrí el tuyo en D8 Creative",
        phrase
    );
    let clipboard_text = format!("{} {}", text, page_url);

    ShareMessage {
        title: SHARE_TITLE.to_string(),
        text,
        url: page_url.to_string(),
        clipboard_text,
        copied_notice: COPIED_NOTICE.to_string(),
    }
}

/// Record a share/clipboard failure reported by the browser
///
/// Logged only; the reveal phase is unaffected.
pub fn log_share_failure(session_id: Uuid, reason: &str) {
    warn!("Share failed for session {}: {}", session_id, reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_text_embeds_phrase() {
        let message = build_share_message("Sueña en grande", "https://d8.example/regalo");
        assert_eq!(message.title, "D8 Creative 2026");
        assert_eq!(
            message.text,
            "✨ Mi deseo para este 2026 es: \"Sueña en grande\" - Descubrí el tuyo en D8 Creative"
        );
        assert_eq!(message.url, "https://d8.example/regalo");
    }

    #[test]
    fn test_clipboard_text_appends_url() {
        let message = build_share_message("Viajá más", "https://d8.example/");
        assert!(message.clipboard_text.starts_with(&message.text));
        assert!(message.clipboard_text.ends_with(" https://d8.example/"));
        assert_eq!(message.copied_notice, COPIED_NOTICE);
    }
}
