use serde::{Deserialize, Serialize};

use crate::core::message::{new_id, now_millis, Message};

pub const DEFAULT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 30;

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub updated_at: i64,
}

impl Thread {
    pub fn new() -> Self {
        Self {
            id: new_id(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            updated_at: now_millis(),
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Replace the message list. The title is derived from the first user
    /// message only while it still holds the placeholder.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        if self.has_default_title() {
            if let Some(title) = derive_title(&messages) {
                self.title = title;
            }
        }
        self.messages = messages;
        self.updated_at = now_millis();
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

/// Title for a thread: the first user message, cut to 30 characters with an
/// ellipsis when longer. Whitespace left at the cut is dropped before the
/// ellipsis.
pub fn derive_title(messages: &[Message]) -> Option<String> {
    let first_user = messages.iter().find(|m| m.is_user())?;
    let content = first_user.content.as_str();
    match content.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => Some(format!("{}...", content[..cut].trim_end())),
        None => Some(content.to_string()),
    }
}
