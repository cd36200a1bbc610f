//! Conversation turns and their boundary representation.

use crate::provider::Message;
use serde::{Deserialize, Serialize};

/// One stored turn of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User {
        content: String,
        image_url: Option<String>,
    },
    Assistant {
        content: String,
    },
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User {
            content: content.into(),
            image_url: None,
        }
    }

    pub fn user_with_image(content: impl Into<String>, image_url: impl Into<String>) -> Self {
        Turn::User {
            content: content.into(),
            image_url: Some(image_url.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::Assistant {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Turn::User { content, .. } | Turn::Assistant { content } => content,
        }
    }

    pub fn role(&self) -> HistoryRole {
        match self {
            Turn::User { .. } => HistoryRole::User,
            Turn::Assistant { .. } => HistoryRole::Assistant,
        }
    }

    /// The turn as a prompt message, images included.
    pub fn to_message(&self) -> Message {
        match self {
            Turn::User { content, image_url: Some(url) } => Message::user_with_image(content.as_str(), url.as_str()),
            _ => self.to_text_message(),
        }
    }

    /// The turn as a text-only prompt message.
    pub fn to_text_message(&self) -> Message {
        match self {
            Turn::User { content, .. } => Message::user(content.as_str()),
            Turn::Assistant { content } => Message::assistant(content.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

/// A turn as exchanged with callers: `{"role": "user", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: String,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for HistoryMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role(),
            content: turn.content().to_string(),
        }
    }
}

impl From<HistoryMessage> for Turn {
    fn from(message: HistoryMessage) -> Self {
        match message.role {
            HistoryRole::User => Turn::user(message.content),
            HistoryRole::Assistant => Turn::assistant(message.content),
        }
    }
}

/// Merges client-supplied history into the stored turns.
///
/// Only the last `max_history` non-empty client messages are considered.
/// If they already appear as a contiguous run of the stored turns nothing is
/// added; otherwise the part that does not overlap the stored tail is
/// appended. Returns the number of turns appended.
pub fn merge_client_history(stored: &mut Vec<Turn>, client: &[HistoryMessage], max_history: usize) -> usize {
    let non_empty: Vec<&HistoryMessage> = client
        .iter()
        .filter(|message| !message.content.trim().is_empty())
        .collect();
    let window = &non_empty[non_empty.len().saturating_sub(max_history)..];
    if window.is_empty() {
        return 0;
    }

    let known: Vec<HistoryMessage> = stored.iter().map(HistoryMessage::from).collect();
    let matches = |stored: &[HistoryMessage], incoming: &[&HistoryMessage]| {
        stored.iter().zip(incoming).all(|(a, b)| a == *b)
    };

    if known.windows(window.len()).any(|run| matches(run, window)) {
        return 0;
    }

    let overlap = (1..=window.len().min(known.len()))
        .rev()
        .find(|&n| matches(&known[known.len() - n..], &window[..n]))
        .unwrap_or(0);

    let appended = window.len() - overlap;
    stored.extend(window[overlap..].iter().map(|message| Turn::from((*message).clone())));
    appended
}
