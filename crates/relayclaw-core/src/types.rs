//! Canonical identifiers and shared data shapes.

use serde::{Deserialize, Serialize};

/// Canonical destination identifier in the transport's namespace.
pub type ChatId = i64;

/// Principal identifier of a command sender.
pub type UserId = i64;

/// Reference to previously captured content — the thing a campaign delivers.
/// The content itself lives on the transport side; we only hold the pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRef {
    /// Chat the original message lives in.
    pub source_chat: ChatId,
    /// Message id inside that chat.
    pub message_id: i64,
    /// Content-type tag.
    pub kind: ContentKind,
    /// Short text preview (first ~50 chars, or a media marker).
    pub preview: String,
}

impl PayloadRef {
    /// Build a reference from a captured message, trimming the preview.
    pub fn new(source_chat: ChatId, message_id: i64, kind: ContentKind, text: &str) -> Self {
        let preview = if text.is_empty() {
            match kind {
                ContentKind::Media => "[Media Message]".to_string(),
                _ => "[Unknown Content]".to_string(),
            }
        } else {
            let mut p: String = text.chars().take(50).collect();
            if text.chars().count() > 50 {
                p.push_str("...");
            }
            p
        };
        Self {
            source_chat,
            message_id,
            kind,
            preview,
        }
    }
}

/// Coarse content classification carried in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Media,
    Unknown,
}

/// A dialog the transport knows about (discovery/cleanup flows).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogInfo {
    pub id: ChatId,
    pub title: String,
    pub kind: DialogKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
    Private,
    Group,
    Channel,
}
