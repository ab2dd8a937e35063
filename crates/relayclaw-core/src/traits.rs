//! Capability traits at the engine/transport seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatId, DialogInfo, PayloadRef};

/// The messaging network, as the engine sees it.
///
/// The engine never performs identifier resolution or delivery itself; it is
/// handed a `Transport` and calls through. Implementations must be cheap to
/// clone behind an `Arc` and safe to call from many jobs at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Translate a human-readable identifier (numeric id, `@username`,
    /// `t.me/...` link, `uid:N`) into a canonical destination id.
    async fn resolve(&self, identifier: &str) -> Result<ChatId>;

    /// Forward the referenced content to one destination.
    async fn forward_to(&self, payload: &PayloadRef, destination: ChatId) -> Result<()>;

    /// Dialogs the transport currently knows about.
    async fn list_dialogs(&self) -> Result<Vec<DialogInfo>>;

    /// Send plain text to a destination (command replies, broadcasts).
    async fn send_text(&self, destination: ChatId, text: &str) -> Result<()>;
}
