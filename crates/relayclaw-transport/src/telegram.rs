//! Telegram Bot transport — long polling + forwarding via Bot API.

use async_trait::async_trait;
use futures::stream::Stream;
use relayclaw_core::{
    ChatId, ContentKind, DialogInfo, DialogKind, PayloadRef, RelayError, Result, Transport, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Mutex;

/// Telegram Bot API transport. Shared behind an `Arc`; the polling loop and
/// the engine's delivery passes use the same instance.
pub struct TelegramTransport {
    bot_token: String,
    poll_interval_secs: u64,
    client: reqwest::Client,
    last_update_id: Mutex<i64>,
    /// Chats observed on the update stream, for dialog listing.
    dialogs: Mutex<HashMap<ChatId, DialogInfo>>,
}

impl TelegramTransport {
    pub fn new(bot_token: impl Into<String>, poll_interval_secs: u64) -> Self {
        Self {
            bot_token: bot_token.into(),
            poll_interval_secs,
            client: reqwest::Client::new(),
            last_update_id: Mutex::new(0),
            dialogs: Mutex::new(HashMap::new()),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Verify the token and report the bot identity.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| RelayError::transport(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| RelayError::transport(format!("invalid getMe response: {e}")))?;
        body.into_result()
    }

    /// Get updates using long polling. Advances the stored offset past
    /// everything returned.
    pub async fn get_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let offset = *self.last_update_id.lock().await + 1;
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", "30".into()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| RelayError::transport(format!("getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| RelayError::transport(format!("invalid getUpdates response: {e}")))?;
        let updates = body.into_result()?;

        if let Some(last) = updates.last() {
            *self.last_update_id.lock().await = last.update_id;
        }
        self.observe_chats(&updates).await;
        Ok(updates)
    }

    /// Remember every chat seen on the stream for later dialog listing.
    async fn observe_chats(&self, updates: &[TelegramUpdate]) {
        let mut dialogs = self.dialogs.lock().await;
        for update in updates {
            if let Some(msg) = &update.message {
                dialogs.insert(msg.chat.id, msg.chat.to_dialog());
            }
        }
    }

    /// Send a text message.
    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::transport(format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| RelayError::transport(format!("invalid send response: {e}")))?;
        result.into_result().map(|_| ())
    }

    /// Look a chat up by the `@username` (or numeric) form.
    async fn get_chat(&self, chat_ref: &str) -> Result<TelegramChat> {
        let body = serde_json::json!({ "chat_id": chat_ref });
        let response = self
            .client
            .post(self.api_url("getChat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::transport(format!("getChat failed: {e}")))?;
        let result: TelegramApiResponse<TelegramChat> = response
            .json()
            .await
            .map_err(|e| RelayError::transport(format!("invalid getChat response: {e}")))?;
        result.into_result()
    }

    /// Start polling — spawns the loop and returns the command stream.
    pub fn start_polling(self: Arc<Self>) -> CommandStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            tracing::info!("Telegram polling loop started");
            loop {
                match self.get_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            if let Some(cmd) = update.to_command() {
                                if tx.send(cmd).is_err() {
                                    tracing::info!("polling stopped (receiver dropped)");
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }

                tokio::time::sleep(tokio::time::Duration::from_secs(self.poll_interval_secs))
                    .await;
            }
        });

        CommandStream { rx }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    /// Resolve an admin-supplied identifier to a canonical chat id. Accepted
    /// forms: numeric id, `uid:N`, `@username`, `t.me/...` link, bare name
    /// (treated as a username).
    async fn resolve(&self, identifier: &str) -> Result<ChatId> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(RelayError::Resolution {
                identifier: identifier.into(),
                reason: "empty identifier".into(),
            });
        }

        if let Ok(id) = identifier.parse::<ChatId>() {
            return Ok(id);
        }
        if let Some(raw) = identifier.strip_prefix("uid:") {
            return raw.parse::<ChatId>().map_err(|_| RelayError::Resolution {
                identifier: identifier.into(),
                reason: "malformed uid form".into(),
            });
        }

        let username = normalize_username(identifier);
        let chat = self
            .get_chat(&username)
            .await
            .map_err(|e| RelayError::Resolution {
                identifier: identifier.into(),
                reason: e.to_string(),
            })?;
        Ok(chat.id)
    }

    /// Forward the referenced message to `destination` via `forwardMessage`.
    async fn forward_to(&self, payload: &PayloadRef, destination: ChatId) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": destination,
            "from_chat_id": payload.source_chat,
            "message_id": payload.message_id,
        });

        let response = self
            .client
            .post(self.api_url("forwardMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Delivery {
                destination,
                reason: format!("forwardMessage failed: {e}"),
            })?;

        let result: TelegramApiResponse<serde_json::Value> =
            response.json().await.map_err(|e| RelayError::Delivery {
                destination,
                reason: format!("invalid forward response: {e}"),
            })?;
        result.into_result().map(|_| ()).map_err(|e| {
            RelayError::Delivery {
                destination,
                reason: e.to_string(),
            }
        })
    }

    /// Chats observed on the update stream, ascending by id. The Bot API has
    /// no dialog enumeration, so this is what the bot has actually seen.
    async fn list_dialogs(&self) -> Result<Vec<DialogInfo>> {
        let dialogs = self.dialogs.lock().await;
        let mut list: Vec<DialogInfo> = dialogs.values().cloned().collect();
        list.sort_by_key(|d| d.id);
        Ok(list)
    }

    async fn send_text(&self, destination: ChatId, text: &str) -> Result<()> {
        self.send_message(destination, text).await
    }
}

/// Strip link and `@` decoration down to the `@username` form getChat wants.
fn normalize_username(identifier: &str) -> String {
    let stripped = identifier
        .strip_prefix("https://t.me/")
        .or_else(|| identifier.strip_prefix("http://t.me/"))
        .or_else(|| identifier.strip_prefix("t.me/"))
        .unwrap_or(identifier);
    let stripped = stripped.trim_end_matches('/');
    match stripped.strip_prefix('@') {
        Some(name) => format!("@{name}"),
        None => format!("@{stripped}"),
    }
}

/// Stream of incoming commands from the polling loop.
pub struct CommandStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<IncomingCommand>,
}

impl Stream for CommandStream {
    type Item = IncomingCommand;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Unpin for CommandStream {}

/// One human-sent text message, with the reply context the capture commands
/// need.
#[derive(Debug, Clone)]
pub struct IncomingCommand {
    pub chat: ChatId,
    pub sender: UserId,
    pub message_id: i64,
    pub text: String,
    pub reply_to: Option<ReplyRef>,
}

/// The message an incoming command replied to.
#[derive(Debug, Clone)]
pub struct ReplyRef {
    pub message_id: i64,
    pub kind: ContentKind,
    pub text: String,
}

// --- Telegram API types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self) -> Result<T> {
        if !self.ok {
            return Err(RelayError::transport(format!(
                "Telegram API error: {}",
                self.description.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| RelayError::transport("empty Telegram API result"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<serde_json::Value>,
    #[serde(default)]
    pub video: Option<serde_json::Value>,
    #[serde(default)]
    pub document: Option<serde_json::Value>,
    pub date: i64,
    pub reply_to_message: Option<Box<TelegramMessage>>,
}

impl TelegramMessage {
    /// Coarse content classification for snapshots and previews.
    pub fn content_kind(&self) -> ContentKind {
        if self.photo.is_some() || self.video.is_some() || self.document.is_some() {
            ContentKind::Media
        } else if self.text.is_some() {
            ContentKind::Text
        } else {
            ContentKind::Unknown
        }
    }

    /// Best available preview text.
    pub fn preview_text(&self) -> &str {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl TelegramChat {
    fn to_dialog(&self) -> DialogInfo {
        DialogInfo {
            id: self.id,
            title: self
                .title
                .clone()
                .or_else(|| self.username.as_ref().map(|u| format!("@{u}")))
                .unwrap_or_else(|| self.id.to_string()),
            kind: match self.chat_type.as_str() {
                "private" => DialogKind::Private,
                "channel" => DialogKind::Channel,
                _ => DialogKind::Group,
            },
        }
    }
}

impl TelegramUpdate {
    /// Convert to an incoming command. Bot senders and non-text updates are
    /// dropped.
    pub fn to_command(&self) -> Option<IncomingCommand> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        let from = msg.from.as_ref()?;

        if from.is_bot {
            return None;
        }

        Some(IncomingCommand {
            chat: msg.chat.id,
            sender: from.id,
            message_id: msg.message_id,
            text: text.clone(),
            reply_to: msg.reply_to_message.as_ref().map(|r| ReplyRef {
                message_id: r.message_id,
                kind: r.content_kind(),
                text: r.preview_text().to_string(),
            }),
        })
    }
}
