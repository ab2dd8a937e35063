//! # RelayClaw Transport
//!
//! Telegram Bot API implementation of the [`Transport`] capability: long
//! polling for incoming commands, chat identifier resolution, and message
//! forwarding. Everything network-shaped lives here; the engine never sees
//! an HTTP detail.

pub mod telegram;

pub use telegram::{CommandStream, IncomingCommand, ReplyRef, TelegramTransport};

pub use relayclaw_core::Transport;
