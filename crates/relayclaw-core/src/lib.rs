//! # RelayClaw Core
//!
//! Shared foundation for the RelayClaw forwarding agent:
//! - `error` — the unified error taxonomy (`RelayError`) and `Result` alias
//! - `config` — TOML configuration (`~/.relayclaw/config.toml`)
//! - `types` — canonical identifiers, payload references, dialog info
//! - `traits` — the `Transport` capability the engine delivers through

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use traits::Transport;
pub use types::{ChatId, ContentKind, DialogInfo, DialogKind, PayloadRef, UserId};
