//! Authorization gate in front of every externally triggered operation.
//!
//! Stateless: reads the admin set and lifecycle flag fresh on every call.
//! Unauthorized senders are dropped silently — no error reply, no trace of
//! the bot's existence.

use relayclaw_core::UserId;
use std::collections::BTreeSet;

use crate::store::ForwardingState;

/// What the gate needs to know about the command being attempted.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec<'a> {
    pub name: &'a str,
    /// The one command allowed to leave `Disabled`.
    pub enables: bool,
    /// Silent commands never trigger the offline notice.
    pub silent: bool,
}

/// Gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Admin, bot enabled: proceed.
    Allow,
    /// Admin issued the enable command while disabled: proceed, this is the
    /// lifecycle transition itself.
    AllowBypass,
    /// Do not execute. `notify_offline` tells the caller whether an
    /// "offline, use the enable command" notice may be surfaced.
    Deny { notify_offline: bool },
}

/// Evaluate the gate rules in order. Re-run on every invocation; the gate
/// itself holds no state.
pub fn authorize(
    sender: UserId,
    command: &CommandSpec<'_>,
    admins: &BTreeSet<UserId>,
    state: ForwardingState,
) -> AuthDecision {
    if !admins.contains(&sender) {
        tracing::warn!(
            "unauthorized access attempt from {sender} for command {}",
            command.name
        );
        return AuthDecision::Deny {
            notify_offline: false,
        };
    }

    if command.enables && state == ForwardingState::Disabled {
        return AuthDecision::AllowBypass;
    }

    if state == ForwardingState::Disabled {
        return AuthDecision::Deny {
            notify_offline: !command.silent,
        };
    }

    AuthDecision::Allow
}
