//! Admin-gated command dispatch.
//!
//! Every incoming message passes through here: gate first, argument
//! validation second, engine calls last. Replies are rendered in one place;
//! `None` means the sender gets nothing at all.

use chrono::Utc;
use relayclaw_core::{PayloadRef, RelayError, Result};
use relayclaw_engine::{
    authorize, AuthDecision, CommandSpec, SchedulingEngine, Snapshot,
};
use relayclaw_transport::{IncomingCommand, ReplyRef};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::commands::{enables_forwarding, split_command, Command};

/// Minimum accepted interval for any recurring job, enforced at this layer.
const MIN_INTERVAL_SECS: u64 = 60;

const OFFLINE_NOTICE: &str = "⚠️ RelayClaw is currently offline! Use /start to wake it up.";

pub struct CommandHandler {
    engine: Arc<SchedulingEngine>,
}

impl CommandHandler {
    pub fn new(engine: Arc<SchedulingEngine>) -> Self {
        Self { engine }
    }

    /// Process one incoming message. `None` means no reply is sent — unknown
    /// commands, unauthorized senders, and suppressed offline notices.
    pub async fn handle(&self, incoming: &IncomingCommand) -> Option<String> {
        let parsed = split_command(&incoming.text)?;

        let spec = CommandSpec {
            name: &parsed.name,
            enables: enables_forwarding(&parsed.name),
            silent: parsed.silent,
        };
        let decision = {
            let store = self.engine.store().lock().await;
            authorize(incoming.sender, &spec, store.admins(), store.state())
        };
        match decision {
            AuthDecision::Allow | AuthDecision::AllowBypass => {}
            AuthDecision::Deny { notify_offline: true } => return Some(OFFLINE_NOTICE.into()),
            AuthDecision::Deny { notify_offline: false } => return None,
        }

        let command = match Command::parse_args(&parsed.name, &parsed.args) {
            Ok(command) => command,
            Err(e) => return Some(format!("❌ {e}")),
        };

        match self.dispatch(command, incoming).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!("command /{} failed: {e}", parsed.name);
                Some(format!("❌ Error: {e}"))
            }
        }
    }

    async fn dispatch(&self, command: Command, incoming: &IncomingCommand) -> Result<String> {
        let engine = &self.engine;
        match command {
            Command::Start => {
                let mut store = engine.store().lock().await;
                if store.state() == relayclaw_engine::ForwardingState::Enabled {
                    Ok("✅ RelayClaw is already running".into())
                } else {
                    store.enable();
                    tracing::info!("forwarding enabled by admin {}", incoming.sender);
                    Ok("🚀 RelayClaw is online! Use /help to see available commands.".into())
                }
            }
            Command::Stop => {
                let stopped = engine.stop_all().await;
                engine.store().lock().await.disable();
                tracing::info!("forwarding disabled by admin {}", incoming.sender);
                Ok(format!(
                    "🛑 RelayClaw stopped. {stopped} task(s) cancelled. Use /start to bring it back."
                ))
            }
            Command::Status => {
                let s = engine.status(Utc::now()).await;
                Ok(format!(
                    "📊 **Status**\n\
                     • Uptime: {}\n\
                     • Admins: {}\n\
                     • Targets: {}\n\
                     • Saved messages: {}\n\
                     • Live tasks: {}\n\
                     • Targeted campaigns: {}\n\
                     • Pending schedules: {}\n\
                     • Default interval: {}s\n\
                     • Forwards today: {}",
                    format_duration(s.uptime_secs),
                    s.admin_count,
                    s.target_count,
                    s.payload_count,
                    s.live_task_count,
                    s.campaign_count,
                    s.schedule_count,
                    s.default_interval_secs,
                    s.forwards_today,
                ))
            }
            Command::Help => Ok(HELP_TEXT.into()),
            Command::Optimize => {
                let report = engine.maintenance(Utc::now().date_naive()).await;
                Ok(format!(
                    "🧹 Maintenance done: {} old analytics bucket(s) pruned, {} finished task(s) swept",
                    report.pruned_day_buckets, report.swept_tasks
                ))
            }

            Command::SetAd => {
                let reply = incoming.reply_to.as_ref().ok_or_else(|| {
                    RelayError::invalid("reply to the message you want to forward")
                })?;
                let payload = payload_from_reply(incoming, reply);
                let id = engine.store().lock().await.save_payload(payload);
                Ok(format!(
                    "✅ Message saved for forwarding with ID: `{id}`\n\nUse it with /startad, /targetedad, /schedule or /forward."
                ))
            }
            Command::ListAds => {
                let store = engine.store().lock().await;
                let mut payloads: Vec<_> = store.payloads().collect();
                if payloads.is_empty() {
                    return Ok("📝 No messages are currently saved".into());
                }
                payloads.sort_by(|a, b| a.id.cmp(&b.id));
                let mut out = String::from("📝 **Saved Messages**:\n\n");
                for p in payloads {
                    out.push_str(&format!("• ID: `{}` - {}\n", p.id, p.payload.preview));
                }
                Ok(out)
            }
            Command::RemoveAd { id } => {
                engine.remove_payload(&id).await?;
                Ok(format!("✅ Message with ID {id} has been removed"))
            }

            Command::StartAd { id, interval } => {
                let interval = self.effective_interval(interval).await?;
                engine.start_recurring(&id, interval).await?;
                Ok(format!(
                    "🚀 Campaign started!\n• Message ID: {id}\n• Interval: {interval}s\n\nUse /stopad {id} to stop it."
                ))
            }
            Command::StopAd { id: None } => {
                let stopped = engine.stop_all().await;
                Ok(format!("🛑 All forwarding stopped ({stopped} task(s))"))
            }
            Command::StopAd { id: Some(id) } => {
                if engine.stop_recurring(&id).await {
                    Ok(format!("🛑 Forwarding stopped for message {id}"))
                } else {
                    Ok(format!("❌ No active forwarding found for message ID: {id}"))
                }
            }
            Command::Timer { secs } => {
                if secs < MIN_INTERVAL_SECS {
                    return Err(RelayError::invalid(format!(
                        "interval must be at least {MIN_INTERVAL_SECS} seconds"
                    )));
                }
                engine.store().lock().await.set_default_interval_secs(secs);
                Ok(format!("⏱️ Default forwarding interval set to {secs} seconds"))
            }

            Command::TargetedAd { id, targets, interval } => {
                let interval = self.effective_interval(interval).await?;
                let resolved = self.resolve_targets(&targets).await?;
                let campaign_id = engine.start_targeted(&id, resolved.clone(), interval).await?;
                Ok(format!(
                    "✅ **Targeted Campaign Started**\n• Campaign ID: `{campaign_id}`\n• Message ID: {id}\n• Targets: {} chats\n• Interval: {interval}s\n\nUse /stoptargetad {campaign_id} to stop it.",
                    resolved.len()
                ))
            }
            Command::ListTargetedAds => {
                let now = Utc::now();
                let store = engine.store().lock().await;
                let mut campaigns: Vec<_> = store.campaigns().collect();
                if campaigns.is_empty() {
                    return Ok("📝 No targeted campaigns are currently active".into());
                }
                campaigns.sort_by(|a, b| a.id.cmp(&b.id));
                let mut out = String::from("📝 **Active Targeted Campaigns**:\n\n");
                for c in campaigns {
                    out.push_str(&format!(
                        "• Campaign ID: `{}`\n  - Message ID: {}\n  - Targets: {} chats\n  - Interval: {}s\n  - Running for: {}\n\n",
                        c.id,
                        c.payload_id,
                        c.targets.len(),
                        c.interval_secs,
                        format_duration(c.uptime_secs(now)),
                    ));
                }
                Ok(out)
            }
            Command::StopTargetedAd { id } => {
                engine.stop_targeted(&id).await?;
                Ok(format!("🛑 Targeted campaign {id} has been stopped"))
            }

            Command::Schedule { id, expr } => {
                let entry = engine.schedule_one_shot(&id, &expr, Utc::now()).await?;
                Ok(format!(
                    "✅ **Message Scheduled**\n• Schedule ID: `{}`\n• Message ID: {id}\n• Fires at: {}\n• Targets: {} chats\n\nUse /cancelschedule {} to cancel.",
                    entry.id,
                    entry.fire_time.format("%Y-%m-%d %H:%M UTC"),
                    entry.targets.len(),
                    entry.id,
                ))
            }
            Command::CancelSchedule { id } => {
                engine.cancel_schedule(&id).await?;
                Ok(format!("🛑 Schedule {id} cancelled"))
            }

            Command::Forward { id, targets } => {
                let resolved = self.resolve_targets(&targets).await?;
                let report = engine.forward_once(&id, &resolved).await?;
                let mut out = format!(
                    "✅ **Forward Results**\n• Message ID: {id}\n• Successful: {}\n• Failed: {}\n",
                    report.delivered,
                    report.failed.len()
                );
                if !report.failed.is_empty() {
                    out.push_str("\n**Failures:**\n");
                    for (dest, reason) in report.failed.iter().take(5) {
                        out.push_str(&format!("- {dest}: {reason}\n"));
                    }
                    if report.failed.len() > 5 {
                        out.push_str(&format!("... and {} more failures\n", report.failed.len() - 5));
                    }
                }
                Ok(out)
            }

            Command::AddTarget { identifiers } => {
                // Bulk add is partial-success: one bad identifier never
                // blocks the rest.
                let mut added = Vec::new();
                let mut failed = Vec::new();
                for identifier in &identifiers {
                    match engine.transport().resolve(identifier).await {
                        Ok(chat) => {
                            engine.store().lock().await.add_target(chat);
                            added.push(format!("{identifier} → {chat}"));
                        }
                        Err(e) => failed.push(format!("{identifier}: {e}")),
                    }
                }
                let mut out = String::new();
                if !added.is_empty() {
                    out.push_str(&format!("✅ Successfully added {} target(s):\n", added.len()));
                    for line in &added {
                        out.push_str(&format!("• {line}\n"));
                    }
                }
                if !failed.is_empty() {
                    out.push_str(&format!("\n❌ Failed to add {} target(s):\n", failed.len()));
                    for line in &failed {
                        out.push_str(&format!("• {line}\n"));
                    }
                }
                if out.is_empty() {
                    out.push_str("⚠️ No targets were processed");
                }
                Ok(out)
            }
            Command::ListTargets => {
                let store = engine.store().lock().await;
                if store.targets().is_empty() {
                    return Ok("📝 No target chats configured".into());
                }
                let mut out = String::from("📝 **Target Chats**:\n\n");
                for chat in store.targets() {
                    out.push_str(&format!("• `{chat}`\n"));
                }
                Ok(out)
            }
            Command::RemoveTarget { identifiers } => {
                let resolved = self.resolve_targets(&identifiers).await?;
                let mut store = engine.store().lock().await;
                let mut removed = 0;
                let mut missing = Vec::new();
                for chat in &resolved {
                    match store.remove_target(*chat) {
                        Ok(()) => removed += 1,
                        Err(_) => missing.push(*chat),
                    }
                }
                let mut out = format!("✅ Removed {removed} target chat(s)");
                if !missing.is_empty() {
                    out.push_str(&format!(
                        "\n❌ Not in the target list: {}",
                        missing
                            .iter()
                            .map(|c| c.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                }
                Ok(out)
            }
            Command::RemoveAllTargets => {
                let n = engine.store().lock().await.clear_targets();
                Ok(format!("✅ Removed all {n} target chat(s)"))
            }

            Command::AddAdmin { identifier } => {
                let user = self.resolve_user(&identifier).await?;
                let mut store = engine.store().lock().await;
                if store.add_admin(user) {
                    Ok(format!("✅ User {user} added as admin"))
                } else {
                    Ok(format!("❌ User {user} is already an admin"))
                }
            }
            Command::RemoveAdmin { identifier } => {
                let user = self.resolve_user(&identifier).await?;
                engine.store().lock().await.remove_admin(user)?;
                Ok(format!("✅ User {user} removed from admins"))
            }
            Command::ListAdmins => {
                let store = engine.store().lock().await;
                let mut out = String::from("📝 **Admins**:\n\n");
                for admin in store.admins() {
                    out.push_str(&format!("• `{admin}`\n"));
                }
                Ok(out)
            }

            Command::Analytics { days } => {
                let summary = engine.analytics_summary(days, Utc::now().date_naive()).await;
                let mut out = format!(
                    "📊 **Forwarding Analytics (Last {days} Days)**\n\n\
                     **Summary:**\n\
                     • Total Messages Forwarded: {}\n\
                     • Total Failures: {}\n\
                     • Success Rate: {:.1}%\n\n\
                     **Daily Breakdown:**\n",
                    summary.total_forwards,
                    summary.total_failures,
                    summary.success_rate * 100.0,
                );
                for day in &summary.daily {
                    out.push_str(&format!(
                        "• {}: {} forwards, {} failures\n",
                        day.date, day.forwards, day.failures
                    ));
                }
                if let Some(change) = summary.day_over_day {
                    out.push_str(&format!(
                        "\n**Today vs. Yesterday:**\n• {change:+.1}% change in forwards\n"
                    ));
                }
                Ok(out)
            }

            Command::Backup => {
                let snapshot = {
                    let store = engine.store().lock().await;
                    Snapshot::export(&store)
                };
                let json = snapshot.to_json()?;
                Ok(format!(
                    "✅ **Backup Created** ({} targets, {} admins, {} saved messages)\n\nReply to this message with /restore to apply it.\n\n```\n{json}\n```",
                    snapshot.targets.len(),
                    snapshot.admins.len(),
                    snapshot.payloads.len(),
                ))
            }
            Command::Restore => {
                let reply = incoming.reply_to.as_ref().ok_or_else(|| {
                    RelayError::invalid("reply to a backup message to restore from it")
                })?;
                let snapshot = Snapshot::from_json(extract_json(&reply.text))?;
                // Live tasks belong to the state being replaced.
                engine.stop_all().await;
                let report = {
                    let mut store = engine.store().lock().await;
                    snapshot.import(&mut store)
                };
                let mut out = format!(
                    "✅ **Restore Complete**\n• Targets: {}\n• Admins: {}\n• Campaign records: {}\n• Default interval: {}s\n",
                    report.targets_restored,
                    report.admins_restored,
                    report.campaigns_restored,
                    report.default_interval_secs,
                );
                if !report.payloads_requiring_resave.is_empty() {
                    out.push_str("\n**Messages not restored** (re-save with /setad):\n");
                    for (id, preview) in &report.payloads_requiring_resave {
                        out.push_str(&format!("• `{id}` - {preview}\n"));
                    }
                }
                Ok(out)
            }
        }
    }

    /// Interval fallback + floor: explicit value or the stored default, and
    /// never below the minimum.
    async fn effective_interval(&self, requested: Option<u64>) -> Result<u64> {
        let interval = match requested {
            Some(secs) => secs,
            None => self.engine.store().lock().await.default_interval_secs(),
        };
        if interval < MIN_INTERVAL_SECS {
            return Err(RelayError::invalid(format!(
                "interval must be at least {MIN_INTERVAL_SECS} seconds"
            )));
        }
        Ok(interval)
    }

    /// Resolve a list of admin-supplied identifiers to canonical chat ids.
    /// One unresolvable entry fails the whole command, matching the all-or-
    /// nothing shape of the commands that take lists.
    async fn resolve_targets(&self, identifiers: &[String]) -> Result<BTreeSet<i64>> {
        let mut resolved = BTreeSet::new();
        for identifier in identifiers {
            let chat = self.engine.transport().resolve(identifier).await?;
            resolved.insert(chat);
        }
        if resolved.is_empty() {
            return Err(RelayError::invalid("no valid targets specified"));
        }
        Ok(resolved)
    }

    async fn resolve_user(&self, identifier: &str) -> Result<i64> {
        self.engine.transport().resolve(identifier).await
    }
}

fn payload_from_reply(incoming: &IncomingCommand, reply: &ReplyRef) -> PayloadRef {
    PayloadRef::new(incoming.chat, reply.message_id, reply.kind, &reply.text)
}

/// Accept the blob bare or wrapped in a markdown code fence (the /backup
/// reply shape).
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.find("```") {
        Some(start) => {
            let inner = &trimmed[start + 3..];
            let inner = inner.strip_prefix("json").unwrap_or(inner);
            match inner.rfind("```") {
                Some(end) => inner[..end].trim(),
                None => inner.trim(),
            }
        }
        None => trimmed,
    }
}

const HELP_TEXT: &str = "🤖 **RelayClaw Commands**\n\n\
**Lifecycle**\n\
/start - enable forwarding\n\
/stop - stop everything and go offline\n\
/status - uptime and counters\n\
/optimize - prune analytics, sweep finished tasks\n\n\
**Messages**\n\
/setad - reply to a message to save it\n\
/listad - list saved messages\n\
/removead <id> - delete a saved message\n\n\
**Forwarding**\n\
/startad <id> [interval] - recurring forward to all targets\n\
/stopad [id] - stop one forward, or all\n\
/timer <seconds> - set the default interval\n\
/forward <id> <targets> - forward once to specific targets\n\n\
**Targeted campaigns**\n\
/targetedad <id> <targets> [interval] - frozen-target campaign\n\
/listtargetad - list campaigns\n\
/stoptargetad <campaign_id> - stop a campaign\n\n\
**Scheduling**\n\
/schedule <id> <time> - one-shot delivery (5m, 2h, HH:MM, YYYY-MM-DD HH:MM)\n\
/cancelschedule <schedule_id> - cancel a pending delivery\n\n\
**Targets**\n\
/addtarget <list> - add target chats\n\
/listtarget - show target chats\n\
/removetarget <list> - remove target chats\n\
/removealltarget - clear the target list\n\n\
**Admins**\n\
/addadmin <user> | /removeadmin <user> | /listadmins\n\n\
**Data**\n\
/analytics [days] - delivery stats\n\
/backup - export settings\n\
/restore - reply to a backup to import it";

fn format_duration(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    format!("{days}d {hours}h {minutes}m {seconds}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relayclaw_core::{ChatId, ContentKind, DialogInfo, Transport};
    use relayclaw_engine::CampaignStore;
    use std::sync::Mutex;

    struct StubTransport {
        sent: Mutex<Vec<(ChatId, i64)>>,
    }

    impl StubTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn resolve(&self, identifier: &str) -> Result<ChatId> {
            identifier.parse().map_err(|_| RelayError::Resolution {
                identifier: identifier.into(),
                reason: "stub only resolves numeric ids".into(),
            })
        }

        async fn forward_to(&self, payload: &PayloadRef, destination: ChatId) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((destination, payload.message_id));
            Ok(())
        }

        async fn list_dialogs(&self) -> Result<Vec<DialogInfo>> {
            Ok(Vec::new())
        }

        async fn send_text(&self, _destination: ChatId, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn handler() -> CommandHandler {
        let store = CampaignStore::new([7], 300);
        let engine = Arc::new(SchedulingEngine::new(store, StubTransport::new()));
        CommandHandler::new(engine)
    }

    fn msg(sender: i64, text: &str) -> IncomingCommand {
        IncomingCommand {
            chat: -100,
            sender,
            message_id: 1,
            text: text.into(),
            reply_to: None,
        }
    }

    fn msg_with_reply(sender: i64, text: &str, reply_text: &str) -> IncomingCommand {
        IncomingCommand {
            reply_to: Some(ReplyRef {
                message_id: 55,
                kind: ContentKind::Text,
                text: reply_text.into(),
            }),
            ..msg(sender, text)
        }
    }

    async fn enabled_handler() -> CommandHandler {
        let h = handler();
        h.handle(&msg(7, "/start")).await.unwrap();
        h
    }

    #[tokio::test]
    async fn unauthorized_sender_gets_no_reply_at_all() {
        let h = enabled_handler().await;
        assert!(h.handle(&msg(999, "/status")).await.is_none());
        assert!(h.handle(&msg(999, "/start")).await.is_none());
        assert!(h.handle(&msg(999, "/startad bogus args here")).await.is_none());
    }

    #[tokio::test]
    async fn non_commands_are_ignored() {
        let h = enabled_handler().await;
        assert!(h.handle(&msg(7, "just chatting")).await.is_none());
        assert!(h.handle(&msg(7, "/nosuchcommand")).await.is_none());
    }

    #[tokio::test]
    async fn disabled_state_rejects_without_mutating() {
        let h = handler();
        // Not /start, so the gate denies with the offline notice.
        let reply = h.handle(&msg(7, "/addtarget 100")).await.unwrap();
        assert!(reply.contains("offline"));
        assert!(h.engine.store().lock().await.targets().is_empty());

        // Silent variant: denied with no reply at all.
        assert!(h.handle(&msg(7, "/silentstatus")).await.is_none());
    }

    #[tokio::test]
    async fn start_is_the_only_exit_from_disabled() {
        let h = handler();
        let reply = h.handle(&msg(7, "/start")).await.unwrap();
        assert!(reply.contains("online"));
        // Now ordinary commands work.
        let reply = h.handle(&msg(7, "/status")).await.unwrap();
        assert!(reply.contains("Targets: 0"));
    }

    #[tokio::test]
    async fn setad_requires_a_reply_and_allocates_short_ids() {
        let h = enabled_handler().await;
        let reply = h.handle(&msg(7, "/setad")).await.unwrap();
        assert!(reply.starts_with("❌"));

        let reply = h
            .handle(&msg_with_reply(7, "/setad", "big promo"))
            .await
            .unwrap();
        assert!(reply.contains("`1`"));
        let reply = h
            .handle(&msg_with_reply(7, "/setad", "second promo"))
            .await
            .unwrap();
        assert!(reply.contains("`2`"));
    }

    #[tokio::test]
    async fn interval_floor_is_enforced_at_this_layer() {
        let h = enabled_handler().await;
        let _ = h.handle(&msg_with_reply(7, "/setad", "promo")).await;
        let _ = h.handle(&msg(7, "/addtarget 100")).await;

        let reply = h.handle(&msg(7, "/startad 1 30")).await.unwrap();
        assert!(reply.contains("at least 60"));
        assert_eq!(h.engine.registry().len().await, 0);

        let reply = h.handle(&msg(7, "/timer 10")).await.unwrap();
        assert!(reply.contains("at least 60"));
        assert_eq!(h.engine.store().lock().await.default_interval_secs(), 300);
    }

    #[tokio::test]
    async fn stopad_without_id_stops_everything() {
        let h = enabled_handler().await;
        let _ = h.handle(&msg_with_reply(7, "/setad", "promo")).await;
        let _ = h.handle(&msg(7, "/addtarget 100")).await;
        let _ = h.handle(&msg(7, "/startad 1 60")).await;
        assert_eq!(h.engine.registry().len().await, 1);

        let reply = h.handle(&msg(7, "/stopad")).await.unwrap();
        assert!(reply.contains("All forwarding stopped"));
        assert_eq!(h.engine.registry().len().await, 0);
    }

    #[tokio::test]
    async fn last_admin_cannot_remove_themselves() {
        let h = enabled_handler().await;
        let reply = h.handle(&msg(7, "/removeadmin 7")).await.unwrap();
        assert!(reply.contains("❌"));
        assert!(h.engine.store().lock().await.is_admin(7));
    }

    #[tokio::test]
    async fn backup_restore_round_trip() {
        let h = enabled_handler().await;
        let _ = h.handle(&msg(7, "/addtarget 100,200")).await;
        let backup = h.handle(&msg(7, "/backup")).await.unwrap();

        let h2 = enabled_handler().await;
        let restore = h2
            .handle(&msg_with_reply(7, "/restore", &backup))
            .await
            .unwrap();
        assert!(restore.contains("Restore Complete"));
        assert_eq!(h2.engine.store().lock().await.targets().len(), 2);
    }

    #[tokio::test]
    async fn bulk_target_add_is_partial_success() {
        let h = enabled_handler().await;
        let reply = h.handle(&msg(7, "/addtarget 100,@nope,200")).await.unwrap();
        assert!(reply.contains("Successfully added 2"));
        assert!(reply.contains("Failed to add 1"));
        assert_eq!(h.engine.store().lock().await.targets().len(), 2);
    }

    #[tokio::test]
    async fn targeted_campaign_aborts_on_unresolvable_target() {
        let h = enabled_handler().await;
        let _ = h.handle(&msg_with_reply(7, "/setad", "promo")).await;
        let reply = h.handle(&msg(7, "/targetedad 1 @nope 60")).await.unwrap();
        assert!(reply.contains("❌"));
        assert_eq!(h.engine.registry().len().await, 0);
        assert_eq!(h.engine.store().lock().await.campaign_count(), 0);
    }
}
