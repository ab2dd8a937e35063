//! Slash command grammar.
//!
//! Parsing is split in two stages so the gate can run before argument
//! validation: [`split_command`] extracts the command name (and the `/silent`
//! prefix) without judging the arguments, and [`Command::parse_args`] turns
//! the remainder into a typed command. Unknown names are ignored entirely,
//! exactly like an unregistered handler.

use relayclaw_core::{RelayError, Result};

/// A recognized command with validated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Lifecycle
    Start,
    Stop,
    Status,
    Help,
    Optimize,
    // Payloads
    SetAd,
    ListAds,
    RemoveAd { id: String },
    // Recurring forwards
    StartAd { id: String, interval: Option<u64> },
    StopAd { id: Option<String> },
    Timer { secs: u64 },
    // Targeted campaigns
    TargetedAd { id: String, targets: Vec<String>, interval: Option<u64> },
    ListTargetedAds,
    StopTargetedAd { id: String },
    // One-shot schedules
    Schedule { id: String, expr: String },
    CancelSchedule { id: String },
    // Single pass
    Forward { id: String, targets: Vec<String> },
    // Destinations
    AddTarget { identifiers: Vec<String> },
    ListTargets,
    RemoveTarget { identifiers: Vec<String> },
    RemoveAllTargets,
    // Admins
    AddAdmin { identifier: String },
    RemoveAdmin { identifier: String },
    ListAdmins,
    // Reporting
    Analytics { days: u32 },
    Backup,
    Restore,
}

/// Command name plus flags, known before arguments are validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    /// `/silent`-prefixed invocations suppress the offline notice.
    pub silent: bool,
    pub args: String,
}

/// First stage: pull the command name out of a message. `None` when the text
/// is not a slash command or the name is unknown.
pub fn split_command(text: &str) -> Option<ParsedCommand> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (word, args) = match rest.split_once(char::is_whitespace) {
        Some((w, a)) => (w, a.trim()),
        None => (rest, ""),
    };
    // Telegram group form: /status@botname
    let word = word.split('@').next().unwrap_or(word).to_ascii_lowercase();

    let (name, silent) = match word.strip_prefix("silent").map(str::to_string) {
        Some(stripped) if is_known(&stripped) => (stripped, true),
        _ => (word, false),
    };
    if !is_known(&name) {
        return None;
    }
    Some(ParsedCommand {
        name,
        silent,
        args: args.to_string(),
    })
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "start"
            | "stop"
            | "status"
            | "help"
            | "optimize"
            | "setad"
            | "listad"
            | "removead"
            | "startad"
            | "stopad"
            | "timer"
            | "targetedad"
            | "listtargetad"
            | "stoptargetad"
            | "schedule"
            | "cancelschedule"
            | "forward"
            | "addtarget"
            | "listtarget"
            | "listtargets"
            | "removetarget"
            | "removealltarget"
            | "addadmin"
            | "removeadmin"
            | "listadmins"
            | "analytics"
            | "backup"
            | "restore"
    )
}

/// Whether this command is the one allowed to leave the disabled state.
pub fn enables_forwarding(name: &str) -> bool {
    name == "start"
}

impl Command {
    /// Second stage: validate the arguments for a known command name.
    pub fn parse_args(name: &str, args: &str) -> Result<Command> {
        let words: Vec<&str> = args.split_whitespace().collect();
        match name {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            "help" => Ok(Command::Help),
            "optimize" => Ok(Command::Optimize),
            "setad" => Ok(Command::SetAd),
            "listad" => Ok(Command::ListAds),
            "removead" => match words.as_slice() {
                [id] => Ok(Command::RemoveAd { id: id.to_string() }),
                _ => Err(usage("/removead <message_id>")),
            },
            "startad" => match words.as_slice() {
                [] => Err(usage("/startad <message_id> [interval_secs]")),
                [id] => Ok(Command::StartAd {
                    id: id.to_string(),
                    interval: None,
                }),
                [id, interval] => Ok(Command::StartAd {
                    id: id.to_string(),
                    interval: Some(parse_interval(interval)?),
                }),
                _ => Err(usage("/startad <message_id> [interval_secs]")),
            },
            "stopad" => match words.as_slice() {
                [] => Ok(Command::StopAd { id: None }),
                [id] => Ok(Command::StopAd {
                    id: Some(id.to_string()),
                }),
                _ => Err(usage("/stopad [message_id]")),
            },
            "timer" => match words.as_slice() {
                [secs] => Ok(Command::Timer {
                    secs: parse_interval(secs)?,
                }),
                _ => Err(usage("/timer <seconds>")),
            },
            "targetedad" => match words.as_slice() {
                [id, targets] => Ok(Command::TargetedAd {
                    id: id.to_string(),
                    targets: split_list(targets),
                    interval: None,
                }),
                [id, targets, interval] => Ok(Command::TargetedAd {
                    id: id.to_string(),
                    targets: split_list(targets),
                    interval: Some(parse_interval(interval)?),
                }),
                _ => Err(usage(
                    "/targetedad <message_id> <target1,target2,...> [interval_secs]",
                )),
            },
            "listtargetad" => Ok(Command::ListTargetedAds),
            "stoptargetad" => match words.as_slice() {
                [id] => Ok(Command::StopTargetedAd { id: id.to_string() }),
                _ => Err(usage("/stoptargetad <campaign_id>")),
            },
            "schedule" => {
                // The time expression may contain a space (date + time form).
                match args.split_once(char::is_whitespace) {
                    Some((id, expr)) if !expr.trim().is_empty() => Ok(Command::Schedule {
                        id: id.to_string(),
                        expr: expr.trim().to_string(),
                    }),
                    _ => Err(usage(
                        "/schedule <message_id> <5m | 2h | HH:MM | YYYY-MM-DD HH:MM>",
                    )),
                }
            }
            "cancelschedule" => match words.as_slice() {
                [id] => Ok(Command::CancelSchedule { id: id.to_string() }),
                _ => Err(usage("/cancelschedule <schedule_id>")),
            },
            "forward" => match words.as_slice() {
                [id, targets] => Ok(Command::Forward {
                    id: id.to_string(),
                    targets: split_list(targets),
                }),
                _ => Err(usage("/forward <message_id> <target1,target2,...>")),
            },
            "addtarget" => {
                if args.is_empty() {
                    Err(usage("/addtarget <id1,@username2,t.me/link,uid:123456>"))
                } else {
                    Ok(Command::AddTarget {
                        identifiers: split_list(args),
                    })
                }
            }
            "listtarget" | "listtargets" => Ok(Command::ListTargets),
            "removetarget" => {
                if args.is_empty() {
                    Err(usage("/removetarget <id1,id2,...>"))
                } else {
                    Ok(Command::RemoveTarget {
                        identifiers: split_list(args),
                    })
                }
            }
            "removealltarget" => Ok(Command::RemoveAllTargets),
            "addadmin" => match words.as_slice() {
                [ident] => Ok(Command::AddAdmin {
                    identifier: ident.to_string(),
                }),
                _ => Err(usage("/addadmin <user_id or @username>")),
            },
            "removeadmin" => match words.as_slice() {
                [ident] => Ok(Command::RemoveAdmin {
                    identifier: ident.to_string(),
                }),
                _ => Err(usage("/removeadmin <user_id or @username>")),
            },
            "listadmins" => Ok(Command::ListAdmins),
            "analytics" => match words.as_slice() {
                [] => Ok(Command::Analytics { days: 7 }),
                [days] => {
                    let days: u32 = days
                        .parse()
                        .map_err(|_| RelayError::invalid("days must be a number"))?;
                    if !(1..=30).contains(&days) {
                        return Err(RelayError::invalid("days must be between 1 and 30"));
                    }
                    Ok(Command::Analytics { days })
                }
                _ => Err(usage("/analytics [days]")),
            },
            "backup" => Ok(Command::Backup),
            "restore" => Ok(Command::Restore),
            other => Err(RelayError::invalid(format!("unknown command {other}"))),
        }
    }
}

fn usage(format: &str) -> RelayError {
    RelayError::invalid(format!("Format: {format}"))
}

fn parse_interval(raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| RelayError::invalid("interval must be an integer number of seconds"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_commands_are_ignored() {
        assert!(split_command("hello there").is_none());
        assert!(split_command("/unknowncmd 1 2").is_none());
        assert!(split_command("").is_none());
    }

    #[test]
    fn test_split_extracts_name_and_args() {
        let p = split_command("/startad 3 600").unwrap();
        assert_eq!(p.name, "startad");
        assert_eq!(p.args, "3 600");
        assert!(!p.silent);
    }

    #[test]
    fn test_silent_prefix() {
        let p = split_command("/silentstatus").unwrap();
        assert_eq!(p.name, "status");
        assert!(p.silent);
    }

    #[test]
    fn test_bot_suffix_is_stripped() {
        let p = split_command("/status@relayclaw_bot").unwrap();
        assert_eq!(p.name, "status");
    }

    #[test]
    fn test_startad_args() {
        let c = Command::parse_args("startad", "3 600").unwrap();
        assert_eq!(
            c,
            Command::StartAd {
                id: "3".into(),
                interval: Some(600)
            }
        );
        assert!(Command::parse_args("startad", "").is_err());
        assert!(Command::parse_args("startad", "3 soon").is_err());
    }

    #[test]
    fn test_stopad_id_is_optional() {
        assert_eq!(
            Command::parse_args("stopad", "").unwrap(),
            Command::StopAd { id: None }
        );
        assert_eq!(
            Command::parse_args("stopad", "2").unwrap(),
            Command::StopAd { id: Some("2".into()) }
        );
    }

    #[test]
    fn test_schedule_keeps_datetime_expression_whole() {
        let c = Command::parse_args("schedule", "1 2026-12-25 14:30").unwrap();
        assert_eq!(
            c,
            Command::Schedule {
                id: "1".into(),
                expr: "2026-12-25 14:30".into()
            }
        );
    }

    #[test]
    fn test_target_lists_are_comma_split() {
        let c = Command::parse_args("targetedad", "1 @a,t.me/b,-100123 900").unwrap();
        match c {
            Command::TargetedAd { targets, interval, .. } => {
                assert_eq!(targets, vec!["@a", "t.me/b", "-100123"]);
                assert_eq!(interval, Some(900));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_analytics_day_bounds() {
        assert_eq!(
            Command::parse_args("analytics", "").unwrap(),
            Command::Analytics { days: 7 }
        );
        assert!(Command::parse_args("analytics", "0").is_err());
        assert!(Command::parse_args("analytics", "31").is_err());
        assert_eq!(
            Command::parse_args("analytics", "30").unwrap(),
            Command::Analytics { days: 30 }
        );
    }
}
