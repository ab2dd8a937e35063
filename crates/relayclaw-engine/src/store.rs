//! Durable-in-memory entity store: payloads, destinations, admins,
//! targeted campaigns, one-shot schedule records, and the enable/disable
//! lifecycle flag.
//!
//! The store holds canonical ids only; identifier resolution happens in the
//! transport before anything reaches here. Destination and admin sets are
//! ordered so every pass over them is deterministic.

use chrono::{DateTime, Utc};
use relayclaw_core::{ChatId, PayloadRef, RelayError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::ids::allocate_id;

/// Two-state lifecycle. Everything except the enable command is rejected
/// while `Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardingState {
    #[default]
    Disabled,
    Enabled,
}

/// A payload bound to a frozen destination set and interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetedCampaign {
    pub id: String,
    pub payload_id: String,
    /// Frozen at creation; never re-read from the live target set.
    pub targets: BTreeSet<ChatId>,
    pub interval_secs: u64,
    pub started_at: DateTime<Utc>,
}

impl TargetedCampaign {
    /// Seconds this campaign has been running.
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}

/// A pending one-shot delivery. Present in the store only while pending;
/// removed on fire and on cancel.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub id: String,
    pub payload_id: String,
    /// Destination snapshot taken at creation, not re-read at fire time.
    pub targets: BTreeSet<ChatId>,
    pub fire_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One saved payload plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct StoredPayload {
    pub id: String,
    pub payload: PayloadRef,
    pub saved_at: DateTime<Utc>,
}

/// The shared mutable entity store. Callers lock it for the duration of one
/// mutation, never across an await of the transport.
#[derive(Debug, Default)]
pub struct CampaignStore {
    state: ForwardingState,
    payloads: HashMap<String, StoredPayload>,
    targets: BTreeSet<ChatId>,
    admins: BTreeSet<UserId>,
    /// Admins loaded at process start; the last one standing cannot be removed.
    original_admins: BTreeSet<UserId>,
    campaigns: HashMap<String, TargetedCampaign>,
    schedules: HashMap<String, ScheduleEntry>,
    default_interval_secs: u64,
}

impl CampaignStore {
    pub fn new(initial_admins: impl IntoIterator<Item = UserId>, default_interval_secs: u64) -> Self {
        let admins: BTreeSet<UserId> = initial_admins.into_iter().collect();
        Self {
            state: ForwardingState::Disabled,
            payloads: HashMap::new(),
            targets: BTreeSet::new(),
            original_admins: admins.clone(),
            admins,
            campaigns: HashMap::new(),
            schedules: HashMap::new(),
            default_interval_secs,
        }
    }

    // --- lifecycle ---

    pub fn state(&self) -> ForwardingState {
        self.state
    }

    pub fn enable(&mut self) {
        self.state = ForwardingState::Enabled;
    }

    pub fn disable(&mut self) {
        self.state = ForwardingState::Disabled;
    }

    // --- payloads ---

    /// Save a payload under a freshly allocated short id.
    pub fn save_payload(&mut self, payload: PayloadRef) -> String {
        let existing: HashSet<String> = self.payloads.keys().cloned().collect();
        let id = allocate_id(&existing, 1);
        self.payloads.insert(
            id.clone(),
            StoredPayload {
                id: id.clone(),
                payload,
                saved_at: Utc::now(),
            },
        );
        tracing::info!("payload saved with id {id}");
        id
    }

    pub fn payload(&self, id: &str) -> Option<&StoredPayload> {
        self.payloads.get(id)
    }

    pub fn payloads(&self) -> impl Iterator<Item = &StoredPayload> {
        self.payloads.values()
    }

    pub fn payload_count(&self) -> usize {
        self.payloads.len()
    }

    /// Remove the payload record. Task cancellation is the engine's job;
    /// `SchedulingEngine::remove_payload` is the only caller.
    pub(crate) fn remove_payload_record(&mut self, id: &str) -> Result<StoredPayload> {
        self.payloads
            .remove(id)
            .ok_or_else(|| RelayError::not_found(format!("payload {id}")))
    }

    // --- destinations ---

    /// Add one destination. Returns false if it was already present
    /// (a no-op success, not an error).
    pub fn add_target(&mut self, chat: ChatId) -> bool {
        self.targets.insert(chat)
    }

    /// Remove one destination; absent members are reported, not ignored.
    pub fn remove_target(&mut self, chat: ChatId) -> Result<()> {
        if self.targets.remove(&chat) {
            Ok(())
        } else {
            Err(RelayError::not_found(format!("target {chat}")))
        }
    }

    pub fn clear_targets(&mut self) -> usize {
        let n = self.targets.len();
        self.targets.clear();
        n
    }

    pub fn targets(&self) -> &BTreeSet<ChatId> {
        &self.targets
    }

    // --- admins ---

    /// Add an admin. Returns false when already present (no-op success).
    pub fn add_admin(&mut self, user: UserId) -> bool {
        self.admins.insert(user)
    }

    /// Remove an admin. Refused when the target is the sole remaining
    /// originally-configured admin still in the set.
    pub fn remove_admin(&mut self, user: UserId) -> Result<()> {
        if !self.admins.contains(&user) {
            return Err(RelayError::not_found(format!("admin {user}")));
        }
        if self.original_admins.contains(&user) {
            let originals_left = self
                .admins
                .iter()
                .filter(|a| self.original_admins.contains(a))
                .count();
            if originals_left <= 1 {
                return Err(RelayError::LastAdminProtected(user));
            }
        }
        self.admins.remove(&user);
        Ok(())
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }

    pub fn admins(&self) -> &BTreeSet<UserId> {
        &self.admins
    }

    /// Replace the admin set (snapshot import). The originally-configured
    /// admins are always retained so the process cannot lock itself out.
    pub fn restore_admins(&mut self, admins: impl IntoIterator<Item = UserId>) {
        self.admins = admins.into_iter().collect();
        for a in &self.original_admins {
            self.admins.insert(*a);
        }
    }

    // --- default interval ---

    pub fn default_interval_secs(&self) -> u64 {
        self.default_interval_secs
    }

    pub fn set_default_interval_secs(&mut self, secs: u64) {
        self.default_interval_secs = secs;
    }

    // --- targeted campaigns ---

    /// Record a campaign under a freshly allocated id.
    pub fn insert_campaign(
        &mut self,
        payload_id: String,
        targets: BTreeSet<ChatId>,
        interval_secs: u64,
    ) -> String {
        let existing: HashSet<String> = self.campaigns.keys().cloned().collect();
        let id = allocate_id(&existing, 1);
        self.campaigns.insert(
            id.clone(),
            TargetedCampaign {
                id: id.clone(),
                payload_id,
                targets,
                interval_secs,
                started_at: Utc::now(),
            },
        );
        id
    }

    pub fn campaign(&self, id: &str) -> Option<&TargetedCampaign> {
        self.campaigns.get(id)
    }

    pub fn campaigns(&self) -> impl Iterator<Item = &TargetedCampaign> {
        self.campaigns.values()
    }

    pub fn campaign_count(&self) -> usize {
        self.campaigns.len()
    }

    pub fn remove_campaign(&mut self, id: &str) -> Result<TargetedCampaign> {
        self.campaigns
            .remove(id)
            .ok_or_else(|| RelayError::not_found(format!("campaign {id}")))
    }

    pub fn clear_campaigns(&mut self) {
        self.campaigns.clear();
    }

    /// Restore campaign records from a snapshot (tasks are not revived;
    /// the admin restarts what should run).
    pub fn restore_campaigns(&mut self, campaigns: impl IntoIterator<Item = TargetedCampaign>) {
        self.campaigns = campaigns.into_iter().map(|c| (c.id.clone(), c)).collect();
    }

    // --- one-shot schedules ---

    /// Record a pending schedule; the id is `sched_` plus a fresh short id.
    pub fn insert_schedule(
        &mut self,
        payload_id: String,
        targets: BTreeSet<ChatId>,
        fire_time: DateTime<Utc>,
    ) -> String {
        let existing: HashSet<String> = self
            .schedules
            .keys()
            .filter_map(|k| k.strip_prefix("sched_").map(str::to_string))
            .collect();
        let id = format!("sched_{}", allocate_id(&existing, 1));
        self.schedules.insert(
            id.clone(),
            ScheduleEntry {
                id: id.clone(),
                payload_id,
                targets,
                fire_time,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn schedule(&self, id: &str) -> Option<&ScheduleEntry> {
        self.schedules.get(id)
    }

    pub fn schedules(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.schedules.values()
    }

    pub fn schedule_count(&self) -> usize {
        self.schedules.len()
    }

    pub fn remove_schedule(&mut self, id: &str) -> Result<ScheduleEntry> {
        self.schedules
            .remove(id)
            .ok_or_else(|| RelayError::not_found(format!("schedule {id}")))
    }

    pub fn clear_schedules(&mut self) {
        self.schedules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayclaw_core::ContentKind;

    fn payload() -> PayloadRef {
        PayloadRef::new(-100, 42, ContentKind::Text, "hello world")
    }

    #[test]
    fn test_initial_state_disabled() {
        let store = CampaignStore::new([1], 300);
        assert_eq!(store.state(), ForwardingState::Disabled);
    }

    #[test]
    fn test_payload_ids_start_at_one() {
        let mut store = CampaignStore::new([1], 300);
        assert_eq!(store.save_payload(payload()), "1");
        assert_eq!(store.save_payload(payload()), "2");
    }

    #[test]
    fn test_target_add_is_idempotent() {
        let mut store = CampaignStore::new([1], 300);
        assert!(store.add_target(100));
        assert!(!store.add_target(100));
        assert_eq!(store.targets().len(), 1);
    }

    #[test]
    fn test_remove_absent_target_reports_not_found() {
        let mut store = CampaignStore::new([1], 300);
        let err = store.remove_target(999).unwrap_err();
        assert!(matches!(err, RelayError::NotFound(_)));
        assert!(store.targets().is_empty());
    }

    #[test]
    fn test_last_original_admin_protected() {
        let mut store = CampaignStore::new([7], 300);
        store.add_admin(8);
        let err = store.remove_admin(7).unwrap_err();
        assert!(matches!(err, RelayError::LastAdminProtected(7)));
        assert!(store.is_admin(7));
        // Non-original admins can always go.
        store.remove_admin(8).unwrap();
        assert!(!store.is_admin(8));
    }

    #[test]
    fn test_second_original_admin_can_be_removed() {
        let mut store = CampaignStore::new([7, 9], 300);
        store.remove_admin(9).unwrap();
        let err = store.remove_admin(7).unwrap_err();
        assert!(matches!(err, RelayError::LastAdminProtected(7)));
    }

    #[test]
    fn test_admin_add_is_idempotent() {
        let mut store = CampaignStore::new([7], 300);
        assert!(!store.add_admin(7));
        assert_eq!(store.admins().len(), 1);
    }

    #[test]
    fn test_schedule_ids_carry_prefix() {
        let mut store = CampaignStore::new([1], 300);
        let id = store.insert_schedule("1".into(), BTreeSet::new(), Utc::now());
        assert_eq!(id, "sched_1");
        let id2 = store.insert_schedule("1".into(), BTreeSet::new(), Utc::now());
        assert_eq!(id2, "sched_2");
    }

    #[test]
    fn test_restore_admins_keeps_originals() {
        let mut store = CampaignStore::new([7], 300);
        store.restore_admins([8, 9]);
        assert!(store.is_admin(7));
        assert!(store.is_admin(8));
        assert!(store.is_admin(9));
    }
}
