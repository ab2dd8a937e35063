//! Versioned JSON snapshot of the store's configuration.
//!
//! Payload content is not portable across processes — only the reference
//! metadata travels, so an import restores sets and settings and tells the
//! admin which payloads need re-saving.

use chrono::{DateTime, Utc};
use relayclaw_core::{ChatId, ContentKind, RelayError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::store::{CampaignStore, TargetedCampaign};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Metadata for one stored payload. The content stays behind; this is enough
/// for the admin to recognise and re-capture it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadMeta {
    pub id: String,
    pub source_chat: ChatId,
    pub message_id: i64,
    pub kind: ContentKind,
    pub preview: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub default_interval_secs: u64,
    pub targets: BTreeSet<ChatId>,
    pub admins: BTreeSet<UserId>,
    pub campaigns: Vec<TargetedCampaign>,
    pub payloads: Vec<PayloadMeta>,
}

/// What an import changed, plus the payloads the admin must re-save.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub targets_restored: usize,
    pub admins_restored: usize,
    pub campaigns_restored: usize,
    pub default_interval_secs: u64,
    /// (id, preview) of each payload named in the snapshot; none of them
    /// carries content, so all need re-capturing.
    pub payloads_requiring_resave: Vec<(String, String)>,
}

impl Snapshot {
    /// Capture the store's exportable state.
    pub fn export(store: &CampaignStore) -> Self {
        let mut payloads: Vec<PayloadMeta> = store
            .payloads()
            .map(|p| PayloadMeta {
                id: p.id.clone(),
                source_chat: p.payload.source_chat,
                message_id: p.payload.message_id,
                kind: p.payload.kind,
                preview: p.payload.preview.clone(),
                saved_at: p.saved_at,
            })
            .collect();
        payloads.sort_by(|a, b| a.id.cmp(&b.id));
        let mut campaigns: Vec<TargetedCampaign> = store.campaigns().cloned().collect();
        campaigns.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            default_interval_secs: store.default_interval_secs(),
            targets: store.targets().clone(),
            admins: store.admins().clone(),
            campaigns,
            payloads,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RelayError::Snapshot(format!("serialize failed: {e}")))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(raw)
            .map_err(|e| RelayError::Snapshot(format!("parse failed: {e}")))?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(RelayError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// Apply this snapshot to a store: targets, admins, interval, and
    /// campaign records are restored. Campaign tasks are not revived and
    /// payload content cannot be; the report says what needs re-saving.
    pub fn import(self, store: &mut CampaignStore) -> ImportReport {
        let targets_restored = {
            store.clear_targets();
            for t in &self.targets {
                store.add_target(*t);
            }
            self.targets.len()
        };
        store.restore_admins(self.admins.iter().copied());
        store.set_default_interval_secs(self.default_interval_secs);
        let campaigns_restored = self.campaigns.len();
        store.restore_campaigns(self.campaigns);

        tracing::info!(
            "snapshot imported: {targets_restored} targets, {} admins, {campaigns_restored} campaign records",
            store.admins().len()
        );

        ImportReport {
            targets_restored,
            admins_restored: store.admins().len(),
            campaigns_restored,
            default_interval_secs: self.default_interval_secs,
            payloads_requiring_resave: self
                .payloads
                .into_iter()
                .map(|p| (p.id, p.preview))
                .collect(),
        }
    }
}
