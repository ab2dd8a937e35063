//! Scheduling engine — drives recurring forwards, targeted campaigns, and
//! one-shot schedules over the task registry.
//!
//! This is the only component that talks to the transport and the ledger.
//! Jobs take each shared lock only long enough to read or write memory;
//! no lock is ever held across a transport await, so independent jobs
//! interleave freely between destinations.

use chrono::{DateTime, Utc};
use relayclaw_core::{ChatId, PayloadRef, RelayError, Result, Transport};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::analytics::{AnalyticsLedger, LedgerSummary, RETENTION_DAYS};
use crate::registry::{CancelSignal, TaskRegistry};
use crate::schedule::parse_fire_time;
use crate::store::{CampaignStore, ScheduleEntry};

/// Registry key prefix for targeted-campaign tasks.
const TARGETED_PREFIX: &str = "targeted_";

/// Outcome of one pass over a destination set.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Per-destination failures, in pass order. Never aborts sibling items.
    pub failed: Vec<(ChatId, String)>,
}

/// Point-in-time system status for the status command.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub uptime_secs: i64,
    pub admin_count: usize,
    pub target_count: usize,
    pub payload_count: usize,
    pub live_task_count: usize,
    pub campaign_count: usize,
    pub schedule_count: usize,
    pub default_interval_secs: u64,
    pub forwards_today: u64,
}

/// Result of the maintenance pass.
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceReport {
    pub pruned_day_buckets: usize,
    pub swept_tasks: usize,
}

/// The orchestrator. Construct once, share behind an `Arc`.
pub struct SchedulingEngine {
    store: Arc<Mutex<CampaignStore>>,
    registry: TaskRegistry,
    ledger: Arc<Mutex<AnalyticsLedger>>,
    transport: Arc<dyn Transport>,
    started_at: DateTime<Utc>,
}

impl SchedulingEngine {
    pub fn new(store: CampaignStore, transport: Arc<dyn Transport>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            registry: TaskRegistry::new(),
            ledger: Arc::new(Mutex::new(AnalyticsLedger::new())),
            transport,
            started_at: Utc::now(),
        }
    }

    pub fn store(&self) -> &Arc<Mutex<CampaignStore>> {
        &self.store
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // --- recurring forwards ---

    /// Start (or replace) the recurring forward loop for a payload. The live
    /// destination set is re-read at the top of every pass. Interval floors
    /// are the command layer's job, not enforced here.
    pub async fn start_recurring(&self, payload_id: &str, interval_secs: u64) -> Result<()> {
        {
            let store = self.store.lock().await;
            if store.payload(payload_id).is_none() {
                return Err(RelayError::not_found(format!("payload {payload_id}")));
            }
            if store.targets().is_empty() {
                return Err(RelayError::invalid(
                    "no target chats configured; add targets first",
                ));
            }
        }

        let store = self.store.clone();
        let ledger = self.ledger.clone();
        let transport = self.transport.clone();
        let pid = payload_id.to_string();

        self.registry
            .start(payload_id, move |mut signal| async move {
                tracing::info!("recurring forward started for payload {pid} ({interval_secs}s)");
                loop {
                    if signal.is_cancelled() {
                        break;
                    }

                    // Re-read payload and the live target set each pass.
                    let snapshot = {
                        let store = store.lock().await;
                        match store.payload(&pid) {
                            Some(p) => Some((p.payload.clone(), store.targets().clone())),
                            None => None,
                        }
                    };
                    let Some((payload, targets)) = snapshot else {
                        tracing::info!("payload {pid} no longer exists, stopping forward loop");
                        break;
                    };

                    let report =
                        deliver_pass(&transport, &ledger, &pid, &payload, &targets, &signal).await;
                    tracing::info!(
                        "pass for payload {pid}: {}/{} delivered, {} failed",
                        report.delivered,
                        report.attempted,
                        report.failed.len()
                    );

                    tokio::select! {
                        _ = sleep(std::time::Duration::from_secs(interval_secs)) => {}
                        _ = signal.cancelled() => break,
                    }
                }
                tracing::info!("recurring forward for payload {pid} terminated");
            })
            .await;

        Ok(())
    }

    /// Stop the recurring forward for one payload. False if none was live.
    pub async fn stop_recurring(&self, payload_id: &str) -> bool {
        self.registry.stop(payload_id).await
    }

    /// Stop every recurring forward task (keys without the targeted prefix
    /// and without a schedule prefix are payload keys).
    pub async fn stop_all(&self) -> usize {
        let stopped = self.registry.stop_all().await;
        let mut store = self.store.lock().await;
        store.clear_campaigns();
        store.clear_schedules();
        stopped
    }

    // --- targeted campaigns ---

    /// Start a targeted campaign: the destination set is frozen here and
    /// never re-read. Returns the new campaign id.
    pub async fn start_targeted(
        &self,
        payload_id: &str,
        targets: BTreeSet<ChatId>,
        interval_secs: u64,
    ) -> Result<String> {
        if targets.is_empty() {
            return Err(RelayError::invalid("no valid targets specified"));
        }

        let campaign_id = {
            let mut store = self.store.lock().await;
            if store.payload(payload_id).is_none() {
                return Err(RelayError::not_found(format!("payload {payload_id}")));
            }
            store.insert_campaign(payload_id.to_string(), targets.clone(), interval_secs)
        };

        let store = self.store.clone();
        let ledger = self.ledger.clone();
        let transport = self.transport.clone();
        let pid = payload_id.to_string();
        let cid = campaign_id.clone();
        let key = format!("{TARGETED_PREFIX}{campaign_id}");

        self.registry
            .start(&key, move |mut signal| async move {
                tracing::info!(
                    "targeted campaign {cid} started: payload {pid}, {} targets, {interval_secs}s",
                    targets.len()
                );
                loop {
                    if signal.is_cancelled() {
                        break;
                    }

                    let payload = {
                        let store = store.lock().await;
                        store.payload(&pid).map(|p| p.payload.clone())
                    };
                    let Some(payload) = payload else {
                        tracing::info!("payload {pid} gone, ending campaign {cid}");
                        // The record must not outlive the loop.
                        store.lock().await.remove_campaign(&cid).ok();
                        break;
                    };

                    let report =
                        deliver_pass(&transport, &ledger, &pid, &payload, &targets, &signal).await;
                    tracing::info!(
                        "campaign {cid} pass: {}/{} delivered",
                        report.delivered,
                        report.attempted
                    );

                    tokio::select! {
                        _ = sleep(std::time::Duration::from_secs(interval_secs)) => {}
                        _ = signal.cancelled() => break,
                    }
                }
                tracing::info!("targeted campaign {cid} terminated");
            })
            .await;

        Ok(campaign_id)
    }

    /// Stop a targeted campaign: the record disappears before the task is
    /// cancelled, so a concurrent lister never sees a record without the
    /// stop having begun.
    pub async fn stop_targeted(&self, campaign_id: &str) -> Result<()> {
        {
            let mut store = self.store.lock().await;
            store.remove_campaign(campaign_id)?;
        }
        self.registry
            .stop(&format!("{TARGETED_PREFIX}{campaign_id}"))
            .await;
        Ok(())
    }

    // --- one-shot schedules ---

    /// Schedule a one-shot delivery of `payload_id` at the time `expr`
    /// resolves to. The destination set is snapshotted now. Returns the
    /// schedule entry as recorded.
    pub async fn schedule_one_shot(
        &self,
        payload_id: &str,
        expr: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduleEntry> {
        let fire_time = parse_fire_time(expr, now)?;

        let entry = {
            let mut store = self.store.lock().await;
            if store.payload(payload_id).is_none() {
                return Err(RelayError::not_found(format!("payload {payload_id}")));
            }
            let snapshot = store.targets().clone();
            let id = store.insert_schedule(payload_id.to_string(), snapshot, fire_time);
            store
                .schedule(&id)
                .cloned()
                .ok_or_else(|| RelayError::Other("schedule insert lost".into()))?
        };

        let store = self.store.clone();
        let ledger = self.ledger.clone();
        let transport = self.transport.clone();
        let pid = payload_id.to_string();
        let sid = entry.id.clone();
        let targets = entry.targets.clone();

        self.registry
            .start(&entry.id, move |mut signal| async move {
                let wait = (fire_time - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                tracing::info!("schedule {sid} armed: fires in {}s", wait.as_secs());

                tokio::select! {
                    _ = sleep(wait) => {}
                    _ = signal.cancelled() => {
                        // Pending -> Cancelled: drop the record and stop.
                        store.lock().await.remove_schedule(&sid).ok();
                        tracing::info!("schedule {sid} cancelled");
                        return;
                    }
                }

                let payload = {
                    let store = store.lock().await;
                    store.payload(&pid).map(|p| p.payload.clone())
                };
                if let Some(payload) = payload {
                    let report =
                        deliver_pass(&transport, &ledger, &pid, &payload, &targets, &signal).await;
                    tracing::info!(
                        "schedule {sid} fired: {}/{} delivered",
                        report.delivered,
                        report.attempted
                    );
                } else {
                    tracing::info!("schedule {sid}: payload {pid} gone, nothing to deliver");
                }

                // Pending -> Fired: one-shot, never rescheduled.
                store.lock().await.remove_schedule(&sid).ok();
            })
            .await;

        Ok(entry)
    }

    /// Cancel a pending one-shot. The task's cancel branch removes the record.
    pub async fn cancel_schedule(&self, schedule_id: &str) -> Result<()> {
        {
            let store = self.store.lock().await;
            if store.schedule(schedule_id).is_none() {
                return Err(RelayError::not_found(format!("schedule {schedule_id}")));
            }
        }
        self.registry.stop(schedule_id).await;
        // The cancel branch runs asynchronously; make the record's removal
        // immediate so a follow-up cancel reports not-found.
        self.store.lock().await.remove_schedule(schedule_id).ok();
        Ok(())
    }

    // --- single pass ---

    /// Deliver a payload to an explicit target list once, right now.
    pub async fn forward_once(
        &self,
        payload_id: &str,
        targets: &BTreeSet<ChatId>,
    ) -> Result<PassReport> {
        if targets.is_empty() {
            return Err(RelayError::invalid("no valid targets specified"));
        }
        let payload = {
            let store = self.store.lock().await;
            store
                .payload(payload_id)
                .map(|p| p.payload.clone())
                .ok_or_else(|| RelayError::not_found(format!("payload {payload_id}")))?
        };
        let signal = CancelSignal::never();
        Ok(deliver_pass(
            &self.transport,
            &self.ledger,
            payload_id,
            &payload,
            targets,
            &signal,
        )
        .await)
    }

    // --- payload lifecycle ---

    /// Remove a payload, cancelling its recurring task first so no live job
    /// references a missing record.
    pub async fn remove_payload(&self, payload_id: &str) -> Result<()> {
        self.registry.stop(payload_id).await;
        let mut store = self.store.lock().await;
        store.remove_payload_record(payload_id)?;
        tracing::info!("payload {payload_id} removed");
        Ok(())
    }

    // --- analytics & maintenance ---

    pub async fn analytics_summary(&self, days: u32, today: chrono::NaiveDate) -> LedgerSummary {
        self.ledger.lock().await.summary(days, today)
    }

    /// Prune the ledger past the retention window and sweep finished tasks.
    pub async fn maintenance(&self, today: chrono::NaiveDate) -> MaintenanceReport {
        let pruned = {
            let mut ledger = self.ledger.lock().await;
            let before = ledger.bucket_count();
            ledger.prune(today - chrono::Duration::days(RETENTION_DAYS));
            before - ledger.bucket_count()
        };
        let swept = self.registry.sweep_finished().await;
        MaintenanceReport {
            pruned_day_buckets: pruned,
            swept_tasks: swept,
        }
    }

    pub async fn status(&self, now: DateTime<Utc>) -> StatusReport {
        let store = self.store.lock().await;
        let ledger = self.ledger.lock().await;
        StatusReport {
            uptime_secs: (now - self.started_at).num_seconds().max(0),
            admin_count: store.admins().len(),
            target_count: store.targets().len(),
            payload_count: store.payload_count(),
            live_task_count: self.registry.len().await,
            campaign_count: store.campaign_count(),
            schedule_count: store.schedule_count(),
            default_interval_secs: store.default_interval_secs(),
            forwards_today: ledger.forwards_on(now.date_naive()),
        }
    }
}

/// One deterministic pass over `targets`, oldest id first (ordered set).
/// Each attempt's ledger write is atomic with respect to that attempt; the
/// cancel signal is consulted before every delivery, and a failure never
/// aborts the remaining destinations.
async fn deliver_pass(
    transport: &Arc<dyn Transport>,
    ledger: &Arc<Mutex<AnalyticsLedger>>,
    payload_id: &str,
    payload: &PayloadRef,
    targets: &BTreeSet<ChatId>,
    signal: &CancelSignal,
) -> PassReport {
    let mut report = PassReport::default();
    for &dest in targets {
        if signal.is_cancelled() {
            break;
        }
        report.attempted += 1;
        match transport.forward_to(payload, dest).await {
            Ok(()) => {
                report.delivered += 1;
                let mut ledger = ledger.lock().await;
                ledger.record_success(Utc::now().date_naive(), payload_id, dest);
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!("delivery of payload {payload_id} to {dest} failed: {reason}");
                {
                    let mut ledger = ledger.lock().await;
                    ledger.record_failure(Utc::now().date_naive(), payload_id, dest, &reason);
                }
                report.failed.push((dest, reason));
            }
        }
    }
    report
}
