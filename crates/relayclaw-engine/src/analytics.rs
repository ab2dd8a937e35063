//! Day-bucketed delivery outcome ledger.
//!
//! Every delivery attempt lands here: successes as counters, failures as
//! reason lists, both keyed by `(payload id, destination)` under the calendar
//! day of the attempt. Buckets older than [`RETENTION_DAYS`] are pruned by
//! the maintenance pass.

use chrono::{Duration, NaiveDate};
use relayclaw_core::ChatId;
use std::collections::{BTreeMap, HashMap};

/// Whole-day buckets older than this are eligible for pruning.
pub const RETENTION_DAYS: i64 = 30;

type Key = (String, ChatId);

/// The analytics ledger. Append-only within a day except for pruning.
#[derive(Debug, Default)]
pub struct AnalyticsLedger {
    forwards: BTreeMap<NaiveDate, HashMap<Key, u64>>,
    failures: BTreeMap<NaiveDate, HashMap<Key, Vec<String>>>,
}

/// Per-day totals, oldest first in a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayStats {
    pub date: NaiveDate,
    pub forwards: u64,
    pub failures: u64,
}

/// Aggregated view over the most recent N days.
#[derive(Debug, Clone)]
pub struct LedgerSummary {
    /// Chronological, oldest first. Always exactly the requested number of days.
    pub daily: Vec<DayStats>,
    pub total_forwards: u64,
    pub total_failures: u64,
    /// `forwards / (forwards + failures)`, 0.0 when nothing was attempted.
    pub success_rate: f64,
    /// Percent change in forwards, most recent day vs the day before.
    /// `None` when fewer than two days were requested or yesterday saw none.
    pub day_over_day: Option<f64>,
}

impl AnalyticsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful delivery.
    pub fn record_success(&mut self, day: NaiveDate, payload_id: &str, destination: ChatId) {
        *self
            .forwards
            .entry(day)
            .or_default()
            .entry((payload_id.to_string(), destination))
            .or_insert(0) += 1;
    }

    /// Record one failed delivery with its reason.
    pub fn record_failure(
        &mut self,
        day: NaiveDate,
        payload_id: &str,
        destination: ChatId,
        reason: &str,
    ) {
        self.failures
            .entry(day)
            .or_default()
            .entry((payload_id.to_string(), destination))
            .or_insert_with(Vec::new)
            .push(reason.to_string());
    }

    /// Total successful forwards recorded for `day`.
    pub fn forwards_on(&self, day: NaiveDate) -> u64 {
        self.forwards
            .get(&day)
            .map(|m| m.values().sum())
            .unwrap_or(0)
    }

    /// Total failed deliveries recorded for `day`.
    pub fn failures_on(&self, day: NaiveDate) -> u64 {
        self.failures
            .get(&day)
            .map(|m| m.values().map(|v| v.len() as u64).sum())
            .unwrap_or(0)
    }

    /// Summarize the most recent `days` calendar days ending at `today`.
    pub fn summary(&self, days: u32, today: NaiveDate) -> LedgerSummary {
        let days = days.max(1);
        let mut daily = Vec::with_capacity(days as usize);
        for back in (0..days as i64).rev() {
            let date = today - Duration::days(back);
            daily.push(DayStats {
                date,
                forwards: self.forwards_on(date),
                failures: self.failures_on(date),
            });
        }

        let total_forwards: u64 = daily.iter().map(|d| d.forwards).sum();
        let total_failures: u64 = daily.iter().map(|d| d.failures).sum();
        let attempted = total_forwards + total_failures;
        let success_rate = if attempted == 0 {
            0.0
        } else {
            total_forwards as f64 / attempted as f64
        };

        let day_over_day = if daily.len() >= 2 {
            let yesterday = daily[daily.len() - 2].forwards;
            let today_count = daily[daily.len() - 1].forwards;
            if yesterday == 0 {
                None
            } else {
                Some((today_count as f64 - yesterday as f64) / yesterday as f64 * 100.0)
            }
        } else {
            None
        };

        LedgerSummary {
            daily,
            total_forwards,
            total_failures,
            success_rate,
            day_over_day,
        }
    }

    /// Delete whole-day buckets strictly older than `cutoff`. Idempotent.
    pub fn prune(&mut self, cutoff: NaiveDate) {
        let before = self.forwards.len() + self.failures.len();
        self.forwards.retain(|d, _| *d >= cutoff);
        self.failures.retain(|d, _| *d >= cutoff);
        let after = self.forwards.len() + self.failures.len();
        if before != after {
            tracing::debug!("pruned {} ledger day-buckets", before - after);
        }
    }

    /// Number of day buckets currently held (both maps).
    pub fn bucket_count(&self) -> usize {
        self.forwards.len() + self.failures.len()
    }
}
