//! # RelayClaw Engine
//!
//! The campaign & task scheduling core. Everything externally triggered flows
//! through one gate and three shared structures:
//!
//! ```text
//! command ──▶ AuthorizationGate ──▶ CampaignStore   (payloads, targets, admins,
//!                    │                               campaigns, lifecycle flag)
//!                    └────────────▶ SchedulingEngine ──▶ TaskRegistry (live jobs)
//!                                         │
//!                                         ├──▶ Transport (resolve / forward)
//!                                         └──▶ AnalyticsLedger (day buckets)
//! ```
//!
//! Concurrency discipline: each shared structure sits behind its own
//! `tokio::sync::Mutex`, locked only for the in-memory mutation and never
//! across a transport await. Jobs cancel cooperatively via watch channels.

pub mod analytics;
pub mod auth;
pub mod engine;
pub mod ids;
pub mod registry;
pub mod schedule;
pub mod snapshot;
pub mod store;

pub use analytics::{AnalyticsLedger, DayStats, LedgerSummary, RETENTION_DAYS};
pub use auth::{authorize, AuthDecision, CommandSpec};
pub use engine::{MaintenanceReport, PassReport, SchedulingEngine, StatusReport};
pub use ids::allocate_id;
pub use registry::{CancelSignal, TaskRegistry};
pub use schedule::parse_fire_time;
pub use snapshot::{ImportReport, Snapshot};
pub use store::{CampaignStore, ForwardingState, ScheduleEntry, StoredPayload, TargetedCampaign};
