//! End-to-end engine behavior against an in-process transport double.
//!
//! All timing-sensitive tests run on the paused tokio clock, so intervals
//! elapse instantly and passes stay deterministic.

use async_trait::async_trait;
use chrono::Utc;
use relayclaw_core::{ChatId, ContentKind, DialogInfo, PayloadRef, RelayError, Result, Transport};
use relayclaw_engine::{CampaignStore, SchedulingEngine};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// Transport double: logs every forward, notifies the test per delivery
/// attempt, and fails deterministically for configured destinations.
struct MockTransport {
    log: Mutex<Vec<(i64, ChatId)>>,
    failing: HashSet<ChatId>,
    notify: mpsc::UnboundedSender<ChatId>,
}

impl MockTransport {
    fn new(failing: impl IntoIterator<Item = ChatId>) -> (Arc<Self>, mpsc::UnboundedReceiver<ChatId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                failing: failing.into_iter().collect(),
                notify: tx,
            }),
            rx,
        )
    }

    fn deliveries(&self) -> Vec<(i64, ChatId)> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn resolve(&self, identifier: &str) -> Result<ChatId> {
        identifier
            .parse()
            .map_err(|_| RelayError::transport("unresolvable"))
    }

    async fn forward_to(&self, payload: &PayloadRef, destination: ChatId) -> Result<()> {
        let result = if self.failing.contains(&destination) {
            Err(RelayError::Delivery {
                destination,
                reason: "peer rejected".into(),
            })
        } else {
            self.log
                .lock()
                .unwrap()
                .push((payload.message_id, destination));
            Ok(())
        };
        let _ = self.notify.send(destination);
        result
    }

    async fn list_dialogs(&self) -> Result<Vec<DialogInfo>> {
        Ok(Vec::new())
    }

    async fn send_text(&self, _destination: ChatId, _text: &str) -> Result<()> {
        Ok(())
    }
}

fn payload(message_id: i64) -> PayloadRef {
    PayloadRef::new(-100, message_id, ContentKind::Text, "campaign text")
}

async fn engine_with(
    targets: &[ChatId],
    failing: &[ChatId],
) -> (SchedulingEngine, Arc<MockTransport>, mpsc::UnboundedReceiver<ChatId>) {
    let (transport, rx) = MockTransport::new(failing.iter().copied());
    let mut store = CampaignStore::new([7], 300);
    for &t in targets {
        store.add_target(t);
    }
    let engine = SchedulingEngine::new(store, transport.clone());
    (engine, transport, rx)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<ChatId>) -> ChatId {
    timeout(Duration::from_secs(600), rx.recv())
        .await
        .expect("delivery did not happen")
        .expect("channel closed")
}

#[tokio::test(start_paused = true)]
async fn recurring_pass_covers_all_targets_in_order() {
    let (engine, transport, mut rx) = engine_with(&[200, 100], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(42));
    assert_eq!(id, "1");

    engine.start_recurring(&id, 60).await.unwrap();
    assert_eq!(recv(&mut rx).await, 100);
    assert_eq!(recv(&mut rx).await, 200);

    // Ordered set iteration: ascending chat id regardless of insert order.
    assert_eq!(transport.deliveries(), vec![(42, 100), (42, 200)]);

    assert!(engine.stop_recurring(&id).await);
    assert!(!engine.stop_recurring(&id).await);
}

#[tokio::test(start_paused = true)]
async fn recurring_rereads_live_target_set() {
    let (engine, transport, mut rx) = engine_with(&[100], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(1));

    engine.start_recurring(&id, 60).await.unwrap();
    assert_eq!(recv(&mut rx).await, 100);

    engine.store().lock().await.add_target(300);
    // Second pass sees the addition.
    assert_eq!(recv(&mut rx).await, 100);
    assert_eq!(recv(&mut rx).await, 300);

    engine.stop_recurring(&id).await;
    assert!(transport.deliveries().contains(&(1, 300)));
}

#[tokio::test(start_paused = true)]
async fn targeted_campaign_set_is_frozen() {
    let (engine, transport, mut rx) = engine_with(&[], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(9));

    let cid = engine
        .start_targeted(&id, [100].into_iter().collect(), 60)
        .await
        .unwrap();
    assert_eq!(recv(&mut rx).await, 100);

    // A later global target addition must not leak into the campaign.
    engine.store().lock().await.add_target(500);
    assert_eq!(recv(&mut rx).await, 100);
    assert_eq!(recv(&mut rx).await, 100);

    engine.stop_targeted(&cid).await.unwrap();
    assert!(transport.deliveries().iter().all(|&(_, d)| d == 100));
    // Record is gone, so a second stop reports not-found.
    assert!(matches!(
        engine.stop_targeted(&cid).await,
        Err(RelayError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn empty_target_set_refuses_recurring_start() {
    let (engine, _transport, _rx) = engine_with(&[], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(1));
    let err = engine.start_recurring(&id, 60).await.unwrap_err();
    assert!(matches!(err, RelayError::InvalidArgument(_)));
    assert_eq!(engine.registry().len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn removing_payload_cancels_its_task() {
    let (engine, _transport, mut rx) = engine_with(&[100], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(5));

    engine.start_recurring(&id, 60).await.unwrap();
    recv(&mut rx).await;
    assert_eq!(engine.registry().len().await, 1);

    engine.remove_payload(&id).await.unwrap();
    assert_eq!(engine.registry().len().await, 0);
    assert!(engine.store().lock().await.payload(&id).is_none());
    // No further deliveries arrive.
    assert!(timeout(Duration::from_secs(600), rx.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn one_shot_fires_once_at_parsed_time() {
    let (engine, transport, mut rx) = engine_with(&[100, 200], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(77));

    let now = Utc::now();
    let entry = engine.schedule_one_shot(&id, "5m", now).await.unwrap();
    assert_eq!(entry.fire_time, now + chrono::Duration::seconds(300));
    assert_eq!(engine.store().lock().await.schedule_count(), 1);

    // Paused clock fast-forwards through the five minutes.
    assert_eq!(recv(&mut rx).await, 100);
    assert_eq!(recv(&mut rx).await, 200);
    assert_eq!(transport.deliveries().len(), 2);

    // Fired means gone: no record, no task, no second round.
    assert!(timeout(Duration::from_secs(3600), rx.recv()).await.is_err());
    assert_eq!(engine.store().lock().await.schedule_count(), 0);
    assert_eq!(engine.registry().len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_one_shot_never_fires() {
    let (engine, transport, mut rx) = engine_with(&[100], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(3));

    let entry = engine
        .schedule_one_shot(&id, "2h", Utc::now())
        .await
        .unwrap();
    engine.cancel_schedule(&entry.id).await.unwrap();
    assert_eq!(engine.store().lock().await.schedule_count(), 0);
    assert!(matches!(
        engine.cancel_schedule(&entry.id).await,
        Err(RelayError::NotFound(_))
    ));

    assert!(timeout(Duration::from_secs(7300), rx.recv()).await.is_err());
    assert!(transport.deliveries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn past_expression_is_rejected() {
    let (engine, _transport, _rx) = engine_with(&[100], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(3));
    let err = engine
        .schedule_one_shot(&id, "2020-01-01 10:00", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::InvalidSchedule(_)));
    assert_eq!(engine.store().lock().await.schedule_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_destination_does_not_abort_the_pass() {
    let (engine, transport, _rx) = engine_with(&[100, 200, 300], &[200]).await;
    let id = engine.store().lock().await.save_payload(payload(8));

    let report = engine
        .forward_once(&id, &[100, 200, 300].into_iter().collect::<BTreeSet<_>>())
        .await
        .unwrap();
    assert_eq!(report.attempted, 3);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 200);
    assert_eq!(transport.deliveries(), vec![(8, 100), (8, 300)]);

    // Both outcomes landed in the ledger.
    let today = Utc::now().date_naive();
    let summary = engine.analytics_summary(1, today).await;
    assert_eq!(summary.total_forwards, 2);
    assert_eq!(summary.total_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_all_clears_tasks_campaigns_and_schedules() {
    let (engine, _transport, mut rx) = engine_with(&[100], &[]).await;
    let store = engine.store();
    let p1 = store.lock().await.save_payload(payload(1));
    let p2 = store.lock().await.save_payload(payload(2));

    engine.start_recurring(&p1, 60).await.unwrap();
    engine
        .start_targeted(&p2, [100].into_iter().collect(), 60)
        .await
        .unwrap();
    engine
        .schedule_one_shot(&p1, "1h", Utc::now())
        .await
        .unwrap();
    // Drain the first passes so the stop is the only thing left pending.
    recv(&mut rx).await;
    recv(&mut rx).await;

    let stopped = engine.stop_all().await;
    assert_eq!(stopped, 3);
    assert_eq!(engine.registry().len().await, 0);
    let store = store.lock().await;
    assert_eq!(store.campaign_count(), 0);
    assert_eq!(store.schedule_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn status_reflects_live_counts() {
    let (engine, _transport, mut rx) = engine_with(&[100, 200], &[]).await;
    let id = engine.store().lock().await.save_payload(payload(4));
    engine.start_recurring(&id, 60).await.unwrap();
    recv(&mut rx).await;
    recv(&mut rx).await;

    let status = engine.status(Utc::now()).await;
    assert_eq!(status.admin_count, 1);
    assert_eq!(status.target_count, 2);
    assert_eq!(status.payload_count, 1);
    assert_eq!(status.live_task_count, 1);
    assert_eq!(status.default_interval_secs, 300);
    assert_eq!(status.forwards_today, 2);
}
